use crate::errors::QueryError;
use bson::{Bson, Document};
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

// Safety limits to prevent resource abuse
pub(crate) const MAX_FILTER_DEPTH: usize = 32;
pub(crate) const MAX_RAW_QUERY_DEPTH: usize = 64;
pub(crate) const MAX_PATH_DEPTH: usize = 32;

/// Limit applied when `$limit`/`$top` is absent or unparseable.
pub const DEFAULT_LIMIT: i64 = 50;

/// Parameter names consumed (or deliberately reserved) by the query layer.
/// Callers merging extra criteria into a query should skip these keys.
pub const RESERVED_KEYS: [&str; 10] = [
    "$select",
    "$limit",
    "$top",
    "$filter",
    "$skip",
    "$sort",
    "$orderby",
    "$rawQuery",
    "$aggregate",
    "$group",
];

#[must_use]
pub fn is_reserved_key(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        match self {
            Order::Asc => 1,
            Order::Desc => -1,
        }
    }
}

/// A `$select` projection: every field either included or excluded, never a
/// mixture of the two.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

impl Projection {
    /// Field paths named by the projection, in directive order.
    #[must_use]
    pub fn fields(&self) -> &[String] {
        match self {
            Projection::Include(fields) | Projection::Exclude(fields) => fields,
        }
    }

    /// Renders the store-facing form: `{field: true, ...}` for inclusion,
    /// `{field: false, ...}` for exclusion.
    #[must_use]
    pub fn to_document(&self) -> Document {
        let (fields, flag) = match self {
            Projection::Include(fields) => (fields, true),
            Projection::Exclude(fields) => (fields, false),
        };
        let mut doc = Document::new();
        for field in fields {
            doc.insert(field.clone(), Bson::Boolean(flag));
        }
        doc
    }
}

// Serialized in the store-facing map form so logged/emitted queries show the
// shape the store receives.
impl Serialize for Projection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_document().serialize(serializer)
    }
}

/// Raw request parameters: a flat map of directive and criteria keys.
///
/// Accepts an encoded query string (percent escapes and `+` as space), an
/// already-decoded JSON map, or a [`Value`] holding either. A repeated key in
/// a query string keeps the last occurrence.
#[derive(Debug, Clone, Default)]
pub struct QueryParams(Map<String, Value>);

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Decodes an `application/x-www-form-urlencoded` query string. A single
    /// leading `?` is tolerated.
    #[must_use]
    pub fn from_query_str(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut map = Map::new();
        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            map.insert(key.into_owned(), Value::String(value.into_owned()));
        }
        Self(map)
    }

    #[must_use]
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Accepts the shapes a transport hands over: `Null` (no parameters), a
    /// query string, or a decoded object. Anything else is rejected.
    pub fn from_value(value: &Value) -> Result<Self, QueryError> {
        match value {
            Value::Null => Ok(Self::new()),
            Value::String(s) => Ok(Self::from_query_str(s)),
            Value::Object(map) => Ok(Self(map.clone())),
            _ => Err(QueryError::InvalidParameterShape),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Directive lookup: an empty-string value counts as absent, the way an
    /// empty `$select=` slot in a query string carries no directive.
    pub(crate) fn directive(&self, key: &str) -> Option<&Value> {
        match self.0.get(key) {
            Some(Value::String(s)) if s.is_empty() => None,
            other => other,
        }
    }
}

impl From<Map<String, Value>> for QueryParams {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
