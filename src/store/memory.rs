//! In-memory [`DataStore`] backend.
//!
//! Evaluates wire-shape predicates (`$and`/`$or` nodes, `$lt`-family
//! comparison wrappers, regex leaves, dotted field paths) directly over a
//! `Vec<Document>`. Numeric comparisons bridge `Int32`/`Int64`/`Double` so a
//! filter literal matches a document value of a different numeric width.

use crate::query::types::MAX_PATH_DEPTH;
use crate::store::{DataStore, FindSpec, UpdateAck};
use bson::{Bson, Document};
use parking_lot::RwLock;
use std::cmp::Ordering;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("Unsupported update operator: {0}")]
    UnsupportedOperator(String),

    #[error("Invalid update document: {0}")]
    InvalidUpdate(String),
}

/// A store backed by a locked `Vec<Document>`. Reads clone the matching
/// documents out, so cursors never hold the lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: RwLock<Vec<Document>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doc: Document) {
        self.docs.write().push(doc);
    }

    pub fn insert_many(&self, docs: impl IntoIterator<Item = Document>) {
        self.docs.write().extend(docs);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Clones out the entire contents, in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Document> {
        self.docs.read().clone()
    }
}

pub struct MemoryCursor {
    docs: Vec<Document>,
    pos: usize,
}

impl MemoryCursor {
    pub fn advance(&mut self) -> Option<Document> {
        if self.pos >= self.docs.len() {
            return None;
        }
        let d = self.docs[self.pos].clone();
        self.pos += 1;
        Some(d)
    }

    #[must_use]
    pub fn to_vec(self) -> Vec<Document> {
        if self.pos == 0 {
            return self.docs;
        }
        self.docs.into_iter().skip(self.pos).collect()
    }
}

impl Iterator for MemoryCursor {
    type Item = Document;
    fn next(&mut self) -> Option<Self::Item> {
        self.advance()
    }
}

impl DataStore for MemoryStore {
    type Cursor = MemoryCursor;
    type Error = MemoryStoreError;

    fn count(&self, filter: Option<&Document>) -> Result<u64, Self::Error> {
        let docs = self.docs.read();
        let n = match filter {
            None => docs.len(),
            Some(f) => docs.iter().filter(|d| matches_filter(d, f)).count(),
        };
        Ok(n as u64)
    }

    fn find(&self, spec: &FindSpec) -> Result<Self::Cursor, Self::Error> {
        let deadline = spec.timeout_ms.map(|ms| Instant::now() + Duration::from_millis(ms));

        let mut docs: Vec<Document> = {
            let guard = self.docs.read();
            guard
                .iter()
                .filter(|d| {
                    if let Some(dl) = deadline
                        && Instant::now() > dl
                    {
                        return false;
                    }
                    spec.filter.as_ref().is_none_or(|f| matches_filter(d, f))
                })
                .cloned()
                .collect()
        };

        if let Some(sort) = &spec.sort {
            docs.sort_by(|a, b| compare_docs(a, b, sort));
        }

        if let Some(projection) = &spec.projection {
            for d in &mut docs {
                *d = apply_projection(d, projection);
            }
        }

        let skip = usize::try_from(spec.skip).unwrap_or(0);
        // Cursor conventions: limit 0 means unlimited, a negative limit
        // caps by its magnitude.
        let limit = match spec.limit {
            0 => usize::MAX,
            n => usize::try_from(n.unsigned_abs()).unwrap_or(usize::MAX),
        };
        let docs: Vec<Document> = docs.into_iter().skip(skip).take(limit).collect();

        Ok(MemoryCursor { docs, pos: 0 })
    }

    fn update_one(&self, filter: &Document, update: &Document) -> Result<UpdateAck, Self::Error> {
        let mut docs = self.docs.write();
        let Some(target) = docs.iter_mut().find(|d| matches_filter(d, filter)) else {
            return Ok(UpdateAck { matched: 0, modified: 0 });
        };

        let changed = apply_update(target, update)?;
        Ok(UpdateAck { matched: 1, modified: u64::from(changed) })
    }
}

/// Evaluates a wire-shape predicate document against `doc`. Every key is a
/// conjunct: logical `$and`/`$or` arrays, operator-wrapper documents, regex
/// leaves or plain equality.
pub fn matches_filter(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, cond)| match key.as_str() {
        "$and" => match cond {
            Bson::Array(items) => items.iter().all(|item| match item {
                Bson::Document(f) => matches_filter(doc, f),
                _ => false,
            }),
            _ => false,
        },
        "$or" => match cond {
            Bson::Array(items) => items.iter().any(|item| match item {
                Bson::Document(f) => matches_filter(doc, f),
                _ => false,
            }),
            _ => false,
        },
        path => matches_field(doc, path, cond),
    })
}

fn matches_field(doc: &Document, path: &str, cond: &Bson) -> bool {
    match cond {
        Bson::Document(wrapper) if is_operator_doc(wrapper) => {
            wrapper.iter().all(|(op, value)| matches_op(doc, path, op, value))
        }
        Bson::RegularExpression(re) => {
            let Some(Bson::String(s)) = get_path(doc, path) else {
                return false;
            };
            let mut builder = regex::RegexBuilder::new(re.pattern.as_str());
            builder.case_insensitive(re.options.as_str().contains('i'));
            match builder.build() {
                Ok(r) => r.is_match(s),
                Err(_) => false,
            }
        }
        value => get_path(doc, path).is_some_and(|v| values_equal(v, value)),
    }
}

fn matches_op(doc: &Document, path: &str, op: &str, value: &Bson) -> bool {
    let field = get_path(doc, path);
    match op {
        // A missing field is "not equal", matching store behavior.
        "$ne" => !field.is_some_and(|v| values_equal(v, value)),
        "$lt" => field.is_some_and(|v| compare_bson(v, value) == Ordering::Less),
        "$lte" => field.is_some_and(|v| compare_bson(v, value) != Ordering::Greater),
        "$gt" => field.is_some_and(|v| compare_bson(v, value) == Ordering::Greater),
        "$gte" => field.is_some_and(|v| compare_bson(v, value) != Ordering::Less),
        other => {
            log::warn!("unsupported filter operator: {other}");
            false
        }
    }
}

fn is_operator_doc(doc: &Document) -> bool {
    !doc.is_empty() && doc.keys().all(|k| k.starts_with('$'))
}

fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return as_f64_num(a) == as_f64_num(b);
    }
    a == b
}

fn is_num(x: &Bson) -> bool {
    matches!(x, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

fn as_f64_num(x: &Bson) -> f64 {
    match x {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

pub fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return as_f64_num(a).total_cmp(&as_f64_num(b));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        (Bson::DateTime(x), Bson::DateTime(y)) => x.cmp(y),
        (Bson::ObjectId(x), Bson::ObjectId(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null => 0,
        Bson::Boolean(_) => 1,
        Bson::Int32(_) => 2,
        Bson::Int64(_) => 3,
        Bson::Double(_) => 4,
        Bson::String(_) => 5,
        Bson::Array(_) => 6,
        Bson::Document(_) => 7,
        Bson::ObjectId(_) => 8,
        Bson::DateTime(_) => 9,
        Bson::RegularExpression(_) => 10,
        _ => 200,
    }
}

fn compare_docs(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, dir) in sort {
        let va = get_path(a, field);
        let vb = get_path(b, field);
        let ord = match (va, vb) {
            (Some(x), Some(y)) => compare_bson(x, y),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            let descending = matches!(compare_bson(dir, &Bson::Int32(0)), Ordering::Less);
            return if descending { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}

/// Applies an inclusion or exclusion projection. The first value decides the
/// mode; dotted paths are honored on both sides.
fn apply_projection(doc: &Document, projection: &Document) -> Document {
    let include = projection.iter().next().is_some_and(|(_, v)| value_truthy(v));
    if include {
        let mut out = Document::new();
        for (field, flag) in projection {
            if value_truthy(flag)
                && let Some(v) = get_path(doc, field)
            {
                set_path(&mut out, field, v.clone());
            }
        }
        out
    } else {
        let mut out = doc.clone();
        for (field, flag) in projection {
            if !value_truthy(flag) {
                unset_path(&mut out, field);
            }
        }
        out
    }
}

fn value_truthy(v: &Bson) -> bool {
    match v {
        Bson::Boolean(b) => *b,
        Bson::Int32(i) => *i != 0,
        Bson::Int64(i) => *i != 0,
        Bson::Double(f) => *f != 0.0,
        _ => false,
    }
}

fn get_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > 1024 {
        return None;
    }
    let mut cur = doc;
    let mut segs = 0usize;
    let mut iter = path.split('.').peekable();
    while let Some(seg) = iter.next() {
        segs += 1;
        if segs > MAX_PATH_DEPTH {
            return None;
        }
        if iter.peek().is_none() {
            return cur.get(seg);
        }
        match cur.get(seg) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    None
}

fn ensure_subdoc<'a>(root: &'a mut Document, key: &str) -> &'a mut Document {
    let needs_new = !matches!(root.get(key), Some(Bson::Document(_)));
    if needs_new {
        root.insert(key.to_string(), Bson::Document(Document::new()));
    }
    match root.get_mut(key) {
        Some(Bson::Document(d)) => d,
        _ => unreachable!(),
    }
}

fn traverse_to_parent<'a>(root: &'a mut Document, path: &str) -> (&'a mut Document, String) {
    let mut cur = root;
    let mut iter = path.split('.').peekable();
    let mut last = String::new();
    while let Some(seg) = iter.next() {
        if iter.peek().is_none() {
            last = seg.to_string();
            break;
        }
        cur = ensure_subdoc(cur, seg);
    }
    (cur, last)
}

fn set_path(root: &mut Document, path: &str, value: Bson) -> bool {
    let (parent, last) = traverse_to_parent(root, path);
    let old = parent.insert(last, value.clone());
    old.as_ref() != Some(&value)
}

fn unset_path(root: &mut Document, path: &str) -> bool {
    let (parent, last) = traverse_to_parent(root, path);
    parent.remove(&last).is_some()
}

fn inc_path(root: &mut Document, path: &str, by: f64) -> bool {
    let cur = get_path(root, path).cloned().unwrap_or(Bson::Double(0.0));
    let newv = Bson::Double(as_f64_num(&cur) + by);
    set_path(root, path, newv)
}

fn apply_update(doc: &mut Document, update: &Document) -> Result<bool, MemoryStoreError> {
    let has_ops = update.keys().any(|k| k.starts_with('$'));
    if !has_ops {
        // Plain document: full replacement.
        let changed = *doc != *update;
        *doc = update.clone();
        return Ok(changed);
    }

    let mut changed = false;
    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(MemoryStoreError::InvalidUpdate(format!(
                "{op} expects a document of field paths"
            )));
        };
        match op.as_str() {
            "$inc" => {
                for (path, by) in fields {
                    if inc_path(doc, path, as_f64_num_lossy(by)) {
                        changed = true;
                    }
                }
            }
            "$set" => {
                for (path, value) in fields {
                    if set_path(doc, path, value.clone()) {
                        changed = true;
                    }
                }
            }
            "$unset" => {
                for (path, _) in fields {
                    if unset_path(doc, path) {
                        changed = true;
                    }
                }
            }
            other => return Err(MemoryStoreError::UnsupportedOperator(other.to_string())),
        }
    }
    Ok(changed)
}

fn as_f64_num_lossy(v: &Bson) -> f64 {
    if is_num(v) { as_f64_num(v) } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert_many([
            doc! {"name": "alice", "age": 31, "info": {"visits": 3}},
            doc! {"name": "bob", "age": 25, "info": {"visits": 9}},
            doc! {"name": "carol", "age": 40},
        ]);
        store
    }

    #[test]
    fn equality_bridges_numeric_widths() {
        let store = seeded();
        // Int64 literal against Int32 document values.
        let n = store.count(Some(&doc! {"age": 31i64})).unwrap();
        assert_eq!(n, 1);
        let n = store.count(Some(&doc! {"age": 31.0})).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn dotted_paths_reach_subdocuments() {
        let store = seeded();
        let n = store.count(Some(&doc! {"info.visits": {"$gt": 5}})).unwrap();
        assert_eq!(n, 1);
    }

    #[test]
    fn ne_matches_missing_fields() {
        let store = seeded();
        let n = store.count(Some(&doc! {"info.visits": {"$ne": 3}})).unwrap();
        // bob (9) and carol (missing).
        assert_eq!(n, 2);
    }

    #[test]
    fn and_or_combinators() {
        let store = seeded();
        let filter = doc! {"$or": [{"name": "alice"}, {"age": {"$gte": 40}}]};
        assert_eq!(store.count(Some(&filter)).unwrap(), 2);
        let filter = doc! {"$and": [{"age": {"$gt": 20}}, {"age": {"$lt": 30}}]};
        assert_eq!(store.count(Some(&filter)).unwrap(), 1);
    }

    #[test]
    fn regex_leaves_match_substrings() {
        let store = seeded();
        let filter = doc! {"name": Bson::RegularExpression(bson::Regex {
            pattern: bson::raw::cstr!("ar").into(),
            options: bson::raw::cstr!("").into(),
        })};
        assert_eq!(store.count(Some(&filter)).unwrap(), 1);
    }

    #[test]
    fn find_applies_sort_skip_limit() {
        let store = seeded();
        let spec = FindSpec {
            sort: Some(doc! {"age": -1}),
            skip: 1,
            limit: 1,
            ..FindSpec::default()
        };
        let docs = store.find(&spec).unwrap().to_vec();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("name").unwrap(), "alice");
    }

    #[test]
    fn zero_limit_returns_everything() {
        let store = seeded();
        let spec = FindSpec { limit: 0, ..FindSpec::default() };
        assert_eq!(store.find(&spec).unwrap().to_vec().len(), 3);
    }

    #[test]
    fn inclusion_and_exclusion_projections() {
        let store = seeded();
        let spec = FindSpec {
            filter: Some(doc! {"name": "alice"}),
            projection: Some(doc! {"info.visits": true}),
            limit: 0,
            ..FindSpec::default()
        };
        let docs = store.find(&spec).unwrap().to_vec();
        assert_eq!(docs[0], doc! {"info": {"visits": 3}});

        let spec = FindSpec {
            filter: Some(doc! {"name": "alice"}),
            projection: Some(doc! {"info": false}),
            limit: 0,
            ..FindSpec::default()
        };
        let docs = store.find(&spec).unwrap().to_vec();
        assert_eq!(docs[0], doc! {"name": "alice", "age": 31});
    }

    #[test]
    fn update_one_increments_nested_paths() {
        let store = seeded();
        let ack = store
            .update_one(&doc! {"name": "alice"}, &doc! {"$inc": {"info.visits": 2, "hits": 1}})
            .unwrap();
        assert_eq!(ack, UpdateAck { matched: 1, modified: 1 });
        let docs = store.snapshot();
        assert_eq!(docs[0].get_document("info").unwrap().get_f64("visits").unwrap(), 5.0);
        assert_eq!(docs[0].get_f64("hits").unwrap(), 1.0);
    }

    #[test]
    fn update_one_without_match_acks_zero() {
        let store = seeded();
        let ack = store.update_one(&doc! {"name": "nobody"}, &doc! {"$inc": {"n": 1}}).unwrap();
        assert_eq!(ack, UpdateAck::default());
    }

    #[test]
    fn unknown_update_operator_errors() {
        let store = seeded();
        let err = store
            .update_one(&doc! {"name": "alice"}, &doc! {"$rename": {"a": "b"}})
            .unwrap_err();
        assert!(matches!(err, MemoryStoreError::UnsupportedOperator(op) if op == "$rename"));
    }
}
