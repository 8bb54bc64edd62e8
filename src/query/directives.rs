//! Decoding of the flat request directives: `$select`, `$sort`/`$orderby`,
//! `$limit`/`$top` and `$skip`.

use crate::errors::QueryError;
use crate::query::types::{DEFAULT_LIMIT, Order, Projection, QueryParams};
use crate::utils::num::lenient_i64;
use bson::{Bson, Document};
use serde_json::Value;

/// Decodes `$select` into a projection. Tokens are comma-separated and
/// trimmed; a leading `-` marks the rest of the token as excluded. Inclusion
/// and exclusion cannot be mixed.
pub fn decode_select(params: &QueryParams) -> Result<Option<Projection>, QueryError> {
    let Some(value) = params.directive("$select") else {
        return Ok(None);
    };
    let Some(raw) = value.as_str() else {
        log::warn!("ignoring non-string $select directive");
        return Ok(None);
    };

    let mut fields: Vec<String> = Vec::new();
    let mut has_include = false;
    let mut has_exclude = false;
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let name = match token.strip_prefix('-') {
            Some(rest) => {
                has_exclude = true;
                rest
            }
            None => {
                has_include = true;
                token
            }
        };
        if !fields.iter().any(|f| f == name) {
            fields.push(name.to_string());
        }
    }

    if has_include && has_exclude {
        return Err(QueryError::ConflictingProjection);
    }
    if fields.is_empty() {
        return Ok(None);
    }
    Ok(Some(if has_exclude { Projection::Exclude(fields) } else { Projection::Include(fields) }))
}

/// Decodes the sort directive. `$orderby` is read in preference to `$sort`;
/// per token a `" desc"`/`" asc"` suffix is checked before a `-`/`+` prefix
/// and a bare field sorts ascending. The last token wins a repeated field.
#[must_use]
pub fn decode_sort(params: &QueryParams) -> Option<Document> {
    let value = params.directive("$orderby").or_else(|| params.directive("$sort"))?;
    let Some(raw) = value.as_str() else {
        log::warn!("ignoring non-string sort directive");
        return None;
    };

    let mut sort = Document::new();
    for token in raw.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let (field, order) = if let Some(rest) = token.strip_suffix(" desc") {
            (rest, Order::Desc)
        } else if let Some(rest) = token.strip_suffix(" asc") {
            (rest, Order::Asc)
        } else if let Some(rest) = token.strip_prefix('-') {
            (rest, Order::Desc)
        } else if let Some(rest) = token.strip_prefix('+') {
            (rest, Order::Asc)
        } else {
            (token, Order::Asc)
        };
        sort.insert(field.to_string(), Bson::Int32(order.as_i32()));
    }

    if sort.is_empty() { None } else { Some(sort) }
}

/// Decodes the result cap. `$top` takes priority over `$limit`; an
/// unparseable value falls back to [`DEFAULT_LIMIT`] rather than to the
/// other alias.
#[must_use]
pub fn decode_limit(params: &QueryParams) -> i64 {
    let value = params.directive("$top").or_else(|| params.directive("$limit"));
    value.and_then(numeric_value).unwrap_or(DEFAULT_LIMIT)
}

/// Decodes `$skip`; absent or unparseable values give 0.
#[must_use]
pub fn decode_skip(params: &QueryParams) -> i64 {
    params.directive("$skip").and_then(numeric_value).unwrap_or(0)
}

/// Integer view of a directive value: strings parse leniently by digit
/// prefix, floats truncate toward zero, other shapes are unusable.
fn numeric_value(value: &Value) -> Option<i64> {
    match value {
        Value::String(s) => lenient_i64(s),
        Value::Number(n) => match n.as_i64() {
            Some(v) => Some(v),
            None => n.as_f64().map(|f| f as i64),
        },
        _ => None,
    }
}
