//! `$rawQuery` coercion: a JSON predicate tree with typed-literal markers.
//!
//! A mapping node carrying one of the marker keys `$date`, `$objectId`,
//! `$int`, `$float`, `$string` with a scalar value collapses to the coerced
//! scalar itself; everything else converts structurally. Markers with
//! container values do not fire, the containers are walked instead.

use crate::errors::QueryError;
use crate::query::types::MAX_RAW_QUERY_DEPTH;
use crate::utils::num::{lenient_f64, lenient_i64};
use crate::utils::time::parse_datetime;
use bson::oid::ObjectId;
use bson::{Bson, Document};
use serde_json::{Map, Number, Value};

/// Marker keys, in the order they are tried on a single node.
const MARKERS: [&str; 5] = ["$date", "$objectId", "$int", "$float", "$string"];

/// Coerces a raw-query value into the predicate document. Accepts a JSON
/// object or a string holding one; anything else, unparseable JSON, or a tree
/// whose root collapses to a scalar is rejected.
pub fn parse_raw_query(value: &Value) -> Result<Document, QueryError> {
    let root = match value {
        Value::String(s) => {
            serde_json::from_str::<Value>(s).map_err(|e| QueryError::InvalidRawQuery(e.to_string()))?
        }
        Value::Object(_) => value.clone(),
        _ => {
            return Err(QueryError::InvalidRawQuery("expected a JSON object or string".into()));
        }
    };
    let Value::Object(map) = root else {
        return Err(QueryError::InvalidRawQuery("raw query must be a JSON object".into()));
    };
    match coerce_map(&map, 0)? {
        Bson::Document(doc) => Ok(doc),
        _ => Err(QueryError::InvalidRawQuery("raw query collapses to a scalar".into())),
    }
}

fn coerce_value(value: &Value, depth: usize) -> Result<Bson, QueryError> {
    if depth > MAX_RAW_QUERY_DEPTH {
        return Err(QueryError::InvalidRawQuery("nesting too deep".into()));
    }
    match value {
        Value::Null => Ok(Bson::Null),
        Value::Bool(b) => Ok(Bson::Boolean(*b)),
        Value::Number(n) => Ok(number_to_bson(n)),
        Value::String(s) => Ok(Bson::String(s.clone())),
        Value::Array(items) => {
            let mut arr = Vec::with_capacity(items.len());
            for item in items {
                arr.push(coerce_value(item, depth + 1)?);
            }
            Ok(Bson::Array(arr))
        }
        Value::Object(map) => coerce_map(map, depth),
    }
}

fn coerce_map(map: &Map<String, Value>, depth: usize) -> Result<Bson, QueryError> {
    if depth > MAX_RAW_QUERY_DEPTH {
        return Err(QueryError::InvalidRawQuery("nesting too deep".into()));
    }
    for marker in MARKERS {
        if let Some(value) = map.get(marker)
            && marker_applies(marker, value)
        {
            return coerce_marker(marker, value);
        }
    }
    let mut doc = Document::new();
    for (key, value) in map {
        doc.insert(key.clone(), coerce_value(value, depth + 1)?);
    }
    Ok(Bson::Document(doc))
}

/// A marker fires only on scalar values; `$objectId` additionally requires a
/// string. Nodes where the marker holds a container are walked normally.
fn marker_applies(marker: &str, value: &Value) -> bool {
    if value.is_object() || value.is_array() {
        return false;
    }
    marker != "$objectId" || value.is_string()
}

fn coerce_marker(marker: &str, value: &Value) -> Result<Bson, QueryError> {
    match marker {
        "$date" => match value {
            Value::String(s) => parse_datetime(s)
                .map(Bson::DateTime)
                .ok_or_else(|| QueryError::InvalidRawQuery(format!("invalid $date value: {s}"))),
            Value::Number(n) => match number_to_millis(n) {
                Some(ms) => Ok(Bson::DateTime(bson::DateTime::from_millis(ms))),
                None => Err(QueryError::InvalidRawQuery(format!("invalid $date value: {n}"))),
            },
            other => Err(QueryError::InvalidRawQuery(format!("invalid $date value: {other}"))),
        },
        "$objectId" => match value {
            Value::String(s) => ObjectId::parse_str(s)
                .map(Bson::ObjectId)
                .map_err(|_| QueryError::InvalidRawQuery(format!("invalid $objectId value: {s}"))),
            _ => unreachable!(),
        },
        "$int" => match value {
            Value::String(s) => lenient_i64(s)
                .map(Bson::Int64)
                .ok_or_else(|| QueryError::InvalidRawQuery(format!("invalid $int value: {s}"))),
            Value::Number(n) => match n.as_i64() {
                Some(v) => Ok(Bson::Int64(v)),
                None => match n.as_f64() {
                    Some(f) => Ok(Bson::Int64(f as i64)),
                    None => Err(QueryError::InvalidRawQuery(format!("invalid $int value: {n}"))),
                },
            },
            other => Err(QueryError::InvalidRawQuery(format!("invalid $int value: {other}"))),
        },
        "$float" => match value {
            Value::String(s) => lenient_f64(s)
                .map(Bson::Double)
                .ok_or_else(|| QueryError::InvalidRawQuery(format!("invalid $float value: {s}"))),
            Value::Number(n) => match n.as_f64() {
                Some(f) => Ok(Bson::Double(f)),
                None => Err(QueryError::InvalidRawQuery(format!("invalid $float value: {n}"))),
            },
            other => {
                Err(QueryError::InvalidRawQuery(format!("invalid $float value: {other}")))
            }
        },
        "$string" => Ok(match value {
            Value::Null => Bson::Null,
            Value::Bool(b) => Bson::String(b.to_string()),
            Value::Number(n) => Bson::String(n.to_string()),
            Value::String(s) => Bson::String(s.clone()),
            _ => unreachable!(),
        }),
        _ => unreachable!(),
    }
}

fn number_to_bson(n: &Number) -> Bson {
    if let Some(v) = n.as_i64() {
        Bson::Int64(v)
    } else {
        Bson::Double(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn number_to_millis(n: &Number) -> Option<i64> {
    match n.as_i64() {
        Some(v) => Some(v),
        None => n.as_f64().map(|f| f as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<Document, QueryError> {
        parse_raw_query(&value)
    }

    #[test]
    fn date_marker_becomes_datetime() {
        let doc = parse(json!({"createdAt": {"$date": "2016-01-01T00:00:00Z"}})).unwrap();
        match doc.get("createdAt") {
            Some(Bson::DateTime(dt)) => assert_eq!(dt.timestamp_millis(), 1_451_606_400_000),
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn date_marker_accepts_epoch_millis() {
        let doc = parse(json!({"at": {"$date": 1_451_606_400_000i64}})).unwrap();
        match doc.get("at") {
            Some(Bson::DateTime(dt)) => assert_eq!(dt.timestamp_millis(), 1_451_606_400_000),
            other => panic!("expected datetime, got {other:?}"),
        }
    }

    #[test]
    fn object_id_marker_parses_hex() {
        let doc = parse(json!({"_id": {"$objectId": "507f1f77bcf86cd799439011"}})).unwrap();
        match doc.get("_id") {
            Some(Bson::ObjectId(oid)) => {
                assert_eq!(oid.to_hex(), "507f1f77bcf86cd799439011");
            }
            other => panic!("expected object id, got {other:?}"),
        }
    }

    #[test]
    fn object_id_marker_ignores_non_strings() {
        let doc = parse(json!({"_id": {"$objectId": 5}})).unwrap();
        let inner = doc.get_document("_id").unwrap();
        assert_eq!(inner.get_i64("$objectId").unwrap(), 5);
    }

    #[test]
    fn int_and_float_markers() {
        let doc = parse(json!({"a": {"$int": "42"}, "b": {"$float": "1.5"}})).unwrap();
        assert_eq!(doc.get_i64("a").unwrap(), 42);
        assert_eq!(doc.get_f64("b").unwrap(), 1.5);
    }

    #[test]
    fn string_marker_stringifies() {
        let doc = parse(json!({"a": {"$string": 5}, "b": {"$string": true}, "c": {"$string": null}}))
            .unwrap();
        assert_eq!(doc.get_str("a").unwrap(), "5");
        assert_eq!(doc.get_str("b").unwrap(), "true");
        assert_eq!(doc.get("c"), Some(&Bson::Null));
    }

    #[test]
    fn markers_fire_inside_arrays() {
        let doc = parse(json!({"$or": [{"a": {"$int": "1"}}, {"b": {"$int": "2"}}]})).unwrap();
        let arr = doc.get_array("$or").unwrap();
        let first = arr[0].as_document().unwrap();
        assert_eq!(first.get_i64("a").unwrap(), 1);
    }

    #[test]
    fn container_valued_marker_does_not_fire() {
        let doc = parse(json!({"x": {"$date": {"inner": 1}}})).unwrap();
        let x = doc.get_document("x").unwrap();
        assert_eq!(x.get_document("$date").unwrap().get_i64("inner").unwrap(), 1);
    }

    #[test]
    fn string_input_is_parsed_as_json() {
        let raw = Value::String(r#"{"n": {"$int": "7"}}"#.into());
        let doc = parse_raw_query(&raw).unwrap();
        assert_eq!(doc.get_i64("n").unwrap(), 7);
    }

    #[test]
    fn invalid_json_string_is_rejected() {
        let raw = Value::String("{not json".into());
        assert!(matches!(parse_raw_query(&raw), Err(QueryError::InvalidRawQuery(_))));
    }

    #[test]
    fn invalid_marker_values_are_rejected() {
        assert!(parse(json!({"a": {"$date": "never"}})).is_err());
        assert!(parse(json!({"a": {"$objectId": "xyz"}})).is_err());
        assert!(parse(json!({"a": {"$int": "abc"}})).is_err());
        assert!(parse(json!({"a": {"$float": "kg"}})).is_err());
    }

    #[test]
    fn top_level_marker_is_rejected() {
        assert!(matches!(
            parse(json!({"$date": "2016-01-01T00:00:00Z"})),
            Err(QueryError::InvalidRawQuery(_))
        ));
    }

    #[test]
    fn non_object_inputs_are_rejected() {
        assert!(parse(json!([1, 2])).is_err());
        assert!(parse(json!(42)).is_err());
        let arr_str = Value::String("[1,2]".into());
        assert!(parse_raw_query(&arr_str).is_err());
    }
}
