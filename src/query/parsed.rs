//! Assembly of the full [`ParsedQuery`] from raw request parameters.

use crate::errors::QueryError;
use crate::query::directives::{decode_limit, decode_select, decode_skip, decode_sort};
use crate::query::filter::{FilterGrammar, compile_filter};
use crate::query::merge::deep_merge;
use crate::query::odata::ODataGrammar;
use crate::query::raw::parse_raw_query;
use crate::query::types::{Projection, QueryParams};
use bson::Document;
use serde::Serialize;
use serde_json::Value;

/// The immutable result of decoding one request's parameters.
///
/// `filter` and `raw_query` hold their individual predicates; `query` is the
/// merged predicate the store should receive: filter first, raw query over
/// it, caller defaults over both (defaults always win), `None` when nothing
/// constrains the query at all.
#[derive(Debug, Clone, Serialize)]
pub struct ParsedQuery {
    pub select: Option<Projection>,
    pub sort: Option<Document>,
    pub limit: i64,
    pub skip: i64,
    pub filter: Option<Document>,
    #[serde(rename = "rawQuery")]
    pub raw_query: Option<Document>,
    pub query: Option<Document>,
}

impl ParsedQuery {
    /// Decodes `params` with the stock OData `$filter` grammar.
    pub fn parse(params: &QueryParams, defaults: Option<Document>) -> Result<Self, QueryError> {
        Self::parse_with(params, defaults, &ODataGrammar)
    }

    /// Decodes `params`, parsing `$filter` with the supplied grammar.
    pub fn parse_with(
        params: &QueryParams,
        defaults: Option<Document>,
        grammar: &dyn FilterGrammar,
    ) -> Result<Self, QueryError> {
        let select = decode_select(params)?;
        let sort = decode_sort(params);
        let limit = decode_limit(params);
        let skip = decode_skip(params);

        let filter = match params.directive("$filter") {
            Some(Value::String(s)) => Some(compile_filter(&grammar.parse_filter(s)?)?),
            Some(_) => {
                return Err(QueryError::InvalidFilterExpression("$filter must be a string".into()));
            }
            None => None,
        };
        let raw_query = match params.directive("$rawQuery") {
            Some(value) => Some(parse_raw_query(value)?),
            None => None,
        };

        let mut merged = Document::new();
        if let Some(f) = &filter {
            deep_merge(&mut merged, f.clone());
        }
        if let Some(r) = &raw_query {
            deep_merge(&mut merged, r.clone());
        }
        if let Some(d) = defaults {
            deep_merge(&mut merged, d);
        }
        let query = if merged.is_empty() { None } else { Some(merged) };

        Ok(Self { select, sort, limit, skip, filter, raw_query, query })
    }

    /// Decodes an encoded query string with no caller defaults.
    pub fn from_query_str(query: &str) -> Result<Self, QueryError> {
        Self::parse(&QueryParams::from_query_str(query), None)
    }

    /// Decodes a JSON value holding either a query string or a parameter
    /// object (`null` means no parameters).
    pub fn from_value(value: &Value, defaults: Option<Document>) -> Result<Self, QueryError> {
        Self::parse(&QueryParams::from_value(value)?, defaults)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::DEFAULT_LIMIT;
    use bson::doc;

    #[test]
    fn empty_params_give_bare_defaults() {
        let parsed = ParsedQuery::from_query_str("").unwrap();
        assert!(parsed.select.is_none());
        assert!(parsed.sort.is_none());
        assert_eq!(parsed.limit, DEFAULT_LIMIT);
        assert_eq!(parsed.skip, 0);
        assert!(parsed.filter.is_none());
        assert!(parsed.raw_query.is_none());
        assert!(parsed.query.is_none());
    }

    #[test]
    fn defaults_always_win_the_merge() {
        let params = QueryParams::from_query_str("$filter=kind eq 'draft'");
        let parsed = ParsedQuery::parse(&params, Some(doc! {"kind": "published"})).unwrap();
        assert_eq!(parsed.query, Some(doc! {"kind": "published"}));
        assert_eq!(parsed.filter, Some(doc! {"kind": "draft"}));
    }

    #[test]
    fn raw_query_overrides_filter() {
        let params =
            QueryParams::from_query_str("$filter=n eq 1&$rawQuery=%7B%22n%22%3A%202%7D");
        let parsed = ParsedQuery::parse(&params, None).unwrap();
        assert_eq!(parsed.query, Some(doc! {"n": 2i64}));
    }

    #[test]
    fn non_string_filter_is_rejected() {
        let mut params = QueryParams::new();
        params.insert("$filter", 42);
        assert!(matches!(
            ParsedQuery::parse(&params, None),
            Err(QueryError::InvalidFilterExpression(_))
        ));
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let parsed = ParsedQuery::from_query_str("$select=a&$top=3").unwrap();
        let value = serde_json::to_value(&parsed).unwrap();
        assert_eq!(value["limit"], 3);
        assert_eq!(value["select"]["a"], true);
        assert!(value.get("rawQuery").is_some());
    }
}
