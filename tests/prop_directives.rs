use mquery::query::{Projection, decode_limit, decode_select, decode_skip, decode_sort};
use mquery::{ParsedQuery, QueryParams};
use proptest::prelude::*;

proptest! {
    #[test]
    fn prop_parse_never_panics(query in ".{0,200}") {
        // Any byte soup must come back as Ok or a typed error, never a panic.
        let _ = ParsedQuery::from_query_str(&query);
    }

    #[test]
    fn prop_sort_directions_are_unit(fields in proptest::collection::vec("[a-z]{1,8}", 1..6), descs in proptest::collection::vec(any::<bool>(), 6)) {
        let spec = fields.iter().zip(&descs)
            .map(|(f, d)| if *d { format!("-{f}") } else { f.clone() })
            .collect::<Vec<_>>()
            .join(",");
        let mut params = QueryParams::new();
        params.insert("$sort", spec);
        if let Some(sort) = decode_sort(&params) {
            for (_, dir) in &sort {
                let v = dir.as_i32().unwrap();
                prop_assert!(v == 1 || v == -1);
            }
        }
    }

    #[test]
    fn prop_select_never_mixes_modes(tokens in proptest::collection::vec("-?[a-z]{1,8}", 0..8)) {
        let mut params = QueryParams::new();
        params.insert("$select", tokens.join(","));
        match decode_select(&params) {
            Ok(Some(Projection::Include(fields))) => {
                prop_assert!(tokens.iter().all(|t| !t.starts_with('-')));
                prop_assert!(!fields.is_empty());
            }
            Ok(Some(Projection::Exclude(fields))) => {
                prop_assert!(tokens.iter().all(|t| t.starts_with('-')));
                prop_assert!(!fields.is_empty());
            }
            Ok(None) => prop_assert!(tokens.is_empty()),
            Err(_) => {
                let has_inc = tokens.iter().any(|t| !t.starts_with('-'));
                let has_exc = tokens.iter().any(|t| t.starts_with('-'));
                prop_assert!(has_inc && has_exc);
            }
        }
    }

    #[test]
    fn prop_limit_matches_prefix_parse(raw in "[0-9]{1,6}[a-z]{0,4}") {
        let mut params = QueryParams::new();
        params.insert("$top", raw.clone());
        let digits: String = raw.chars().take_while(char::is_ascii_digit).collect();
        let expected = digits.parse::<i64>().unwrap();
        prop_assert_eq!(decode_limit(&params), expected);
    }

    #[test]
    fn prop_skip_is_never_negative_for_digit_input(raw in "[0-9]{1,6}") {
        let mut params = QueryParams::new();
        params.insert("$skip", raw);
        prop_assert!(decode_skip(&params) >= 0);
    }

    #[test]
    fn prop_defaults_always_win(
        // Bare `true`/`false`/`null` lex as literals, not property names.
        key in "[a-z]{1,8}".prop_filter("literal keyword", |k| {
            !matches!(k.as_str(), "true" | "false" | "null")
        }),
        req in any::<i64>(),
        def in any::<i64>(),
    ) {
        let mut params = QueryParams::new();
        params.insert("$filter", format!("{key} eq {req}"));
        let mut defaults = bson::Document::new();
        defaults.insert(key.clone(), bson::Bson::Int64(def));
        let parsed = ParsedQuery::parse(&params, Some(defaults)).unwrap();
        let query = parsed.query.unwrap();
        prop_assert_eq!(query.get_i64(&key).unwrap(), def);
    }
}
