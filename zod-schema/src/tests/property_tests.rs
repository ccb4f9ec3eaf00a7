//! Property-based tests for the parse contract
//!
//! - Parsing is idempotent: re-parsing parsed output yields the same value
//! - Required keys follow declaration order
//! - Issue paths always point inside the input

use crate::{Direction, z};
use proptest::prelude::*;
use serde_json::{Value, json};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Parsed output parses again to itself
    #[test]
    fn prop_parse_is_idempotent(
        name in "[a-z]{1,12}",
        count in 0i64..1000,
        tags in prop::collection::vec("[a-z]{1,5}", 0..4),
        with_note in any::<bool>(),
    ) {
        let schema = z::object([
            ("name", z::string().min(1)),
            ("count", z::number().int().nonnegative()),
            ("tags", z::array(z::string())),
            ("note", z::string().optional()),
            ("status", z::enumeration(["open", "closed"]).default_value("open")),
        ]);
        let mut input = json!({"name": name, "count": count, "tags": tags});
        if with_note {
            input["note"] = json!("n");
        }

        let first = schema.safe_parse(&input);
        prop_assert!(first.is_ok(), "valid input should parse: {:?}", first);
        let first = first.unwrap();
        let second = schema.safe_parse(&first);
        prop_assert_eq!(second.ok(), Some(first));
    }

    /// `required` keeps declaration order and skips optional properties
    #[test]
    fn prop_required_keys_in_declaration_order(
        flags in prop::collection::vec(any::<bool>(), 1..8)
    ) {
        let properties: Vec<(String, crate::Schema)> = flags
            .iter()
            .enumerate()
            .map(|(i, optional)| {
                let schema = if *optional { z::string().optional() } else { z::string() };
                (format!("k{}", i), schema)
            })
            .collect();
        let expected: Vec<String> = flags
            .iter()
            .enumerate()
            .filter(|(_, optional)| !**optional)
            .map(|(i, _)| format!("k{}", i))
            .collect();

        let schema = z::object(properties);
        let required: Vec<String> = schema
            .shape()
            .unwrap()
            .required_keys(Direction::Input)
            .into_iter()
            .map(str::to_string)
            .collect();
        prop_assert_eq!(required, expected);
    }

    /// Every reported issue path resolves to a location in the input or to a
    /// missing key of an existing object
    #[test]
    fn prop_issue_paths_point_into_input(
        values in prop::collection::vec(prop_oneof![
            Just(json!(1)),
            Just(json!("x")),
            Just(json!(null)),
            Just(json!(true)),
        ], 0..6)
    ) {
        let schema = z::array(z::object([("id", z::string())]));
        let input = Value::Array(
            values.into_iter().map(|v| json!({"id": v})).collect()
        );
        if let Err(err) = schema.safe_parse(&input) {
            for issue in &err.issues {
                let pointer = issue.pointer();
                prop_assert!(input.pointer(&pointer).is_some(), "{} not in input", pointer);
            }
        }
    }

    /// Coerced numbers round-trip through their string form
    #[test]
    fn prop_coerce_number_from_string(n in -100_000i64..100_000) {
        let parsed = z::coerce::number().safe_parse(&json!(n.to_string()));
        prop_assert_eq!(parsed.ok(), Some(json!(n)));
    }
}
