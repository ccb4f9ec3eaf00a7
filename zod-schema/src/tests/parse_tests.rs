//! Parsing tests - issue codes, paths, coercion, defaults and effects.

use crate::{IssueCode, PathSegment, z};
use serde_json::json;

// =============================================================================
// Primitives
// =============================================================================

#[test]
fn test_string_accepts_string() {
    assert_eq!(z::string().safe_parse(&json!("a")).unwrap(), json!("a"));
}

#[test]
fn test_string_rejects_number() {
    let err = z::string().safe_parse(&json!(1)).unwrap_err();
    assert_eq!(err.issues.len(), 1);
    assert_eq!(err.issues[0].code, IssueCode::InvalidType);
    assert_eq!(err.issues[0].message, "Expected string, received number");
    assert!(err.issues[0].path.is_empty());
}

#[test]
fn test_string_min_reports_all_failures() {
    let schema = z::string().min(5).email();
    let err = schema.safe_parse(&json!("abc")).unwrap_err();
    let codes: Vec<_> = err.issues.iter().map(|i| i.code).collect();
    assert_eq!(codes, vec![IssueCode::TooSmall, IssueCode::InvalidString]);
    assert_eq!(
        err.issues[0].message,
        "String must contain at least 5 character(s)"
    );
    assert_eq!(err.issues[1].message, "Invalid email");
}

#[test]
fn test_number_int_rejects_float() {
    let err = z::number().int().safe_parse(&json!(1.5)).unwrap_err();
    assert_eq!(err.issues[0].message, "Expected integer, received float");
}

#[test]
fn test_number_bounds() {
    let schema = z::number().gt(0.0).lte(10.0);
    assert!(schema.safe_parse(&json!(10)).is_ok());
    let err = schema.safe_parse(&json!(0)).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::TooSmall);
    assert_eq!(err.issues[0].message, "Number must be greater than 0");
    let err = schema.safe_parse(&json!(11)).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::TooBig);
}

#[test]
fn test_coerce_number_from_string() {
    let parsed = z::coerce::number().safe_parse(&json!("12")).unwrap();
    assert_eq!(parsed, json!(12));
}

#[test]
fn test_coerce_number_nan() {
    let err = z::coerce::number().safe_parse(&json!("a")).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::InvalidType);
    assert_eq!(err.issues[0].received, Some(json!("nan")));
    assert_eq!(err.issues[0].message, "Expected number, received nan");
}

#[test]
fn test_coerce_number_rejects_non_finite() {
    let schema = z::object([("n", z::coerce::number())]);

    let err = schema.safe_parse(&json!({"n": "1e400"})).unwrap_err();
    assert_eq!(err.issues.len(), 1);
    assert_eq!(err.issues[0].code, IssueCode::InvalidType);
    assert_eq!(err.issues[0].path, vec![PathSegment::Key("n".into())]);
    assert_eq!(err.issues[0].message, "Expected number, received infinity");

    let err = schema.safe_parse(&json!({"n": "Infinity"})).unwrap_err();
    assert_eq!(err.issues[0].message, "Expected number, received nan");

    let err = schema.safe_parse(&json!({"n": "-1e400"})).unwrap_err();
    assert_eq!(err.issues[0].received, Some(json!("infinity")));
}

#[test]
fn test_coerce_boolean_truthiness() {
    let schema = z::coerce::boolean();
    assert_eq!(schema.safe_parse(&json!("false")).unwrap(), json!(true));
    assert_eq!(schema.safe_parse(&json!("")).unwrap(), json!(false));
    assert_eq!(schema.safe_parse(&json!(0)).unwrap(), json!(false));
}

#[test]
fn test_literal_and_enum() {
    assert!(z::literal("a").safe_parse(&json!("a")).is_ok());
    let err = z::literal("a").safe_parse(&json!("b")).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::InvalidLiteral);

    let schema = z::enumeration(["red", "green"]);
    let err = schema.safe_parse(&json!("blue")).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::InvalidEnumValue);
    assert_eq!(
        err.issues[0].message,
        "Invalid enum value. Expected 'red' | 'green', received 'blue'"
    );
}

// =============================================================================
// Objects
// =============================================================================

#[test]
fn test_object_missing_required_field() {
    let schema = z::object([("jobId", z::string())]);
    let err = schema.safe_parse(&json!({})).unwrap_err();
    assert_eq!(err.issues[0].message, "Required");
    assert_eq!(err.issues[0].path, vec![PathSegment::Key("jobId".into())]);
    assert_eq!(err.issues[0].pointer(), "/jobId");
}

#[test]
fn test_object_strips_unknown_keys() {
    let schema = z::object([("a", z::string())]);
    let parsed = schema.safe_parse(&json!({"a": "x", "b": 1})).unwrap();
    assert_eq!(parsed, json!({"a": "x"}));
}

#[test]
fn test_object_passthrough_keeps_unknown_keys() {
    let schema = z::object([("a", z::string())]).passthrough();
    let parsed = schema.safe_parse(&json!({"a": "x", "b": 1})).unwrap();
    assert_eq!(parsed, json!({"a": "x", "b": 1}));
}

#[test]
fn test_object_strict_rejects_unknown_keys() {
    let schema = z::object([("a", z::string())]).strict();
    let err = schema.safe_parse(&json!({"a": "x", "b": 1})).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::UnrecognizedKeys);
    assert_eq!(err.issues[0].keys, vec!["b".to_string()]);
    assert_eq!(err.issues[0].message, "Unrecognized key(s) in object: 'b'");
}

#[test]
fn test_optional_field_omitted() {
    let schema = z::object([("a", z::string().optional())]);
    assert_eq!(schema.safe_parse(&json!({})).unwrap(), json!({}));
}

#[test]
fn test_default_applied_when_missing() {
    let schema = z::object([("jobId", z::string().default_value("foo"))]);
    assert_eq!(
        schema.safe_parse(&json!({})).unwrap(),
        json!({"jobId": "foo"})
    );
    assert_eq!(
        schema.safe_parse(&json!({"jobId": "bar"})).unwrap(),
        json!({"jobId": "bar"})
    );
}

#[test]
fn test_nullable_accepts_null_not_missing() {
    let schema = z::object([("a", z::string().nullable())]);
    assert_eq!(
        schema.safe_parse(&json!({"a": null})).unwrap(),
        json!({"a": null})
    );
    assert!(schema.safe_parse(&json!({})).is_err());
}

#[test]
fn test_nested_paths() {
    let schema = z::object([(
        "items",
        z::array(z::object([("name", z::string())])),
    )]);
    let err = schema
        .safe_parse(&json!({"items": [{"name": "a"}, {"name": 2}]}))
        .unwrap_err();
    assert_eq!(err.issues[0].pointer(), "/items/1/name");
}

// =============================================================================
// Arrays, tuples, records
// =============================================================================

#[test]
fn test_array_length_checks() {
    let schema = z::array(z::string()).min(2);
    let err = schema.safe_parse(&json!(["a"])).unwrap_err();
    assert_eq!(
        err.issues[0].message,
        "Array must contain at least 2 element(s)"
    );
}

#[test]
fn test_tuple_length_and_items() {
    let schema = z::tuple([z::string(), z::number()]);
    assert!(schema.safe_parse(&json!(["a", 1])).is_ok());
    assert!(schema.safe_parse(&json!(["a"])).is_err());
    let err = schema.safe_parse(&json!(["a", "b"])).unwrap_err();
    assert_eq!(err.issues[0].pointer(), "/1");
}

#[test]
fn test_record_values() {
    let schema = z::record(z::number());
    assert!(schema.safe_parse(&json!({"a": 1, "b": 2})).is_ok());
    let err = schema.safe_parse(&json!({"a": "x"})).unwrap_err();
    assert_eq!(err.issues[0].pointer(), "/a");
}

// =============================================================================
// Unions
// =============================================================================

#[test]
fn test_union_first_match_wins() {
    let schema = z::union([z::string(), z::number()]);
    assert_eq!(schema.safe_parse(&json!(1)).unwrap(), json!(1));
    let err = schema.safe_parse(&json!(true)).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::InvalidUnion);
}

#[test]
fn test_discriminated_union_selects_option() {
    let schema = z::discriminated_union(
        "type",
        [
            z::object([("type", z::literal("a")), ("a", z::string())]),
            z::object([("type", z::literal("b")), ("b", z::number())]),
        ],
    );
    assert!(schema.safe_parse(&json!({"type": "b", "b": 1})).is_ok());

    let err = schema.safe_parse(&json!({"type": "b", "b": "x"})).unwrap_err();
    assert_eq!(err.issues[0].pointer(), "/b");

    let err = schema.safe_parse(&json!({"type": "c"})).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::InvalidUnionDiscriminator);
    assert_eq!(err.issues[0].pointer(), "/type");
    assert_eq!(
        err.issues[0].message,
        "Invalid discriminator value. Expected 'a' | 'b'"
    );
}

// =============================================================================
// Effects
// =============================================================================

#[test]
fn test_refine_custom_issue() {
    let schema = z::string().refine(|v| v.as_str() == Some("ok"), "must be ok");
    assert!(schema.safe_parse(&json!("ok")).is_ok());
    let err = schema.safe_parse(&json!("no")).unwrap_err();
    assert_eq!(err.issues[0].code, IssueCode::Custom);
    assert_eq!(err.issues[0].message, "must be ok");
}

#[test]
fn test_refine_skipped_when_inner_fails() {
    let schema = z::string().refine(|_| false, "never");
    let err = schema.safe_parse(&json!(1)).unwrap_err();
    assert_eq!(err.issues.len(), 1);
    assert_eq!(err.issues[0].code, IssueCode::InvalidType);
}

#[test]
fn test_transform_maps_output() {
    let schema = z::string().transform(|v| json!(v.as_str().map(str::len)));
    assert_eq!(schema.safe_parse(&json!("abcd")).unwrap(), json!(4));
}

#[test]
fn test_safe_parse_maybe_absent() {
    assert_eq!(z::string().optional().safe_parse_maybe(None).unwrap(), None);
    assert!(z::string().safe_parse_maybe(None).is_err());
}
