//! Parsing engine behind [`Schema::safe_parse`](crate::Schema::safe_parse).
//!
//! Parsing walks the schema and the value together, collecting every issue
//! instead of stopping at the first one. `None` stands for an absent value
//! (a missing object key) as opposed to JSON `null`.

use crate::checks::{ArrayCheck, NumberCheck, StringCheck, matches_format};
use crate::issue::{IssueCode, PathSegment, ZodIssue};
use crate::schema::{
    ArrayDef, BooleanDef, DiscriminatedUnionDef, Effect, NumberDef, ObjectShape, Schema,
    SchemaKind, StringDef, UnknownKeys,
};
use serde_json::{Map, Number, Value};
use tracing::trace;

pub(crate) fn parse_node(
    schema: &Schema,
    value: Option<&Value>,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    match schema.kind() {
        SchemaKind::Optional(inner) => value.and_then(|v| parse_node(inner, Some(v), path, issues)),
        SchemaKind::Nullable(inner) => match value {
            Some(Value::Null) => Some(Value::Null),
            other => parse_node(inner, other, path, issues),
        },
        SchemaKind::Default(inner, default) => match value {
            Some(v) => parse_node(inner, Some(v), path, issues),
            None => parse_node(inner, Some(default), path, issues),
        },
        SchemaKind::Effects(effects) => {
            let before = issues.len();
            let parsed = parse_node(&effects.inner, value, path, issues);
            if issues.len() > before {
                return None;
            }
            let parsed = parsed?;
            match &effects.effect {
                Effect::Refinement { check, message } => {
                    if check(&parsed) {
                        Some(parsed)
                    } else {
                        issues.push(ZodIssue::custom(path.clone(), message.clone()));
                        None
                    }
                }
                Effect::Transform(f) => Some(f(parsed)),
            }
        }
        SchemaKind::Any => value.cloned(),
        kind => match value {
            None => {
                issues.push(ZodIssue::invalid_type(
                    path.clone(),
                    &expected_name(kind),
                    "undefined",
                ));
                None
            }
            Some(value) => parse_present(kind, value, path, issues),
        },
    }
}

fn parse_present(
    kind: &SchemaKind,
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    match kind {
        SchemaKind::String(def) => parse_string(def, value, path, issues),
        SchemaKind::Number(def) => parse_number(def, value, path, issues),
        SchemaKind::Boolean(def) => parse_boolean(def, value, path, issues),
        SchemaKind::Null => match value {
            Value::Null => Some(Value::Null),
            other => invalid_type(path, "null", other, issues),
        },
        SchemaKind::Literal(expected) => {
            if value == expected {
                Some(value.clone())
            } else {
                let mut issue = ZodIssue::new(
                    IssueCode::InvalidLiteral,
                    path.clone(),
                    format!("Invalid literal value, expected {}", expected),
                );
                issue.expected = Some(expected.clone());
                issue.received = Some(value.clone());
                issues.push(issue);
                None
            }
        }
        SchemaKind::Enum(options) => parse_enum(options, value, path, issues),
        SchemaKind::Object(shape) => parse_object(shape, value, path, issues),
        SchemaKind::Array(def) => parse_array(def, value, path, issues),
        SchemaKind::Tuple(items) => parse_tuple(items, value, path, issues),
        SchemaKind::Record(values) => {
            let Value::Object(map) = value else {
                return invalid_type(path, "object", value, issues);
            };
            let mut out = Map::new();
            for (key, item) in map {
                path.push(PathSegment::Key(key.clone()));
                if let Some(parsed) = parse_node(values, Some(item), path, issues) {
                    out.insert(key.clone(), parsed);
                }
                path.pop();
            }
            Some(Value::Object(out))
        }
        SchemaKind::Union(options) => parse_union(options, value, path, issues),
        SchemaKind::DiscriminatedUnion(def) => parse_discriminated(def, value, path, issues),
        SchemaKind::Any
        | SchemaKind::Optional(_)
        | SchemaKind::Nullable(_)
        | SchemaKind::Default(..)
        | SchemaKind::Effects(_) => Some(value.clone()),
    }
}

fn parse_string(
    def: &StringDef,
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    let text = match (value, def.coerce) {
        (Value::String(s), _) => s.clone(),
        (Value::Number(n), true) => format_number(n),
        (Value::Bool(b), true) => b.to_string(),
        (Value::Null, true) => "null".to_string(),
        (other, _) => return invalid_type(path, "string", other, issues),
    };

    let length = text.chars().count();
    for check in &def.checks {
        match check {
            StringCheck::Min(min) if length < *min => issues.push(too_small(
                path,
                "string",
                *min as f64,
                false,
                format!("String must contain at least {} character(s)", min),
            )),
            StringCheck::Max(max) if length > *max => issues.push(too_big(
                path,
                "string",
                *max as f64,
                false,
                format!("String must contain at most {} character(s)", max),
            )),
            StringCheck::Length(exact) if length != *exact => {
                let message = format!("String must contain exactly {} character(s)", exact);
                issues.push(if length < *exact {
                    too_small(path, "string", *exact as f64, true, message)
                } else {
                    too_big(path, "string", *exact as f64, true, message)
                });
            }
            check => {
                if let Some(name) = check.validation_name()
                    && !matches_format(check, &text)
                {
                    trace!(validation = name, "String format check failed");
                    let message = if name == "regex" {
                        "Invalid".to_string()
                    } else {
                        format!("Invalid {}", name)
                    };
                    let mut issue = ZodIssue::new(IssueCode::InvalidString, path.clone(), message);
                    issue.validation = Some(name.to_string());
                    issues.push(issue);
                }
            }
        }
    }
    Some(Value::String(text))
}

fn parse_number(
    def: &NumberDef,
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    let number = match (value, def.coerce) {
        (Value::Number(n), _) => n.as_f64().unwrap_or(f64::NAN),
        (Value::String(s), true) => coerce_str_to_f64(s),
        (Value::Bool(b), true) => f64::from(u8::from(*b)),
        (Value::Null, true) => 0.0,
        (other, _) => return invalid_type(path, "number", other, issues),
    };

    if number.is_nan() {
        issues.push(ZodIssue::invalid_type(path.clone(), "number", "nan"));
        return None;
    }
    if number.is_infinite() {
        issues.push(ZodIssue::invalid_type(path.clone(), "number", "infinity"));
        return None;
    }
    if def.int && number.fract() != 0.0 {
        issues.push(ZodIssue::invalid_type(path.clone(), "integer", "float"));
        return None;
    }

    for check in &def.checks {
        match check {
            NumberCheck::Gte(min) if number < *min => issues.push(number_bound(
                path,
                IssueCode::TooSmall,
                *min,
                true,
                format!("Number must be greater than or equal to {}", format_f64(*min)),
            )),
            NumberCheck::Gt(min) if number <= *min => issues.push(number_bound(
                path,
                IssueCode::TooSmall,
                *min,
                false,
                format!("Number must be greater than {}", format_f64(*min)),
            )),
            NumberCheck::Lte(max) if number > *max => issues.push(number_bound(
                path,
                IssueCode::TooBig,
                *max,
                true,
                format!("Number must be less than or equal to {}", format_f64(*max)),
            )),
            NumberCheck::Lt(max) if number >= *max => issues.push(number_bound(
                path,
                IssueCode::TooBig,
                *max,
                false,
                format!("Number must be less than {}", format_f64(*max)),
            )),
            NumberCheck::MultipleOf(step) if *step != 0.0 && (number / step).fract() != 0.0 => {
                issues.push(ZodIssue::new(
                    IssueCode::NotMultipleOf,
                    path.clone(),
                    format!("Number must be a multiple of {}", format_f64(*step)),
                ))
            }
            _ => {}
        }
    }

    match value {
        Value::Number(_) => Some(value.clone()),
        _ => Some(number_value(number)),
    }
}

fn parse_boolean(
    def: &BooleanDef,
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    match (value, def.coerce) {
        (Value::Bool(b), _) => Some(Value::Bool(*b)),
        (other, true) => Some(Value::Bool(truthy(other))),
        (other, false) => invalid_type(path, "boolean", other, issues),
    }
}

fn parse_enum(
    options: &[String],
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    let expected = options
        .iter()
        .map(|o| format!("'{}'", o))
        .collect::<Vec<_>>()
        .join(" | ");
    let Value::String(s) = value else {
        return invalid_type(path, &expected, value, issues);
    };
    if options.iter().any(|o| o == s) {
        return Some(value.clone());
    }
    let mut issue = ZodIssue::new(
        IssueCode::InvalidEnumValue,
        path.clone(),
        format!("Invalid enum value. Expected {}, received '{}'", expected, s),
    );
    issue.received = Some(value.clone());
    issue.options = options.iter().cloned().map(Value::String).collect();
    issues.push(issue);
    None
}

fn parse_object(
    shape: &ObjectShape,
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    let Value::Object(input) = value else {
        return invalid_type(path, "object", value, issues);
    };

    let mut out = Map::new();
    for (key, schema) in shape.properties() {
        path.push(PathSegment::Key(key.to_string()));
        if let Some(parsed) = parse_node(schema, input.get(key), path, issues) {
            out.insert(key.to_string(), parsed);
        }
        path.pop();
    }

    let unknown: Vec<&String> = input.keys().filter(|k| shape.get(k).is_none()).collect();
    if !unknown.is_empty() {
        match shape.unknown_keys() {
            UnknownKeys::Strip => {}
            UnknownKeys::Passthrough => {
                for key in unknown {
                    if let Some(v) = input.get(key) {
                        out.insert(key.clone(), v.clone());
                    }
                }
            }
            UnknownKeys::Strict => {
                let listed = unknown
                    .iter()
                    .map(|k| format!("'{}'", k))
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut issue = ZodIssue::new(
                    IssueCode::UnrecognizedKeys,
                    path.clone(),
                    format!("Unrecognized key(s) in object: {}", listed),
                );
                issue.keys = unknown.into_iter().cloned().collect();
                issues.push(issue);
            }
        }
    }

    Some(Value::Object(out))
}

fn parse_array(
    def: &ArrayDef,
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    let Value::Array(items) = value else {
        return invalid_type(path, "array", value, issues);
    };

    let len = items.len();
    for check in &def.checks {
        match check {
            ArrayCheck::Min(min) if len < *min => issues.push(too_small(
                path,
                "array",
                *min as f64,
                false,
                format!("Array must contain at least {} element(s)", min),
            )),
            ArrayCheck::Max(max) if len > *max => issues.push(too_big(
                path,
                "array",
                *max as f64,
                false,
                format!("Array must contain at most {} element(s)", max),
            )),
            ArrayCheck::Length(exact) if len != *exact => {
                let message = format!("Array must contain exactly {} element(s)", exact);
                issues.push(if len < *exact {
                    too_small(path, "array", *exact as f64, true, message)
                } else {
                    too_big(path, "array", *exact as f64, true, message)
                });
            }
            _ => {}
        }
    }

    let mut out = Vec::with_capacity(len);
    for (index, item) in items.iter().enumerate() {
        path.push(PathSegment::Index(index));
        out.push(parse_node(&def.items, Some(item), path, issues).unwrap_or(Value::Null));
        path.pop();
    }
    Some(Value::Array(out))
}

fn parse_tuple(
    schemas: &[Schema],
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    let Value::Array(items) = value else {
        return invalid_type(path, "array", value, issues);
    };
    let expected = schemas.len();
    if items.len() < expected {
        issues.push(too_small(
            path,
            "array",
            expected as f64,
            false,
            format!("Array must contain at least {} element(s)", expected),
        ));
        return None;
    }
    if items.len() > expected {
        issues.push(too_big(
            path,
            "array",
            expected as f64,
            false,
            format!("Array must contain at most {} element(s)", expected),
        ));
        return None;
    }

    let mut out = Vec::with_capacity(expected);
    for (index, (schema, item)) in schemas.iter().zip(items).enumerate() {
        path.push(PathSegment::Index(index));
        out.push(parse_node(schema, Some(item), path, issues).unwrap_or(Value::Null));
        path.pop();
    }
    Some(Value::Array(out))
}

fn parse_union(
    options: &[Schema],
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    for option in options {
        let mut branch_issues = Vec::new();
        let parsed = parse_node(option, Some(value), path, &mut branch_issues);
        if branch_issues.is_empty() {
            return parsed;
        }
    }
    issues.push(ZodIssue::new(IssueCode::InvalidUnion, path.clone(), "Invalid input"));
    None
}

fn parse_discriminated(
    def: &DiscriminatedUnionDef,
    value: &Value,
    path: &mut Vec<PathSegment>,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    let Value::Object(map) = value else {
        return invalid_type(path, "object", value, issues);
    };

    let tag = map.get(&def.discriminator);
    let chosen = def.options.iter().find(|option| {
        tag.is_some_and(|tag| discriminator_values(option, &def.discriminator).contains(tag))
    });

    match chosen {
        Some(option) => parse_node(option, Some(value), path, issues),
        None => {
            let options: Vec<Value> = def
                .options
                .iter()
                .flat_map(|option| discriminator_values(option, &def.discriminator))
                .collect();
            let expected = options
                .iter()
                .map(|o| match o {
                    Value::String(s) => format!("'{}'", s),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" | ");
            let mut discriminator_path = path.clone();
            discriminator_path.push(PathSegment::Key(def.discriminator.clone()));
            let mut issue = ZodIssue::new(
                IssueCode::InvalidUnionDiscriminator,
                discriminator_path,
                format!("Invalid discriminator value. Expected {}", expected),
            );
            issue.options = options;
            issues.push(issue);
            None
        }
    }
}

/// Literal values an option accepts for the discriminator key.
pub(crate) fn discriminator_values(option: &Schema, key: &str) -> Vec<Value> {
    let Some(field) = option.shape().and_then(|shape| shape.get(key)) else {
        return Vec::new();
    };
    match field.unwrapped().kind() {
        SchemaKind::Literal(value) => vec![value.clone()],
        SchemaKind::Enum(values) => values.iter().cloned().map(Value::String).collect(),
        _ => Vec::new(),
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn invalid_type(
    path: &[PathSegment],
    expected: &str,
    received: &Value,
    issues: &mut Vec<ZodIssue>,
) -> Option<Value> {
    issues.push(ZodIssue::invalid_type(
        path.to_vec(),
        expected,
        received_name(received),
    ));
    None
}

fn too_small(path: &[PathSegment], kind: &str, minimum: f64, exact: bool, message: String) -> ZodIssue {
    let mut issue = ZodIssue::new(IssueCode::TooSmall, path.to_vec(), message);
    issue.minimum = Some(minimum);
    issue.kind = Some(kind.to_string());
    issue.inclusive = Some(true);
    issue.exact = Some(exact);
    issue
}

fn too_big(path: &[PathSegment], kind: &str, maximum: f64, exact: bool, message: String) -> ZodIssue {
    let mut issue = ZodIssue::new(IssueCode::TooBig, path.to_vec(), message);
    issue.maximum = Some(maximum);
    issue.kind = Some(kind.to_string());
    issue.inclusive = Some(true);
    issue.exact = Some(exact);
    issue
}

fn number_bound(
    path: &[PathSegment],
    code: IssueCode,
    bound: f64,
    inclusive: bool,
    message: String,
) -> ZodIssue {
    let mut issue = ZodIssue::new(code, path.to_vec(), message);
    if code == IssueCode::TooSmall {
        issue.minimum = Some(bound);
    } else {
        issue.maximum = Some(bound);
    }
    issue.kind = Some("number".to_string());
    issue.inclusive = Some(inclusive);
    issue.exact = Some(false);
    issue
}

/// Type name used in `received`, following zod's parsed-type names.
pub(crate) fn received_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected_name(kind: &SchemaKind) -> String {
    match kind {
        SchemaKind::Number(def) if def.int => "integer".to_string(),
        SchemaKind::Literal(value) => value.to_string(),
        SchemaKind::Enum(options) => options
            .iter()
            .map(|o| format!("'{}'", o))
            .collect::<Vec<_>>()
            .join(" | "),
        SchemaKind::Tuple(_) => "array".to_string(),
        SchemaKind::Record(_) | SchemaKind::DiscriminatedUnion(_) => "object".to_string(),
        other => other.name().to_string(),
    }
}

fn coerce_str_to_f64(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    if trimmed
        .chars()
        .any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E')
    {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn number_value(number: f64) -> Value {
    if number.fract() == 0.0 && number.abs() < 9.007_199_254_740_992e15 {
        Value::Number(Number::from(number as i64))
    } else {
        Number::from_f64(number).map_or(Value::Null, Value::Number)
    }
}

fn format_f64(number: f64) -> String {
    if number.fract() == 0.0 && number.abs() < 9.007_199_254_740_992e15 {
        format!("{}", number as i64)
    } else {
        format!("{}", number)
    }
}

fn format_number(number: &Number) -> String {
    match number.as_f64() {
        Some(f) if !number.is_i64() && !number.is_u64() => format_f64(f),
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::z;
    use serde_json::json;

    #[test]
    fn test_number_value_prefers_integers() {
        assert_eq!(number_value(12.0), json!(12));
        assert_eq!(number_value(1.5), json!(1.5));
    }

    #[test]
    fn test_coerce_empty_string_is_zero() {
        assert_eq!(coerce_str_to_f64("  "), 0.0);
        assert!(coerce_str_to_f64("a").is_nan());
        assert!(coerce_str_to_f64("inf").is_nan());
        assert!(coerce_str_to_f64("-Infinity").is_nan());
    }

    #[test]
    fn test_format_f64_integral() {
        assert_eq!(format_f64(5.0), "5");
        assert_eq!(format_f64(0.5), "0.5");
    }

    #[test]
    fn test_discriminator_values_from_literals() {
        let option = z::object([("type", z::literal("a")), ("value", z::string())]);
        assert_eq!(discriminator_values(&option, "type"), vec![json!("a")]);
        assert!(discriminator_values(&option, "missing").is_empty());
    }
}
