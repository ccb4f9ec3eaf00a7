//! Parse issues and the parse error type.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Machine-readable issue code, serialized in zod's snake_case form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType,
    InvalidLiteral,
    InvalidEnumValue,
    InvalidUnion,
    InvalidUnionDiscriminator,
    UnrecognizedKeys,
    InvalidString,
    TooSmall,
    TooBig,
    NotMultipleOf,
    Custom,
}

impl IssueCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidType => "invalid_type",
            Self::InvalidLiteral => "invalid_literal",
            Self::InvalidEnumValue => "invalid_enum_value",
            Self::InvalidUnion => "invalid_union",
            Self::InvalidUnionDiscriminator => "invalid_union_discriminator",
            Self::UnrecognizedKeys => "unrecognized_keys",
            Self::InvalidString => "invalid_string",
            Self::TooSmall => "too_small",
            Self::TooBig => "too_big",
            Self::NotMultipleOf => "not_multiple_of",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of an issue path: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(key) => f.write_str(key),
            Self::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// A single parse failure.
///
/// Field order follows zod's issue layout so serialized issues read the same.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZodIssue {
    pub code: IssueCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub received: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exact: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<Value>,
    pub path: Vec<PathSegment>,
    pub message: String,
}

impl ZodIssue {
    /// Create an issue with only a code, path and message.
    pub fn new(code: IssueCode, path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self {
            code,
            expected: None,
            received: None,
            minimum: None,
            maximum: None,
            kind: None,
            inclusive: None,
            exact: None,
            validation: None,
            keys: Vec::new(),
            options: Vec::new(),
            path,
            message: message.into(),
        }
    }

    /// Create an `invalid_type` issue.
    ///
    /// A missing value (`received == "undefined"`) gets zod's `Required`
    /// message.
    pub fn invalid_type(path: Vec<PathSegment>, expected: &str, received: &str) -> Self {
        let message = if received == "undefined" {
            "Required".to_string()
        } else {
            format!("Expected {}, received {}", expected, received)
        };
        let mut issue = Self::new(IssueCode::InvalidType, path, message);
        issue.expected = Some(Value::String(expected.to_string()));
        issue.received = Some(Value::String(received.to_string()));
        issue
    }

    /// Create a `custom` issue.
    pub fn custom(path: Vec<PathSegment>, message: impl Into<String>) -> Self {
        Self::new(IssueCode::Custom, path, message)
    }

    /// JSON-pointer style rendering of the path, e.g. `/items/0/name`.
    ///
    /// The root path renders as an empty string.
    pub fn pointer(&self) -> String {
        self.path
            .iter()
            .map(|segment| format!("/{}", segment))
            .collect()
    }
}

/// Error returned by [`crate::Schema::safe_parse`].
///
/// Displays as the pretty-printed JSON list of issues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
#[error("{}", render_issues(.issues))]
pub struct ZodError {
    pub issues: Vec<ZodIssue>,
}

impl ZodError {
    pub fn new(issues: Vec<ZodIssue>) -> Self {
        Self { issues }
    }

    /// Issues grouped by their first path segment, the way zod's `flatten`
    /// reports field errors.
    pub fn field_errors(&self) -> std::collections::BTreeMap<String, Vec<String>> {
        let mut fields = std::collections::BTreeMap::new();
        for issue in &self.issues {
            if let Some(first) = issue.path.first() {
                fields
                    .entry(first.to_string())
                    .or_insert_with(Vec::new)
                    .push(issue.message.clone());
            }
        }
        fields
    }
}

fn render_issues(issues: &[ZodIssue]) -> String {
    serde_json::to_string_pretty(issues).unwrap_or_else(|_| format!("{} issue(s)", issues.len()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_invalid_type_message() {
        let issue = ZodIssue::invalid_type(vec!["jobId".into()], "number", "nan");
        assert_eq!(issue.message, "Expected number, received nan");
        assert_eq!(issue.pointer(), "/jobId");
    }

    #[test]
    fn test_required_message() {
        let issue = ZodIssue::invalid_type(vec!["jobId".into()], "string", "undefined");
        assert_eq!(issue.message, "Required");
    }

    #[test]
    fn test_issue_serialization_layout() {
        let issue = ZodIssue::invalid_type(vec!["items".into(), 0.into()], "string", "number");
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(
            value,
            json!({
                "code": "invalid_type",
                "expected": "string",
                "received": "number",
                "path": ["items", 0],
                "message": "Expected string, received number"
            })
        );
    }

    #[test]
    fn test_root_pointer_is_empty() {
        let issue = ZodIssue::custom(vec![], "Invalid input");
        assert_eq!(issue.pointer(), "");
    }

    #[test]
    fn test_error_display_is_json() {
        let error = ZodError::new(vec![ZodIssue::custom(vec!["a".into()], "bad")]);
        let text = error.to_string();
        let parsed: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed[0]["message"], "bad");
    }

    #[test]
    fn test_field_errors_group_by_first_segment() {
        let error = ZodError::new(vec![
            ZodIssue::custom(vec!["a".into()], "one"),
            ZodIssue::custom(vec!["a".into(), 1.into()], "two"),
            ZodIssue::custom(vec![], "root"),
        ]);
        let fields = error.field_errors();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields["a"], vec!["one", "two"]);
    }
}
