//! Constraint checks attached to primitive and array schemas.

use serde::{Deserialize, Serialize};

/// String constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", content = "value", rename_all = "snake_case")]
pub enum StringCheck {
    /// Minimum length in characters: `.min(n)`
    Min(usize),
    /// Maximum length in characters: `.max(n)`
    Max(usize),
    /// Exact length in characters: `.length(n)`
    Length(usize),
    /// Email format: `.email()`
    Email,
    /// UUID format: `.uuid()`
    Uuid,
    /// URL format: `.url()`
    Url,
    /// ISO 8601 datetime: `.datetime()`
    Datetime,
    /// Regex pattern: `.regex(pattern)`
    Regex(String),
}

impl StringCheck {
    /// Zod validation name reported in `invalid_string` issues.
    pub fn validation_name(&self) -> Option<&'static str> {
        match self {
            Self::Email => Some("email"),
            Self::Uuid => Some("uuid"),
            Self::Url => Some("url"),
            Self::Datetime => Some("datetime"),
            Self::Regex(_) => Some("regex"),
            Self::Min(_) | Self::Max(_) | Self::Length(_) => None,
        }
    }
}

/// Numeric constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "check", content = "value", rename_all = "snake_case")]
pub enum NumberCheck {
    /// `>= n`
    Gte(f64),
    /// `> n`
    Gt(f64),
    /// `<= n`
    Lte(f64),
    /// `< n`
    Lt(f64),
    /// Multiple of `n`
    MultipleOf(f64),
}

/// Array length constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "check", content = "value", rename_all = "snake_case")]
pub enum ArrayCheck {
    /// Minimum number of items
    Min(usize),
    /// Maximum number of items
    Max(usize),
    /// Exact number of items
    Length(usize),
}

const UUID_PATTERN: &str =
    r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$";
const DATETIME_PATTERN: &str =
    r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})$";
const URL_PATTERN: &str = r"^[a-zA-Z][a-zA-Z0-9+.-]*://[^\s/?#]+[^\s]*$";

/// Check a string value against a format check.
///
/// Returns `true` when the value satisfies the check. Length checks always pass
/// here; they are evaluated by the parser which also reports the bound.
pub(crate) fn matches_format(check: &StringCheck, value: &str) -> bool {
    match check {
        StringCheck::Email => is_email(value),
        StringCheck::Uuid => regex_match(UUID_PATTERN, value),
        StringCheck::Url => regex_match(URL_PATTERN, value),
        StringCheck::Datetime => regex_match(DATETIME_PATTERN, value),
        StringCheck::Regex(pattern) => regex_match(pattern, value),
        StringCheck::Min(_) | StringCheck::Max(_) | StringCheck::Length(_) => true,
    }
}

fn regex_match(pattern: &str, value: &str) -> bool {
    match regex::Regex::new(pattern) {
        Ok(re) => re.is_match(value),
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Invalid schema regex pattern");
            false
        }
    }
}

fn is_email(value: &str) -> bool {
    let mut parts = value.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format() {
        assert!(matches_format(&StringCheck::Email, "a@example.com"));
        assert!(!matches_format(&StringCheck::Email, "a@example"));
        assert!(!matches_format(&StringCheck::Email, "@example.com"));
        assert!(!matches_format(&StringCheck::Email, "a@b@example.com"));
    }

    #[test]
    fn test_uuid_format() {
        assert!(matches_format(
            &StringCheck::Uuid,
            "0190a6d4-8b3e-7c11-9a2b-3c4d5e6f7a8b"
        ));
        assert!(!matches_format(&StringCheck::Uuid, "not-a-uuid"));
    }

    #[test]
    fn test_datetime_format() {
        assert!(matches_format(&StringCheck::Datetime, "2024-01-01T00:00:00Z"));
        assert!(matches_format(
            &StringCheck::Datetime,
            "2024-01-01T00:00:00.123+02:00"
        ));
        assert!(!matches_format(&StringCheck::Datetime, "2024-01-01"));
    }

    #[test]
    fn test_invalid_regex_never_matches() {
        assert!(!matches_format(&StringCheck::Regex("(".into()), "("));
    }

    #[test]
    fn test_length_checks_pass_format() {
        assert!(matches_format(&StringCheck::Min(3), ""));
    }
}
