//! Request validation adapter.
//!
//! Compiles a schema node for one request slot into a [`Validator`]. A
//! validator parses the incoming value and returns the parsed (coerced,
//! defaulted) value, or one [`RequestValidationError`] per issue.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::trace;
use zod_schema::{Schema, ZodError, ZodIssue};

/// Request slot a schema validates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Slot {
    Body,
    Querystring,
    Params,
    Headers,
}

impl Slot {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::Querystring => "querystring",
            Self::Params => "params",
            Self::Headers => "headers",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Original issue and the complete parse error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationParams {
    pub issue: ZodIssue,
    pub error: ZodError,
}

/// One failed constraint of a request slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestValidationError {
    /// Issue code, e.g. `invalid_type`
    pub keyword: String,
    /// JSON pointer into the slot value, e.g. `/jobId`
    pub instance_path: String,
    /// `#<instancePath>/<keyword>`
    pub schema_path: String,
    pub message: String,
    pub slot: Slot,
    pub params: ValidationParams,
}

impl RequestValidationError {
    pub fn new(slot: Slot, issue: ZodIssue, error: ZodError) -> Self {
        let instance_path = issue.pointer();
        let keyword = issue.code.as_str().to_string();
        Self {
            schema_path: format!("#{}/{}", instance_path, keyword),
            keyword,
            instance_path,
            message: issue.message.clone(),
            slot,
            params: ValidationParams { issue, error },
        }
    }

    /// One error per issue of a parse error.
    pub fn from_zod(slot: Slot, error: &ZodError) -> Vec<Self> {
        error
            .issues
            .iter()
            .map(|issue| Self::new(slot, issue.clone(), error.clone()))
            .collect()
    }
}

impl fmt::Display for RequestValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} {}", self.slot, self.instance_path, self.message)
    }
}

/// Compiled validator for one slot.
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Schema,
    slot: Slot,
}

impl Validator {
    pub fn slot(&self) -> Slot {
        self.slot
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate a possibly absent value.
    ///
    /// `Ok(None)` means the value was absent and the schema allows it.
    pub fn validate(&self, value: Option<&Value>) -> Result<Option<Value>, Vec<RequestValidationError>> {
        match self.schema.safe_parse_maybe(value) {
            Ok(parsed) => Ok(parsed),
            Err(error) => {
                trace!(slot = %self.slot, issues = error.issues.len(), "Request validation failed");
                Err(RequestValidationError::from_zod(self.slot, &error))
            }
        }
    }
}

/// Builds validators for request slots.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatorCompiler;

impl ValidatorCompiler {
    pub fn new() -> Self {
        Self
    }

    pub fn compile(&self, schema: &Schema, slot: Slot) -> Validator {
        Validator {
            schema: schema.clone(),
            slot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zod_schema::z;

    #[test]
    fn test_valid_value_is_parsed() {
        let validator = ValidatorCompiler::new().compile(
            &z::object([("jobId", z::coerce::number())]),
            Slot::Querystring,
        );
        let parsed = validator.validate(Some(&json!({"jobId": "4"}))).unwrap();
        assert_eq!(parsed, Some(json!({"jobId": 4})));
    }

    #[test]
    fn test_error_fields() {
        let validator = ValidatorCompiler::new().compile(
            &z::object([("jobId", z::coerce::number())]),
            Slot::Querystring,
        );
        let errors = validator.validate(Some(&json!({"jobId": "a"}))).unwrap_err();
        assert_eq!(errors.len(), 1);
        let error = &errors[0];
        assert_eq!(error.keyword, "invalid_type");
        assert_eq!(error.instance_path, "/jobId");
        assert_eq!(error.schema_path, "#/jobId/invalid_type");
        assert_eq!(error.message, "Expected number, received nan");
        assert_eq!(error.to_string(), "querystring/jobId Expected number, received nan");
        assert_eq!(error.params.error.issues.len(), 1);
    }

    #[test]
    fn test_non_finite_number_is_an_error() {
        let validator = ValidatorCompiler::new().compile(
            &z::object([("n", z::coerce::number())]),
            Slot::Querystring,
        );
        for raw in ["1e400", "Infinity"] {
            let errors = validator.validate(Some(&json!({"n": raw}))).unwrap_err();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].instance_path, "/n");
        }
    }

    #[test]
    fn test_one_error_per_issue() {
        let validator = ValidatorCompiler::new().compile(
            &z::object([("a", z::string()), ("b", z::string())]),
            Slot::Body,
        );
        let errors = validator.validate(Some(&json!({}))).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[1].instance_path, "/b");
    }

    #[test]
    fn test_absent_value() {
        let validator = ValidatorCompiler::new().compile(&z::string().optional(), Slot::Body);
        assert_eq!(validator.validate(None).unwrap(), None);
        let validator = ValidatorCompiler::new().compile(&z::string(), Slot::Body);
        let errors = validator.validate(None).unwrap_err();
        assert_eq!(errors[0].message, "Required");
        assert_eq!(errors[0].instance_path, "");
    }

    #[test]
    fn test_serializes_camel_case() {
        let validator = ValidatorCompiler::new().compile(&z::string(), Slot::Params);
        let errors = validator.validate(Some(&json!(1))).unwrap_err();
        let value = serde_json::to_value(&errors[0]).unwrap();
        assert_eq!(value["instancePath"], json!(""));
        assert_eq!(value["schemaPath"], json!("#/invalid_type"));
        assert_eq!(value["slot"], json!("params"));
    }
}
