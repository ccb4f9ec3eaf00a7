//! Error types
//!
//! Two families of errors exist:
//!
//! - [`HttpError`]: request-time failures rendered as an HTTP reply body
//!   (`{statusCode, error, code, message}`). Validation failures are client
//!   errors (400), response serialization failures are server errors (500).
//! - [`SetupError`]: fatal failures during route registration and document
//!   assembly. They abort `ready()` and never reach request handling.
//!
//! # Example
//! ```rust,ignore
//! use zod_openapi_plugin::{ErrorCode, HttpError};
//!
//! let error = HttpError::new(ErrorCode::NotFound, "Job not found");
//! let error = HttpError::not_found("Job not found"); // Convenience method
//! ```

use crate::document::DocPath;
use crate::validator::{RequestValidationError, Slot};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zod_schema::ZodError;

/// Type-safe error codes.
///
/// The validation and serialization codes keep their `FST_ERR_*` wire names
/// so clients written against fastify error bodies keep working.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Client errors (4xx)
    /// Request failed schema validation
    #[serde(rename = "FST_ERR_VALIDATION")]
    Validation,
    /// No route matches the request
    #[serde(rename = "FST_ERR_NOT_FOUND")]
    NotFound,
    /// The request was malformed
    BadRequest,
    /// Authentication is required
    Unauthorized,
    /// The authenticated caller lacks permission
    Forbidden,
    /// The request conflicts with current state
    Conflict,

    // Server errors (5xx)
    /// Handler output does not match its declared response schema
    #[serde(rename = "FST_ERR_RESPONSE_SERIALIZATION")]
    ResponseSerialization,
    /// An unexpected internal error occurred
    InternalServerError,
    /// The requested functionality is not implemented
    NotImplemented,
    /// The service is temporarily unavailable
    ServiceUnavailable,
}

impl ErrorCode {
    /// Returns the wire representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "FST_ERR_VALIDATION",
            Self::NotFound => "FST_ERR_NOT_FOUND",
            Self::BadRequest => "BAD_REQUEST",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden => "FORBIDDEN",
            Self::Conflict => "CONFLICT",
            Self::ResponseSerialization => "FST_ERR_RESPONSE_SERIALIZATION",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::NotImplemented => "NOT_IMPLEMENTED",
            Self::ServiceUnavailable => "SERVICE_UNAVAILABLE",
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation | Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::ResponseSerialization | Self::InternalServerError => 500,
            Self::NotImplemented => 501,
            Self::ServiceUnavailable => 503,
        }
    }

    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status_code())
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reason phrase for a status code, as used in the `error` field.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        409 => "Conflict",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        s if (400..500).contains(&s) => "Client Error",
        _ => "Server Error",
    }
}

/// Request-time error rendered as an HTTP reply.
///
/// Serializes to the reply body `{statusCode, error, code, message}`. The
/// optional `details`, `cause` and the validation issue list are kept for
/// logging and custom error handlers, never for the default body.
///
/// # Example
/// ```rust,ignore
/// use zod_openapi_plugin::{ErrorCode, HttpError};
///
/// let error = HttpError::new(ErrorCode::Conflict, "Job already exists")
///     .with_details(serde_json::json!({"jobId": "60002023"}))
///     .with_cause("unique constraint jobs_pkey");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Error)]
#[serde(rename_all = "camelCase")]
#[error("[{code}] {message}")]
pub struct HttpError {
    /// HTTP status code
    pub status_code: u16,
    /// Reason phrase for the status code
    pub error: String,
    /// Type-safe error code
    pub code: ErrorCode,
    /// Human-readable message
    pub message: String,
    /// Optional additional details
    #[serde(skip)]
    pub details: Option<serde_json::Value>,
    /// Optional cause for debugging (never sent to clients)
    #[serde(skip)]
    pub cause: Option<String>,
    /// Slot whose validation failed
    #[serde(skip)]
    pub validation_context: Option<Slot>,
    /// Validation issues, one per failed constraint
    #[serde(skip)]
    pub validation: Vec<RequestValidationError>,
}

impl HttpError {
    /// Create a new error with code and message. The status code follows the
    /// error code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        let status_code = code.status_code();
        Self {
            status_code,
            error: reason_phrase(status_code).to_string(),
            code,
            message: message.into(),
            details: None,
            cause: None,
            validation_context: None,
            validation: Vec::new(),
        }
    }

    /// Override the status code (and reason phrase).
    pub fn with_status(mut self, status_code: u16) -> Self {
        self.status_code = status_code;
        self.error = reason_phrase(status_code).to_string();
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Serialize) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }

    /// Add a cause string for debugging.
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Sanitize for a client response: drops details and cause, and hides the
    /// message of internal errors.
    pub fn sanitize(mut self) -> Self {
        if matches!(self.code, ErrorCode::InternalServerError) {
            self.message = "An internal error occurred".to_string();
        }
        self.details = None;
        self.cause = None;
        self
    }

    /// Reply body of this error.
    pub fn body(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| {
            serde_json::json!({
                "statusCode": self.status_code,
                "error": self.error,
                "code": self.code.as_str(),
                "message": self.message,
            })
        })
    }

    // Convenience constructors

    /// Create a validation error from the issues of one request slot.
    ///
    /// The message joins `"<slot><instancePath> <message>"` for every issue.
    pub fn validation(slot: Slot, errors: Vec<RequestValidationError>) -> Self {
        let message = errors
            .iter()
            .map(|e| format!("{}{} {}", slot, e.instance_path, e.message))
            .collect::<Vec<_>>()
            .join(", ");
        let mut error = Self::new(ErrorCode::Validation, message);
        error.validation_context = Some(slot);
        error.validation = errors;
        error
    }

    /// Create the generic response serialization error.
    pub fn response_serialization() -> Self {
        Self::new(
            ErrorCode::ResponseSerialization,
            "Response does not match the schema",
        )
    }

    /// Create a route-not-found error.
    pub fn route_not_found(method: &str, url: &str) -> Self {
        Self::new(
            ErrorCode::NotFound,
            format!("Route {}:{} not found", method, url),
        )
    }

    /// Create a NOT_FOUND error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    /// Create a BAD_REQUEST error.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BadRequest, message)
    }

    /// Create an UNAUTHORIZED error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    /// Create a FORBIDDEN error.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    /// Create a CONFLICT error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    /// Create an INTERNAL_SERVER_ERROR error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalServerError, message)
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("JSON error: {}", err))
    }
}

impl From<ResponseSerializationError> for HttpError {
    fn from(err: ResponseSerializationError) -> Self {
        Self::response_serialization().with_cause(err.cause.to_string())
    }
}

/// Result type alias for request handling.
pub type HttpResult<T> = Result<T, HttpError>;

/// Handler output failed its response schema.
///
/// Carries the parse error as the cause; the client only ever sees the
/// generic message.
#[derive(Debug, Clone, Error)]
#[error("Response does not match the schema")]
pub struct ResponseSerializationError {
    pub method: String,
    pub url: String,
    pub cause: ZodError,
}

impl ResponseSerializationError {
    pub fn new(method: impl Into<String>, url: impl Into<String>, cause: ZodError) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            cause,
        }
    }
}

/// Which kind of component a setup error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ComponentKind {
    Schemas,
    Parameters,
    Responses,
    RequestBodies,
}

impl ComponentKind {
    /// Key under `components` in the document.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schemas => "schemas",
            Self::Parameters => "parameters",
            Self::Responses => "responses",
            Self::RequestBodies => "requestBodies",
        }
    }

    pub const ALL: [ComponentKind; 4] = [
        Self::Schemas,
        Self::Parameters,
        Self::Responses,
        Self::RequestBodies,
    ];
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal errors raised while registering routes or assembling the document.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum SetupError {
    /// Documentation was requested but no plugin transforms routes
    #[error("Please register the zod-openapi plugin")]
    PluginNotRegistered,

    /// A querystring, params or headers slot is not an object schema
    #[error("{slot} schema of route {method} {url} must be an object schema")]
    NonObjectSlot {
        slot: Slot,
        method: String,
        url: String,
    },

    /// A pending registration path does not exist in the document
    #[error("Unable to resolve document path {path}")]
    UnresolvedPath { path: DocPath },

    /// One component name bound to two different definitions
    #[error("Component {kind}.{name} is registered with conflicting definitions")]
    ComponentConflict { kind: ComponentKind, name: String },

    /// Two routes share the same method and URL
    #[error("Route {method} {url} is already registered")]
    DuplicateRoute { method: String, url: String },

    /// The URL cannot be used as a path template
    #[error("Invalid route url: {0}")]
    InvalidRouteUrl(String),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for setup operations.
pub type SetupResult<T> = Result<T, SetupError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_code_wire_name() {
        let value = serde_json::to_value(ErrorCode::Validation).unwrap();
        assert_eq!(value, json!("FST_ERR_VALIDATION"));
        let value = serde_json::to_value(ErrorCode::InternalServerError).unwrap();
        assert_eq!(value, json!("INTERNAL_SERVER_ERROR"));
    }

    #[test]
    fn test_as_str_matches_serde() {
        for code in [
            ErrorCode::Validation,
            ErrorCode::NotFound,
            ErrorCode::BadRequest,
            ErrorCode::Unauthorized,
            ErrorCode::Forbidden,
            ErrorCode::Conflict,
            ErrorCode::ResponseSerialization,
            ErrorCode::InternalServerError,
            ErrorCode::NotImplemented,
            ErrorCode::ServiceUnavailable,
        ] {
            let value = serde_json::to_value(code).unwrap();
            assert_eq!(value, json!(code.as_str()));
        }
    }

    #[test]
    fn test_response_serialization_body() {
        let error = HttpError::response_serialization();
        assert_eq!(
            error.body(),
            json!({
                "statusCode": 500,
                "error": "Internal Server Error",
                "code": "FST_ERR_RESPONSE_SERIALIZATION",
                "message": "Response does not match the schema"
            })
        );
    }

    #[test]
    fn test_body_omits_details_and_cause() {
        let error = HttpError::conflict("exists")
            .with_details(json!({"id": 1}))
            .with_cause("db");
        let body = error.body();
        assert!(body.get("details").is_none());
        assert!(body.get("cause").is_none());
        assert_eq!(body["statusCode"], 409);
    }

    #[test]
    fn test_sanitize_internal_error() {
        let error = HttpError::internal("db password leaked").with_cause("x").sanitize();
        assert_eq!(error.message, "An internal error occurred");
        assert!(error.cause.is_none());
    }

    #[test]
    fn test_client_server_classification() {
        assert!(ErrorCode::Validation.is_client_error());
        assert!(ErrorCode::ResponseSerialization.is_server_error());
        assert!(!ErrorCode::NotFound.is_server_error());
    }

    #[test]
    fn test_setup_error_display() {
        assert_eq!(
            SetupError::PluginNotRegistered.to_string(),
            "Please register the zod-openapi plugin"
        );
        let err = SetupError::ComponentConflict {
            kind: ComponentKind::Schemas,
            name: "jobId".into(),
        };
        assert_eq!(
            err.to_string(),
            "Component schemas.jobId is registered with conflicting definitions"
        );
    }
}
