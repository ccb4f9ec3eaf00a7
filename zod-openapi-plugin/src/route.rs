//! Route definitions.
//!
//! A route carries a [`RouteSchema`] whose slots may hold native schema nodes,
//! pre-shaped OpenAPI objects or plain JSON Schema values. The same definition
//! feeds both the document and the request-time adapters.
//!
//! # Example
//! ```rust,ignore
//! use zod_openapi_plugin::{Method, RouteSchema};
//! use zod_schema::z;
//!
//! let schema = RouteSchema::new()
//!     .params(z::object([("jobId", z::string())]))
//!     .body(z::object([("name", z::string())]))
//!     .response(201, z::object([("jobId", z::string())]))
//!     .tag("jobs");
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use zod_schema::Schema;

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl Method {
    /// Upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }

    /// Lower-case key used under `paths.<url>`.
    pub fn operation_key(&self) -> &'static str {
        match self {
            Self::Get => "get",
            Self::Post => "post",
            Self::Put => "put",
            Self::Patch => "patch",
            Self::Delete => "delete",
            Self::Head => "head",
            Self::Options => "options",
        }
    }

    /// Parse a method name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(Self::Get),
            "POST" => Some(Self::Post),
            "PUT" => Some(Self::Put),
            "PATCH" => Some(Self::Patch),
            "DELETE" => Some(Self::Delete),
            "HEAD" => Some(Self::Head),
            "OPTIONS" => Some(Self::Options),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Schema of a querystring, params or headers slot, or of a media type.
#[derive(Debug, Clone)]
pub enum SlotSchema {
    /// Native schema node
    Zod(Schema),
    /// Plain JSON Schema, documented as is and never validated
    Json(Value),
}

impl From<Schema> for SlotSchema {
    fn from(schema: Schema) -> Self {
        Self::Zod(schema)
    }
}

impl From<Value> for SlotSchema {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// OpenAPI media type object.
#[derive(Debug, Clone, Default)]
pub struct MediaTypeObject {
    pub schema: Option<SlotSchema>,
    pub example: Option<Value>,
    pub examples: Option<Value>,
}

impl MediaTypeObject {
    pub fn new(schema: impl Into<SlotSchema>) -> Self {
        Self {
            schema: Some(schema.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }
}

/// OpenAPI request body object whose media types may hold native schemas.
#[derive(Debug, Clone, Default)]
pub struct RequestBodyObject {
    /// Component id, promotes the body to `components.requestBodies.<id>`
    pub id: Option<String>,
    pub description: Option<String>,
    pub content: BTreeMap<String, MediaTypeObject>,
    /// Defaults to true
    pub required: Option<bool>,
}

impl RequestBodyObject {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_content(mut self, media_type: impl Into<String>, media: MediaTypeObject) -> Self {
        self.content.insert(media_type.into(), media);
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// OpenAPI response object whose media types may hold native schemas.
#[derive(Debug, Clone, Default)]
pub struct ResponseObject {
    /// Component id, promotes the response to `components.responses.<id>`
    pub id: Option<String>,
    /// Defaults to "Default Response"
    pub description: Option<String>,
    pub content: BTreeMap<String, MediaTypeObject>,
    /// Object schema whose properties become response headers
    pub headers: Option<Schema>,
}

impl ResponseObject {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn with_content(mut self, media_type: impl Into<String>, media: MediaTypeObject) -> Self {
        self.content.insert(media_type.into(), media);
        self
    }

    #[must_use]
    pub fn with_headers(mut self, headers: Schema) -> Self {
        self.headers = Some(headers);
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Request body slot.
#[derive(Debug, Clone)]
pub enum BodySchema {
    Zod(Schema),
    RequestBody(RequestBodyObject),
    Json(Value),
}

impl From<Schema> for BodySchema {
    fn from(schema: Schema) -> Self {
        Self::Zod(schema)
    }
}

impl From<RequestBodyObject> for BodySchema {
    fn from(body: RequestBodyObject) -> Self {
        Self::RequestBody(body)
    }
}

impl From<Value> for BodySchema {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Response slot for one status code.
#[derive(Debug, Clone)]
pub enum ResponseSchema {
    Zod(Schema),
    Response(ResponseObject),
    Json(Value),
}

impl From<Schema> for ResponseSchema {
    fn from(schema: Schema) -> Self {
        Self::Zod(schema)
    }
}

impl From<ResponseObject> for ResponseSchema {
    fn from(response: ResponseObject) -> Self {
        Self::Response(response)
    }
}

impl From<Value> for ResponseSchema {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Schemas and documentation attached to a route.
#[derive(Debug, Clone, Default)]
pub struct RouteSchema {
    pub body: Option<BodySchema>,
    pub querystring: Option<SlotSchema>,
    pub params: Option<SlotSchema>,
    pub headers: Option<SlotSchema>,
    /// Keyed by status: `"200"`, `"2XX"` or `"default"`
    pub response: BTreeMap<String, ResponseSchema>,
    /// Leave the route out of the document
    pub hide: bool,
    pub consumes: Vec<String>,
    pub produces: Vec<String>,
    pub tags: Vec<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub operation_id: Option<String>,
    pub deprecated: bool,
}

impl RouteSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<BodySchema>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn querystring(mut self, schema: impl Into<SlotSchema>) -> Self {
        self.querystring = Some(schema.into());
        self
    }

    #[must_use]
    pub fn params(mut self, schema: impl Into<SlotSchema>) -> Self {
        self.params = Some(schema.into());
        self
    }

    #[must_use]
    pub fn headers(mut self, schema: impl Into<SlotSchema>) -> Self {
        self.headers = Some(schema.into());
        self
    }

    /// Declare the response for a status code (`200`, `"2XX"`, `"default"`).
    #[must_use]
    pub fn response(mut self, status: impl ToString, schema: impl Into<ResponseSchema>) -> Self {
        self.response.insert(status.to_string(), schema.into());
        self
    }

    #[must_use]
    pub fn hide(mut self) -> Self {
        self.hide = true;
        self
    }

    #[must_use]
    pub fn consumes(mut self, media_type: impl Into<String>) -> Self {
        self.consumes.push(media_type.into());
        self
    }

    #[must_use]
    pub fn produces(mut self, media_type: impl Into<String>) -> Self {
        self.produces.push(media_type.into());
        self
    }

    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn operation_id(mut self, id: impl Into<String>) -> Self {
        self.operation_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Native schema nodes the request-time adapters run, untouched by
    /// documentation.
    pub fn runtime_schemas(&self) -> RouteSchemas {
        let native = |slot: &Option<SlotSchema>| match slot {
            Some(SlotSchema::Zod(schema)) => Some(schema.clone()),
            _ => None,
        };
        let body = match &self.body {
            Some(BodySchema::Zod(schema)) => Some(BodyValidation::Single(schema.clone())),
            Some(BodySchema::RequestBody(object)) => {
                let by_type: BTreeMap<String, Schema> = native_content(&object.content);
                (!by_type.is_empty()).then_some(BodyValidation::ByContentType(by_type))
            }
            _ => None,
        };
        let response = self
            .response
            .iter()
            .map(|(status, slot)| {
                let runtime = match slot {
                    ResponseSchema::Zod(schema) => ResponseRuntime::Native(schema.clone()),
                    ResponseSchema::Response(object) => {
                        match native_content(&object.content).into_values().next() {
                            Some(schema) => ResponseRuntime::Native(schema),
                            None => ResponseRuntime::Untyped,
                        }
                    }
                    ResponseSchema::Json(value) => ResponseRuntime::Json(value.clone()),
                };
                (status.clone(), runtime)
            })
            .collect();
        RouteSchemas {
            body,
            querystring: native(&self.querystring),
            params: native(&self.params),
            headers: native(&self.headers),
            response,
        }
    }
}

fn native_content(content: &BTreeMap<String, MediaTypeObject>) -> BTreeMap<String, Schema> {
    content
        .iter()
        .filter_map(|(media_type, media)| match &media.schema {
            Some(SlotSchema::Zod(schema)) => Some((media_type.clone(), schema.clone())),
            _ => None,
        })
        .collect()
}

/// How a request body is validated.
#[derive(Debug, Clone)]
pub enum BodyValidation {
    /// One schema regardless of content type
    Single(Schema),
    /// One schema per declared content type
    ByContentType(BTreeMap<String, Schema>),
}

impl BodyValidation {
    /// Schema for a request content type. Parameters such as `charset` are
    /// ignored. Falls back to `application/json`, then to the first entry.
    pub fn for_content_type(&self, content_type: Option<&str>) -> Option<&Schema> {
        match self {
            Self::Single(schema) => Some(schema),
            Self::ByContentType(by_type) => {
                let essence = content_type
                    .and_then(|ct| ct.split(';').next())
                    .map(|ct| ct.trim().to_ascii_lowercase());
                essence
                    .as_deref()
                    .and_then(|ct| by_type.get(ct))
                    .or_else(|| by_type.get("application/json"))
                    .or_else(|| by_type.values().next())
            }
        }
    }
}

/// How a response is serialized.
#[derive(Debug, Clone)]
pub enum ResponseRuntime {
    /// Parse with the schema, then stringify the parsed value
    Native(Schema),
    /// Serialize with the fallback serializer
    Json(Value),
    /// Declared without a schema
    Untyped,
}

/// Runtime schemas of a route.
#[derive(Debug, Clone, Default)]
pub struct RouteSchemas {
    pub body: Option<BodyValidation>,
    pub querystring: Option<Schema>,
    pub params: Option<Schema>,
    pub headers: Option<Schema>,
    pub response: BTreeMap<String, ResponseRuntime>,
}

impl RouteSchemas {
    /// Response entry for a status code: exact match, then `NXX`, then
    /// `default`.
    pub fn response_for(&self, status: u16) -> Option<(&str, &ResponseRuntime)> {
        let exact = status.to_string();
        let range = format!("{}XX", status / 100);
        [exact.as_str(), range.as_str(), "default"]
            .into_iter()
            .find_map(|key| self.response.get_key_value(key))
            .map(|(k, v)| (k.as_str(), v))
    }
}

/// Registration index of a route, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub usize);

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "route#{}", self.0)
    }
}

/// Method, URL and schema of a route, without its handler.
#[derive(Debug, Clone)]
pub struct RouteDefinition {
    pub method: Method,
    pub url: String,
    pub schema: RouteSchema,
}

impl RouteDefinition {
    pub fn new(method: Method, url: impl Into<String>, schema: RouteSchema) -> Self {
        Self {
            method,
            url: url.into(),
            schema,
        }
    }
}
