//! Request dispatch for a ready server

use super::pattern::{RoutePattern, parse_query};
use crate::error::{HttpError, HttpResult};
use crate::handler::{BoxedHandler, Reply, Request};
use crate::route::{Method, RouteId, RouteSchemas};
use crate::serializer::{Serializer, SerializerCompiler};
use crate::validator::{Slot, ValidatorCompiler};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};
use uuid::Uuid;
use zod_schema::Schema;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Renders an error into a reply, replacing the default body.
pub type ErrorHandler = Arc<dyn Fn(&HttpError) -> Reply + Send + Sync>;

pub(crate) struct CompiledRoute {
    pub id: RouteId,
    pub method: Method,
    pub url: String,
    pub pattern: RoutePattern,
    pub schemas: RouteSchemas,
    pub handler: BoxedHandler,
}

/// Request passed to [`ReadyServer::inject`].
#[derive(Debug, Clone)]
pub struct InjectRequest {
    pub method: Method,
    /// Path with an optional query string
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Value>,
}

impl InjectRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    /// Header names are case-insensitive and stored lower-case.
    #[must_use]
    pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// JSON body. Sets `content-type` unless already given.
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.headers
            .entry("content-type".into())
            .or_insert_with(|| "application/json".into());
        self.body = Some(body);
        self
    }
}

/// Reply produced by [`ReadyServer::inject`].
#[derive(Debug, Clone, PartialEq)]
pub struct InjectResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl InjectResponse {
    pub fn json(&self) -> serde_json::Result<Value> {
        serde_json::from_str(&self.body)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// Server with frozen routes, document and compiled adapters.
///
/// Shareable across tasks; serializers are compiled on first use and cached
/// per route and response status key.
pub struct ReadyServer {
    routes: Vec<CompiledRoute>,
    document: Option<(String, Value)>,
    validator: ValidatorCompiler,
    serializer: SerializerCompiler,
    error_handler: Option<ErrorHandler>,
    serializers: DashMap<(RouteId, String), Arc<Serializer>>,
}

impl fmt::Debug for ReadyServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadyServer")
            .field("routes", &self.routes.len())
            .field("documented", &self.document.is_some())
            .field("serializers", &self.serializers.len())
            .finish_non_exhaustive()
    }
}

impl ReadyServer {
    pub(crate) fn new(
        routes: Vec<CompiledRoute>,
        document: Option<(String, Value)>,
        validator: ValidatorCompiler,
        serializer: SerializerCompiler,
        error_handler: Option<ErrorHandler>,
    ) -> Self {
        Self {
            routes,
            document,
            validator,
            serializer,
            error_handler,
            serializers: DashMap::new(),
        }
    }

    /// Assembled OpenAPI document, when documentation is enabled.
    pub fn document(&self) -> Option<&Value> {
        self.document.as_ref().map(|(_, doc)| doc)
    }

    /// Methods and URLs of the registered routes, in registration order.
    pub fn routes(&self) -> Vec<(Method, &str)> {
        self.routes
            .iter()
            .map(|r| (r.method, r.url.as_str()))
            .collect()
    }

    /// Run a request through routing, validation, the handler and response
    /// serialization.
    pub async fn inject(&self, request: InjectRequest) -> InjectResponse {
        let (path, query) = match request.url.split_once('?') {
            Some((path, query)) => (path, query),
            None => (request.url.as_str(), ""),
        };

        if let Some((json_route, document)) = &self.document
            && request.method == Method::Get
            && path == json_route.as_str()
        {
            return json_response(200, document.to_string());
        }

        let Some((route, params)) = self
            .routes
            .iter()
            .filter(|r| r.method == request.method)
            .filter_map(|r| r.pattern.matches(path).map(|params| (r, params)))
            .min_by(|(a, _), (b, _)| a.pattern.specificity().cmp(&b.pattern.specificity()))
        else {
            debug!(method = %request.method, %path, "Route not found");
            return self.error_response(HttpError::route_not_found(request.method.as_str(), path));
        };

        let id = Uuid::now_v7().to_string();
        trace!(request_id = %id, route = %route.id, url = %route.url, "Dispatching request");

        let headers: Map<String, Value> = request
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), Value::String(v.clone())))
            .collect();
        let content_type = request.headers.get("content-type").map(String::as_str);

        let validated = self.validate(
            route,
            Value::Object(params),
            request.body,
            content_type,
            Value::Object(parse_query(query)),
            Value::Object(headers),
        );
        let (params, body, query, headers) = match validated {
            Ok(slots) => slots,
            Err(error) => return self.error_response(error),
        };

        let handler_request = Request {
            id: id.clone(),
            method: request.method,
            url: path.to_string(),
            params,
            query,
            headers,
            body,
        };
        let mut response = match (route.handler)(handler_request).await {
            Ok(reply) => self.serialize(route, reply),
            Err(error) => self.error_response(error),
        };
        response.headers.insert("request-id".into(), id);
        response
    }

    /// Validate params, body, querystring and headers, in that order.
    fn validate(
        &self,
        route: &CompiledRoute,
        params: Value,
        body: Option<Value>,
        content_type: Option<&str>,
        query: Value,
        headers: Value,
    ) -> HttpResult<(Value, Option<Value>, Value, Value)> {
        let schemas = &route.schemas;
        let params = self.validate_slot(schemas.params.as_ref(), Slot::Params, Some(params))?;
        let body_schema = schemas
            .body
            .as_ref()
            .and_then(|b| b.for_content_type(content_type));
        let body = self.validate_slot(body_schema, Slot::Body, body)?;
        let query = self.validate_slot(schemas.querystring.as_ref(), Slot::Querystring, Some(query))?;
        let headers = self.validate_slot(schemas.headers.as_ref(), Slot::Headers, Some(headers))?;
        Ok((
            params.unwrap_or_default(),
            body,
            query.unwrap_or_default(),
            headers.unwrap_or_default(),
        ))
    }

    fn validate_slot(
        &self,
        schema: Option<&Schema>,
        slot: Slot,
        value: Option<Value>,
    ) -> HttpResult<Option<Value>> {
        let Some(schema) = schema else {
            return Ok(value);
        };
        self.validator
            .compile(schema, slot)
            .validate(value.as_ref())
            .map_err(|errors| HttpError::validation(slot, errors))
    }

    fn serializer_for(&self, route: &CompiledRoute, status: u16) -> Option<Arc<Serializer>> {
        let (key, runtime) = route.schemas.response_for(status)?;
        let cache_key = (route.id, key.to_string());
        if let Some(serializer) = self.serializers.get(&cache_key) {
            return Some(Arc::clone(serializer.value()));
        }
        let serializer = Arc::new(self.serializer.compile(
            runtime,
            key,
            route.method.as_str(),
            &route.url,
        ));
        self.serializers.insert(cache_key, Arc::clone(&serializer));
        Some(serializer)
    }

    fn serialize(&self, route: &CompiledRoute, reply: Reply) -> InjectResponse {
        match self.serializer_for(route, reply.status) {
            Some(serializer) => match serializer.serialize(&reply.payload) {
                Ok(body) => json_response(reply.status, body),
                Err(error) => self.error_response(error.into()),
            },
            None => json_response(reply.status, reply.payload.to_string()),
        }
    }

    fn error_response(&self, error: HttpError) -> InjectResponse {
        if error.code.is_server_error() {
            warn!(code = %error.code, message = %error.message, cause = ?error.cause, "Request failed");
        } else {
            debug!(code = %error.code, message = %error.message, "Request rejected");
        }
        if let Some(handler) = &self.error_handler {
            let reply = handler(&error);
            return json_response(reply.status, reply.payload.to_string());
        }
        let error = error.sanitize();
        json_response(error.status_code, error.body().to_string())
    }
}

fn json_response(status_code: u16, body: String) -> InjectResponse {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), JSON_CONTENT_TYPE.to_string());
    InjectResponse {
        status_code,
        headers,
        body,
    }
}
