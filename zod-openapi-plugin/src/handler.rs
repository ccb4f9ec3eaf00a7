//! Route handler traits and utilities

use crate::error::HttpResult;
use crate::route::Method;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::trace;

/// Request as seen by a handler, after validation.
///
/// Validated slots hold the parsed values (coerced, defaulted, stripped).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub id: String,
    pub method: Method,
    /// Request path without the query string
    pub url: String,
    pub params: Value,
    pub query: Value,
    pub headers: Value,
    pub body: Option<Value>,
}

impl Request {
    /// Path parameter as a string, if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(Value::as_str)
    }
}

/// Status and payload returned by a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reply {
    pub status: u16,
    pub payload: Value,
}

impl Reply {
    pub fn ok(payload: impl Into<Value>) -> Self {
        Self {
            status: 200,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

impl From<Value> for Reply {
    fn from(payload: Value) -> Self {
        Self::ok(payload)
    }
}

/// Boxed handler for type erasure
pub(crate) type BoxedHandler =
    Arc<dyn Fn(Request) -> BoxFuture<'static, HttpResult<Reply>> + Send + Sync>;

/// Trait for route handlers
///
/// Automatically implemented for async functions with the signature:
/// `async fn(Request) -> HttpResult<Output>` where `Output: Into<Reply>`
pub trait Handler<Output>: Clone + Send + Sync + 'static
where
    Output: Into<Reply> + Send + 'static,
{
    type Future: Future<Output = HttpResult<Output>> + Send;

    fn call(&self, request: Request) -> Self::Future;
}

impl<Output, F, Fut> Handler<Output> for F
where
    Output: Into<Reply> + Send + 'static,
    F: Fn(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = HttpResult<Output>> + Send + 'static,
{
    type Future = Fut;

    fn call(&self, request: Request) -> Self::Future {
        (self)(request)
    }
}

/// Convert a handler into a boxed handler for storage
pub(crate) fn into_boxed<Output, H>(handler: H) -> BoxedHandler
where
    Output: Into<Reply> + Send + 'static,
    H: Handler<Output>,
{
    Arc::new(move |request| {
        let handler = handler.clone();
        Box::pin(async move {
            trace!(request_id = %request.id, url = %request.url, "Calling handler");
            let output = handler.call(request).await?;
            Ok(output.into())
        })
    })
}
