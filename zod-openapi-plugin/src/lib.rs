//! # zod-openapi-plugin
//!
//! Uses [`zod_schema`] schemas declared on routes for three things:
//!
//! - **Request validation**: every request slot (`params`, `body`,
//!   `querystring`, `headers`) is parsed with its schema. Failures become a
//!   400 `FST_ERR_VALIDATION` error with one [`RequestValidationError`] per
//!   issue.
//! - **Response serialization**: handler output is parsed with the response
//!   schema of its status and the *parsed* value is sent. Mismatches become a
//!   500 `FST_ERR_RESPONSE_SERIALIZATION` error.
//! - **OpenAPI documentation**: the same schemas are projected into an
//!   OpenAPI 3.0 or 3.1 document. Nodes carrying a component id become
//!   `components/schemas` entries referenced with `$ref`, and unnamed nodes
//!   used in several places are promoted to generated components.
//!
//! ## Example
//!
//! ```rust,ignore
//! use zod_openapi_plugin::prelude::*;
//! use zod_schema::z;
//!
//! let job_id = z::string().describe("Job ID").example("60002023").ref_id("jobId");
//! let schema = RouteSchema::new()
//!     .body(z::object([("jobId", job_id.clone())]))
//!     .response(201, z::object([("jobId", job_id)]));
//!
//! let server = ServerBuilder::new()
//!     .openapi(OpenApiConfig::new("Jobs", "1.0.0"))
//!     .register(ZodOpenApiPlugin::default())
//!     .post("/", schema, |request: Request| async move {
//!         Ok(Reply::ok(request.body.unwrap_or_default()).with_status(201))
//!     })
//!     .ready()?;
//!
//! let response = server.inject(InjectRequest::get("/documentation/json")).await;
//! ```
//!
//! ## Document generation
//!
//! Generation runs in two passes. While routes are registered, the route
//! transform writes each operation into the document skeleton and the
//! [`ComponentRegistry`] records every schema it renders together with the
//! path where the rendering belongs. Once every route is known, [`assemble`]
//! walks those paths, places named components and promotes reused nodes.

pub mod assembler;
pub mod config;
mod convert;
pub mod document;
pub mod error;
pub mod handler;
pub mod plugin;
pub mod recognizer;
pub mod registry;
pub mod route;
pub mod serializer;
pub mod server;
pub mod transform;
pub mod validator;

#[cfg(test)]
mod tests;

pub use assembler::assemble;
pub use config::{
    ComponentsOptions, ConfigValidationError, DocumentOptions, OpenApiConfig, OpenApiInfo,
    OverrideContext, OverrideFn, PluginOptions, Reused, ServerObject, TagObject,
};
pub use document::{DocPath, Segment, SpecFlavor};
pub use error::{
    ComponentKind, ErrorCode, HttpError, HttpResult, ResponseSerializationError, SetupError,
    SetupResult,
};
pub use handler::{Handler, Reply, Request};
pub use plugin::{Plugin, ZodOpenApiPlugin};
pub use recognizer::{Recognized, classify};
pub use registry::{ComponentHandle, ComponentRegistry, ParameterLocation, PendingRegistration};
pub use route::{
    BodySchema, MediaTypeObject, Method, RequestBodyObject, ResponseObject, ResponseSchema,
    RouteDefinition, RouteId, RouteSchema, SlotSchema,
};
pub use serializer::{Serializer, SerializerCompiler, SerializerOptions};
pub use server::{InjectRequest, InjectResponse, ReadyServer, ServerBuilder};
pub use transform::{RegistrationContext, RouteRecord, normalize_url, transform_route};
pub use validator::{RequestValidationError, Slot, Validator, ValidatorCompiler};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        DocumentOptions, HttpError, HttpResult, InjectRequest, InjectResponse, MediaTypeObject,
        Method, OpenApiConfig, PluginOptions, Reply, Request, RequestBodyObject, ResponseObject,
        RouteSchema, ServerBuilder, ZodOpenApiPlugin,
    };
}
