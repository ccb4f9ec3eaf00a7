//! Server builder

use super::core::{CompiledRoute, ErrorHandler, ReadyServer};
use super::pattern::RoutePattern;
use crate::config::OpenApiConfig;
use crate::error::{HttpError, SetupError, SetupResult};
use crate::handler::{BoxedHandler, Handler, Reply, into_boxed};
use crate::plugin::Plugin;
use crate::route::{Method, RouteDefinition, RouteId, RouteSchema};
use crate::serializer::SerializerCompiler;
use crate::transform::normalize_url;
use crate::validator::ValidatorCompiler;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument};

struct RouteEntry {
    definition: RouteDefinition,
    handler: BoxedHandler,
}

/// In-process server under construction.
///
/// Routes and plugins are collected first; [`ServerBuilder::ready`] runs the
/// plugin hooks and freezes everything into a [`ReadyServer`].
///
/// # Example
/// ```rust,ignore
/// let server = ServerBuilder::new()
///     .openapi(OpenApiConfig::new("Jobs", "1.0.0"))
///     .register(ZodOpenApiPlugin::default())
///     .post("/:jobId", schema, create_job)
///     .ready()?;
/// ```
pub struct ServerBuilder {
    plugins: Vec<Box<dyn Plugin>>,
    openapi: Option<OpenApiConfig>,
    validator: ValidatorCompiler,
    serializer: SerializerCompiler,
    error_handler: Option<ErrorHandler>,
    routes: Vec<RouteEntry>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            plugins: Vec::new(),
            openapi: None,
            validator: ValidatorCompiler::new(),
            serializer: SerializerCompiler::default(),
            error_handler: None,
            routes: Vec::new(),
        }
    }

    /// Register a plugin. Hooks run in registration order.
    pub fn register(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Enable the documentation route.
    pub fn openapi(mut self, config: OpenApiConfig) -> Self {
        self.openapi = Some(config);
        self
    }

    pub fn validator_compiler(mut self, compiler: ValidatorCompiler) -> Self {
        self.validator = compiler;
        self
    }

    pub fn serializer_compiler(mut self, compiler: SerializerCompiler) -> Self {
        self.serializer = compiler;
        self
    }

    /// Override how errors are rendered.
    pub fn error_handler<F>(mut self, f: F) -> Self
    where
        F: Fn(&HttpError) -> Reply + Send + Sync + 'static,
    {
        self.error_handler = Some(Arc::new(f));
        self
    }

    /// Add a route
    pub fn route<Output, H>(
        mut self,
        method: Method,
        url: impl Into<String>,
        schema: RouteSchema,
        handler: H,
    ) -> Self
    where
        Output: Into<Reply> + Send + 'static,
        H: Handler<Output>,
    {
        self.routes.push(RouteEntry {
            definition: RouteDefinition::new(method, url, schema),
            handler: into_boxed(handler),
        });
        self
    }

    pub fn get<Output, H>(self, url: impl Into<String>, schema: RouteSchema, handler: H) -> Self
    where
        Output: Into<Reply> + Send + 'static,
        H: Handler<Output>,
    {
        self.route(Method::Get, url, schema, handler)
    }

    pub fn post<Output, H>(self, url: impl Into<String>, schema: RouteSchema, handler: H) -> Self
    where
        Output: Into<Reply> + Send + 'static,
        H: Handler<Output>,
    {
        self.route(Method::Post, url, schema, handler)
    }

    pub fn put<Output, H>(self, url: impl Into<String>, schema: RouteSchema, handler: H) -> Self
    where
        Output: Into<Reply> + Send + 'static,
        H: Handler<Output>,
    {
        self.route(Method::Put, url, schema, handler)
    }

    pub fn delete<Output, H>(self, url: impl Into<String>, schema: RouteSchema, handler: H) -> Self
    where
        Output: Into<Reply> + Send + 'static,
        H: Handler<Output>,
    {
        self.route(Method::Delete, url, schema, handler)
    }

    /// Run plugin hooks, assemble the document and compile the routes.
    #[instrument(skip(self), fields(routes = self.routes.len(), plugins = self.plugins.len()))]
    pub fn ready(mut self) -> SetupResult<ReadyServer> {
        let mut seen = HashSet::new();
        for entry in &self.routes {
            let RouteDefinition { method, url, .. } = &entry.definition;
            if !seen.insert((*method, normalize_url(url)?)) {
                return Err(SetupError::DuplicateRoute {
                    method: method.as_str().to_string(),
                    url: url.clone(),
                });
            }
        }

        let document = match &self.openapi {
            Some(config) => {
                config
                    .validate()
                    .map_err(|e| SetupError::InvalidConfig(e.to_string()))?;
                let documented = self.plugins.iter().any(|p| p.documents_routes());
                let visible = self.routes.iter().any(|r| !r.definition.schema.hide);
                if !documented && visible {
                    return Err(SetupError::PluginNotRegistered);
                }

                let mut skeleton = config.skeleton();
                for (index, entry) in self.routes.iter().enumerate() {
                    for plugin in &mut self.plugins {
                        plugin.on_route(RouteId(index), &entry.definition, &mut skeleton)?;
                    }
                }
                for plugin in &mut self.plugins {
                    plugin.on_ready(&mut skeleton)?;
                    debug!(plugin = plugin.name(), "Plugin ready");
                }
                Some((config.json_route(), skeleton))
            }
            None => None,
        };

        let routes = self
            .routes
            .into_iter()
            .enumerate()
            .map(|(index, entry)| {
                let RouteEntry { definition, handler } = entry;
                Ok(CompiledRoute {
                    id: RouteId(index),
                    pattern: RoutePattern::parse(&definition.url)?,
                    schemas: definition.schema.runtime_schemas(),
                    method: definition.method,
                    url: definition.url,
                    handler,
                })
            })
            .collect::<SetupResult<Vec<_>>>()?;

        debug!(routes = routes.len(), documented = document.is_some(), "Server ready");
        Ok(ReadyServer::new(
            routes,
            document,
            self.validator,
            self.serializer,
            self.error_handler,
        ))
    }
}
