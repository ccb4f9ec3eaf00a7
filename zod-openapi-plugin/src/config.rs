//! Configuration for the plugin and the generated document.
//!
//! - [`PluginOptions`]: default components and document conversion options,
//!   given when the plugin is registered.
//! - [`OpenApiConfig`]: document-level fields (`openapi`, `info`, `servers`,
//!   `tags`) and the prefix the documentation is served under.
//!
//! # Example
//! ```rust,ignore
//! use zod_openapi_plugin::{DocumentOptions, OpenApiConfig, PluginOptions, Reused};
//!
//! let options = PluginOptions::new()
//!     .with_schema_component("jobId", job_id.clone())
//!     .with_document_opts(DocumentOptions::new().with_reused(Reused::Inline));
//!
//! let config = OpenApiConfig::new("Jobs API", "1.0.0").with_openapi("3.0.3");
//! ```

use crate::document::SpecFlavor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use zod_schema::{Direction, Schema};

/// What to do with an unnamed schema node used at several places.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Reused {
    /// Promote it to an auto-named component and reference it everywhere
    #[default]
    Ref,
    /// Inline a copy at every use
    Inline,
}

/// Context handed to the document override hook for every converted node.
pub struct OverrideContext<'a> {
    /// Fragment produced for the node, may be modified in place
    pub fragment: &'a mut Value,
    /// The node being converted
    pub schema: &'a Schema,
    /// Direction the node is converted for
    pub direction: Direction,
}

/// Hook invoked for every converted schema node.
pub type OverrideFn = Arc<dyn Fn(&mut OverrideContext<'_>) + Send + Sync>;

/// Options controlling how schema nodes are rendered.
#[derive(Clone, Default)]
pub struct DocumentOptions {
    /// Render plain unions with `oneOf` instead of `anyOf` (default: false)
    pub union_one_of: bool,
    /// Treatment of unnamed nodes used more than once (default: Ref)
    pub reused: Reused,
    /// Emit `discriminator` for discriminated unions (default: false)
    pub discriminator: bool,
    /// Per-node override hook (default: none)
    pub override_fn: Option<OverrideFn>,
}

impl fmt::Debug for DocumentOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentOptions")
            .field("union_one_of", &self.union_one_of)
            .field("reused", &self.reused)
            .field("discriminator", &self.discriminator)
            .field("override_fn", &self.override_fn.as_ref().map(|_| ".."))
            .finish()
    }
}

impl DocumentOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "This method returns a new DocumentOptions and does not modify self"]
    pub fn with_union_one_of(mut self, enabled: bool) -> Self {
        self.union_one_of = enabled;
        self
    }

    #[must_use = "This method returns a new DocumentOptions and does not modify self"]
    pub fn with_reused(mut self, reused: Reused) -> Self {
        self.reused = reused;
        self
    }

    #[must_use = "This method returns a new DocumentOptions and does not modify self"]
    pub fn with_discriminator(mut self, enabled: bool) -> Self {
        self.discriminator = enabled;
        self
    }

    /// Install a hook that may rewrite the fragment of every converted node.
    ///
    /// # Example
    /// ```rust,ignore
    /// let opts = DocumentOptions::new().with_override(|ctx| {
    ///     if ctx.schema.kind().name() == "any" {
    ///         ctx.fragment["x-any"] = serde_json::json!(true);
    ///     }
    /// });
    /// ```
    #[must_use = "This method returns a new DocumentOptions and does not modify self"]
    pub fn with_override<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut OverrideContext<'_>) + Send + Sync + 'static,
    {
        self.override_fn = Some(Arc::new(f));
        self
    }
}

/// Caller-supplied components, placed in the document before any route is
/// registered and never overwritten.
#[derive(Debug, Clone, Default)]
pub struct ComponentsOptions {
    /// Named schema nodes. Using one of these nodes anywhere yields a `$ref`.
    pub schemas: BTreeMap<String, Schema>,
    /// Raw JSON schema components
    pub json_schemas: BTreeMap<String, Value>,
    /// Raw parameter objects
    pub parameters: BTreeMap<String, Value>,
    /// Raw response objects
    pub responses: BTreeMap<String, Value>,
    /// Raw request body objects
    pub request_bodies: BTreeMap<String, Value>,
}

impl ComponentsOptions {
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
            && self.json_schemas.is_empty()
            && self.parameters.is_empty()
            && self.responses.is_empty()
            && self.request_bodies.is_empty()
    }
}

/// Options given when the plugin is registered.
#[derive(Debug, Clone, Default)]
pub struct PluginOptions {
    pub components: ComponentsOptions,
    pub document_opts: DocumentOptions,
}

impl PluginOptions {
    /// Create options with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema node as the component `name`.
    #[must_use = "This method returns a new PluginOptions and does not modify self"]
    pub fn with_schema_component(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.components.schemas.insert(name.into(), schema);
        self
    }

    /// Register a raw JSON schema as the component `name`.
    #[must_use = "This method returns a new PluginOptions and does not modify self"]
    pub fn with_json_schema_component(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.components.json_schemas.insert(name.into(), schema);
        self
    }

    #[must_use = "This method returns a new PluginOptions and does not modify self"]
    pub fn with_parameter_component(mut self, name: impl Into<String>, parameter: Value) -> Self {
        self.components.parameters.insert(name.into(), parameter);
        self
    }

    #[must_use = "This method returns a new PluginOptions and does not modify self"]
    pub fn with_response_component(mut self, name: impl Into<String>, response: Value) -> Self {
        self.components.responses.insert(name.into(), response);
        self
    }

    #[must_use = "This method returns a new PluginOptions and does not modify self"]
    pub fn with_request_body_component(mut self, name: impl Into<String>, body: Value) -> Self {
        self.components.request_bodies.insert(name.into(), body);
        self
    }

    #[must_use = "This method returns a new PluginOptions and does not modify self"]
    pub fn with_document_opts(mut self, opts: DocumentOptions) -> Self {
        self.document_opts = opts;
        self
    }
}

/// `info` object of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiInfo {
    /// API title
    pub title: String,
    /// API version
    pub version: String,
    /// API description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for OpenApiInfo {
    fn default() -> Self {
        Self {
            title: "API".to_string(),
            version: "1.0.0".to_string(),
            description: None,
        }
    }
}

/// Entry of the document `servers` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerObject {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Entry of the document `tags` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagObject {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Document-level configuration.
///
/// # Fields
///
/// * `openapi` - OpenAPI version, `3.0.x` or `3.1.x`. Default: `3.1.0`.
/// * `info` - Title, version and description of the API.
/// * `servers`, `tags` - Copied into the document when non-empty.
/// * `components` - Raw components placed into the document skeleton.
/// * `route_prefix` - The document is served at `GET {route_prefix}/json`.
///   Default: `/documentation`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenApiConfig {
    pub openapi: String,
    pub info: OpenApiInfo,
    #[serde(default)]
    pub servers: Vec<ServerObject>,
    #[serde(default)]
    pub tags: Vec<TagObject>,
    #[serde(default)]
    pub components: Option<Value>,
    pub route_prefix: String,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            openapi: "3.1.0".to_string(),
            info: OpenApiInfo::default(),
            servers: Vec::new(),
            tags: Vec::new(),
            components: None,
            route_prefix: "/documentation".to_string(),
        }
    }
}

impl OpenApiConfig {
    /// Create a configuration with the given title and version.
    pub fn new(title: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: OpenApiInfo {
                title: title.into(),
                version: version.into(),
                description: None,
            },
            ..Self::default()
        }
    }

    #[must_use = "This method returns a new OpenApiConfig and does not modify self"]
    pub fn with_openapi(mut self, version: impl Into<String>) -> Self {
        self.openapi = version.into();
        self
    }

    #[must_use = "This method returns a new OpenApiConfig and does not modify self"]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.info.description = Some(description.into());
        self
    }

    #[must_use = "This method returns a new OpenApiConfig and does not modify self"]
    pub fn with_server(mut self, url: impl Into<String>) -> Self {
        self.servers.push(ServerObject {
            url: url.into(),
            description: None,
        });
        self
    }

    #[must_use = "This method returns a new OpenApiConfig and does not modify self"]
    pub fn with_tag(mut self, name: impl Into<String>, description: Option<String>) -> Self {
        self.tags.push(TagObject {
            name: name.into(),
            description,
        });
        self
    }

    #[must_use = "This method returns a new OpenApiConfig and does not modify self"]
    pub fn with_components(mut self, components: Value) -> Self {
        self.components = Some(components);
        self
    }

    #[must_use = "This method returns a new OpenApiConfig and does not modify self"]
    pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    /// Path the document is served at.
    pub fn json_route(&self) -> String {
        format!("{}/json", self.route_prefix.trim_end_matches('/'))
    }

    /// Build the document skeleton: everything except `paths` content and
    /// generated components.
    pub fn skeleton(&self) -> Value {
        let mut doc = serde_json::Map::new();
        doc.insert("openapi".into(), Value::String(self.openapi.clone()));
        doc.insert(
            "info".into(),
            serde_json::to_value(&self.info).unwrap_or_default(),
        );
        if !self.servers.is_empty() {
            doc.insert(
                "servers".into(),
                serde_json::to_value(&self.servers).unwrap_or_default(),
            );
        }
        if !self.tags.is_empty() {
            doc.insert(
                "tags".into(),
                serde_json::to_value(&self.tags).unwrap_or_default(),
            );
        }
        doc.insert("paths".into(), Value::Object(serde_json::Map::new()));
        if let Some(components) = &self.components {
            doc.insert("components".into(), components.clone());
        }
        Value::Object(doc)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if SpecFlavor::from_version(&self.openapi).is_none() {
            return Err(ConfigValidationError::UnsupportedVersion(self.openapi.clone()));
        }
        if self.info.title.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTitle);
        }
        if !self.route_prefix.starts_with('/') {
            return Err(ConfigValidationError::InvalidRoutePrefix(
                self.route_prefix.clone(),
            ));
        }
        if let Some(components) = &self.components
            && !components.is_object()
        {
            return Err(ConfigValidationError::ComponentsNotObject);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// `openapi` is neither 3.0.x nor 3.1.x
    UnsupportedVersion(String),
    /// `info.title` is empty
    EmptyTitle,
    /// `route_prefix` does not start with `/`
    InvalidRoutePrefix(String),
    /// `components` is not a JSON object
    ComponentsNotObject,
}

impl fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion(v) => {
                write!(f, "Unsupported OpenAPI version {v:?}, expected 3.0.x or 3.1.x")
            }
            Self::EmptyTitle => write!(f, "info.title must not be empty"),
            Self::InvalidRoutePrefix(p) => {
                write!(f, "route_prefix must start with '/', got {p:?}")
            }
            Self::ComponentsNotObject => write!(f, "components must be a JSON object"),
        }
    }
}

impl std::error::Error for ConfigValidationError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_config_is_valid() {
        assert!(OpenApiConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_swagger_2() {
        let config = OpenApiConfig::default().with_openapi("2.0");
        assert_eq!(
            config.validate(),
            Err(ConfigValidationError::UnsupportedVersion("2.0".into()))
        );
    }

    #[test]
    fn test_rejects_relative_prefix() {
        let config = OpenApiConfig::default().with_route_prefix("docs");
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidRoutePrefix(_))
        ));
    }

    #[test]
    fn test_json_route() {
        assert_eq!(OpenApiConfig::default().json_route(), "/documentation/json");
        let config = OpenApiConfig::default().with_route_prefix("/docs/");
        assert_eq!(config.json_route(), "/docs/json");
    }

    #[test]
    fn test_skeleton_fields() {
        let config = OpenApiConfig::new("Jobs", "2.0.0")
            .with_openapi("3.0.3")
            .with_server("http://localhost:3000");
        assert_eq!(
            config.skeleton(),
            json!({
                "openapi": "3.0.3",
                "info": {"title": "Jobs", "version": "2.0.0"},
                "servers": [{"url": "http://localhost:3000"}],
                "paths": {}
            })
        );
    }

    #[test]
    fn test_document_options_defaults() {
        let opts = DocumentOptions::default();
        assert_eq!(opts.reused, Reused::Ref);
        assert!(!opts.union_one_of);
        assert!(!opts.discriminator);
        assert!(opts.override_fn.is_none());
    }
}
