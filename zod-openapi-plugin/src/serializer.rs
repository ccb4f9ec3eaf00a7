//! Response serialization adapter.
//!
//! A [`Serializer`] parses the handler's value with the response schema and
//! stringifies the parsed value. Values that do not match fail with a
//! [`ResponseSerializationError`].

use crate::config::DocumentOptions;
use crate::convert::{ConvertOptions, standalone_schema};
use crate::document::SpecFlavor;
use crate::error::ResponseSerializationError;
use crate::route::ResponseRuntime;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use zod_schema::{Direction, Schema, SchemaId};

/// Turns a parsed value into the response payload.
pub type StringifyFn = Arc<dyn Fn(&Value) -> String + Send + Sync>;

/// Serializes values of response slots declared with a plain JSON Schema.
/// Receives the JSON Schema and the value.
pub type FallbackFn = Arc<dyn Fn(&Value, &Value) -> String + Send + Sync>;

/// Serializer compiler options.
#[derive(Clone, Default)]
pub struct SerializerOptions {
    pub stringify: Option<StringifyFn>,
    /// Extra named nodes, emitted under `definitions`
    pub components: BTreeMap<String, Schema>,
    pub fallback: Option<FallbackFn>,
}

impl fmt::Debug for SerializerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerOptions")
            .field("stringify", &self.stringify.is_some())
            .field("components", &self.components.keys().collect::<Vec<_>>())
            .field("fallback", &self.fallback.is_some())
            .finish()
    }
}

impl SerializerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_stringify<F>(mut self, stringify: F) -> Self
    where
        F: Fn(&Value) -> String + Send + Sync + 'static,
    {
        self.stringify = Some(Arc::new(stringify));
        self
    }

    #[must_use]
    pub fn with_component(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.components.insert(name.into(), schema);
        self
    }

    #[must_use]
    pub fn with_fallback<F>(mut self, fallback: F) -> Self
    where
        F: Fn(&Value, &Value) -> String + Send + Sync + 'static,
    {
        self.fallback = Some(Arc::new(fallback));
        self
    }
}

/// Builds response serializers.
#[derive(Clone)]
pub struct SerializerCompiler {
    options: SerializerOptions,
    convert: ConvertOptions,
    names: HashMap<SchemaId, String>,
}

impl fmt::Debug for SerializerCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerializerCompiler")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Default for SerializerCompiler {
    fn default() -> Self {
        Self::new(SerializerOptions::default())
    }
}

impl SerializerCompiler {
    pub fn new(options: SerializerOptions) -> Self {
        let names = options
            .components
            .iter()
            .map(|(name, schema)| (schema.id(), name.clone()))
            .collect();
        Self {
            convert: ConvertOptions::new(SpecFlavor::OpenApi31, &DocumentOptions::default()),
            options,
            names,
        }
    }

    pub fn options(&self) -> &SerializerOptions {
        &self.options
    }

    /// Compile the serializer for one response slot of a route.
    pub fn compile(
        &self,
        runtime: &ResponseRuntime,
        status: &str,
        method: &str,
        url: &str,
    ) -> Serializer {
        let kind = match runtime {
            ResponseRuntime::Native(schema) => SerializerKind::Native {
                schema: schema.clone(),
                json_schema: self.json_schema(schema),
            },
            ResponseRuntime::Json(json_schema) => SerializerKind::Fallback {
                json_schema: json_schema.clone(),
            },
            ResponseRuntime::Untyped => SerializerKind::Plain,
        };
        debug!(%method, %url, %status, "Compiled response serializer");
        Serializer {
            kind,
            stringify: self.options.stringify.clone(),
            fallback: self.options.fallback.clone(),
            status: status.to_string(),
            method: method.to_string(),
            url: url.to_string(),
        }
    }

    /// Standalone JSON Schema of the output shape, with every named node and
    /// every extra component under `definitions`.
    pub fn json_schema(&self, schema: &Schema) -> Value {
        let (mut root, definitions) = standalone_schema(
            schema,
            self.options.components.values(),
            Direction::Output,
            &self.convert,
            &self.names,
        );
        if !definitions.is_empty()
            && let Value::Object(map) = &mut root
        {
            let definitions: Map<String, Value> = definitions.into_iter().collect();
            map.insert("definitions".into(), Value::Object(definitions));
        }
        root
    }
}

#[derive(Debug, Clone)]
enum SerializerKind {
    Native { schema: Schema, json_schema: Value },
    Fallback { json_schema: Value },
    Plain,
}

/// Compiled serializer for one response slot.
#[derive(Clone)]
pub struct Serializer {
    kind: SerializerKind,
    stringify: Option<StringifyFn>,
    fallback: Option<FallbackFn>,
    status: String,
    method: String,
    url: String,
}

impl fmt::Debug for Serializer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Serializer")
            .field("kind", &self.kind)
            .field("status", &self.status)
            .field("method", &self.method)
            .field("url", &self.url)
            .finish_non_exhaustive()
    }
}

impl Serializer {
    pub fn status(&self) -> &str {
        &self.status
    }

    /// JSON Schema the serializer checks against, if it has one.
    pub fn json_schema(&self) -> Option<&Value> {
        match &self.kind {
            SerializerKind::Native { json_schema, .. } | SerializerKind::Fallback { json_schema } => {
                Some(json_schema)
            }
            SerializerKind::Plain => None,
        }
    }

    pub fn serialize(&self, value: &Value) -> Result<String, ResponseSerializationError> {
        match &self.kind {
            SerializerKind::Native { schema, .. } => match schema.safe_parse(value) {
                Ok(parsed) => Ok(self.stringify(&parsed)),
                Err(cause) => {
                    warn!(
                        method = %self.method,
                        url = %self.url,
                        status = %self.status,
                        issues = cause.issues.len(),
                        "Response does not match the schema"
                    );
                    Err(ResponseSerializationError::new(&self.method, &self.url, cause))
                }
            },
            SerializerKind::Fallback { json_schema } => Ok(match &self.fallback {
                Some(fallback) => fallback(json_schema, value),
                None => self.stringify(value),
            }),
            SerializerKind::Plain => Ok(self.stringify(value)),
        }
    }

    fn stringify(&self, value: &Value) -> String {
        match &self.stringify {
            Some(stringify) => stringify(value),
            None => value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zod_schema::z;

    fn native(schema: Schema) -> ResponseRuntime {
        ResponseRuntime::Native(schema)
    }

    #[test]
    fn test_serializes_parsed_value() {
        let schema = z::object([("jobId", z::string())]);
        let serializer = SerializerCompiler::default().compile(&native(schema), "200", "POST", "/:jobId");
        let out = serializer
            .serialize(&json!({"jobId": "60002023", "extra": true}))
            .unwrap();
        assert_eq!(out, r#"{"jobId":"60002023"}"#);
    }

    #[test]
    fn test_mismatch_fails() {
        let schema = z::object([("jobId", z::string())]);
        let serializer = SerializerCompiler::default().compile(&native(schema), "201", "POST", "/:jobId");
        let err = serializer.serialize(&json!({"jobId": 1})).unwrap_err();
        assert_eq!(err.to_string(), "Response does not match the schema");
        assert_eq!(err.method, "POST");
        assert_eq!(err.url, "/:jobId");
        assert_eq!(err.cause.issues[0].message, "Expected string, received number");
    }

    #[test]
    fn test_custom_stringify() {
        let compiler = SerializerCompiler::new(
            SerializerOptions::new().with_stringify(|value| format!("custom:{value}")),
        );
        let serializer = compiler.compile(&native(z::number()), "200", "GET", "/");
        assert_eq!(serializer.serialize(&json!(3)).unwrap(), "custom:3");
    }

    #[test]
    fn test_fallback_for_json_schema_slot() {
        let compiler = SerializerCompiler::new(
            SerializerOptions::new().with_fallback(|schema, value| format!("{}|{}", schema["type"], value)),
        );
        let runtime = ResponseRuntime::Json(json!({"type": "object"}));
        let serializer = compiler.compile(&runtime, "200", "GET", "/");
        assert_eq!(serializer.serialize(&json!({"a": 1})).unwrap(), r#""object"|{"a":1}"#);

        let plain = SerializerCompiler::default().compile(&runtime, "200", "GET", "/");
        assert_eq!(plain.serialize(&json!({"a": 1})).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_untyped_has_no_schema() {
        let serializer = SerializerCompiler::default().compile(&ResponseRuntime::Untyped, "200", "GET", "/");
        assert!(serializer.json_schema().is_none());
        assert_eq!(serializer.serialize(&json!("x")).unwrap(), r#""x""#);
    }

    #[test]
    fn test_components_become_definitions() {
        let job = z::object([("jobId", z::string())]);
        let compiler = SerializerCompiler::new(
            SerializerOptions::new()
                .with_component("Job", job.clone())
                .with_component("Flag", z::boolean()),
        );
        let schema = z::object([("job", job)]);
        let json_schema = compiler.json_schema(&schema);
        assert_eq!(
            json_schema["properties"]["job"],
            json!({"$ref": "#/definitions/Job"})
        );
        assert_eq!(json_schema["definitions"]["Flag"], json!({"type": "boolean"}));
        assert_eq!(
            json_schema["definitions"]["Job"]["properties"]["jobId"],
            json!({"type": "string"})
        );
    }

    #[test]
    fn test_self_named_node_is_a_definition_ref() {
        let schema = z::string().ref_id("JobId");
        let json_schema = SerializerCompiler::default().json_schema(&schema);
        assert_eq!(json_schema["$ref"], json!("#/definitions/JobId"));
        assert_eq!(json_schema["definitions"]["JobId"], json!({"type": "string"}));
    }
}
