//! Schema recognizer.
//!
//! Tells native schema nodes apart from pre-shaped OpenAPI objects and plain
//! JSON Schema values, and extracts object shapes for parameter slots.

use crate::route::{BodySchema, RequestBodyObject, ResponseObject, ResponseSchema, SlotSchema};
use serde_json::Value;
use zod_schema::{ObjectShape, Schema, SchemaMetadata};

/// What a route slot holds.
#[derive(Debug, Clone, Copy)]
pub enum Recognized<'a> {
    /// A native schema node
    Native(&'a Schema),
    /// A request body object with native media type schemas
    RequestBody(&'a RequestBodyObject),
    /// A response object with native media type schemas
    Response(&'a ResponseObject),
    /// A JSON value already shaped as an OpenAPI request body, response or
    /// media type object
    OpenApiObject(&'a Value),
    /// A plain JSON Schema
    JsonSchema(&'a Value),
    Absent,
}

impl Recognized<'_> {
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native(_))
    }
}

/// Slot types the recognizer understands.
pub trait Classify {
    fn classify(&self) -> Recognized<'_>;
}

fn classify_json(value: &Value) -> Recognized<'_> {
    let shaped = value
        .as_object()
        .is_some_and(|m| m.contains_key("content") || m.contains_key("schema"));
    if shaped {
        Recognized::OpenApiObject(value)
    } else {
        Recognized::JsonSchema(value)
    }
}

impl Classify for SlotSchema {
    fn classify(&self) -> Recognized<'_> {
        match self {
            Self::Zod(schema) => Recognized::Native(schema),
            Self::Json(value) => classify_json(value),
        }
    }
}

impl Classify for BodySchema {
    fn classify(&self) -> Recognized<'_> {
        match self {
            Self::Zod(schema) => Recognized::Native(schema),
            Self::RequestBody(body) => Recognized::RequestBody(body),
            Self::Json(value) => classify_json(value),
        }
    }
}

impl Classify for ResponseSchema {
    fn classify(&self) -> Recognized<'_> {
        match self {
            Self::Zod(schema) => Recognized::Native(schema),
            Self::Response(response) => Recognized::Response(response),
            Self::Json(value) => classify_json(value),
        }
    }
}

/// Classify an optional slot.
pub fn classify<T: Classify>(slot: Option<&T>) -> Recognized<'_> {
    slot.map_or(Recognized::Absent, Classify::classify)
}

/// Object shape of `schema`, seen through wrappers, with the merged metadata
/// of the node (wrapper metadata wins).
pub fn object_shape(schema: &Schema) -> Option<(&ObjectShape, SchemaMetadata)> {
    schema.shape().map(|shape| (shape, schema.metadata()))
}

/// Properties of a plain JSON object schema as `(name, schema, required)`.
pub fn json_object_properties(value: &Value) -> Option<Vec<(String, Value, bool)>> {
    let properties = value.get("properties")?.as_object()?;
    let required: Vec<&str> = value
        .get("required")
        .and_then(Value::as_array)
        .map(|list| list.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    Some(
        properties
            .iter()
            .map(|(name, schema)| (name.clone(), schema.clone(), required.contains(&name.as_str())))
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zod_schema::z;

    #[test]
    fn test_classify_native() {
        let slot = SlotSchema::from(z::string());
        assert!(slot.classify().is_native());
    }

    #[test]
    fn test_classify_json_values() {
        let schema = SlotSchema::from(json!({"type": "object"}));
        assert!(matches!(schema.classify(), Recognized::JsonSchema(_)));
        let response = ResponseSchema::from(json!({"description": "ok", "content": {}}));
        assert!(matches!(response.classify(), Recognized::OpenApiObject(_)));
    }

    #[test]
    fn test_classify_absent() {
        assert!(matches!(classify::<SlotSchema>(None), Recognized::Absent));
    }

    #[test]
    fn test_object_shape_through_wrappers() {
        let schema = z::object([("a", z::string())])
            .describe("inner")
            .optional()
            .describe("outer");
        let (shape, meta) = object_shape(&schema).expect("object");
        assert_eq!(shape.len(), 1);
        assert_eq!(meta.description.as_deref(), Some("outer"));
        assert!(object_shape(&z::string()).is_none());
    }

    #[test]
    fn test_json_object_properties() {
        let value = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}, "b": {"type": "number"}},
            "required": ["b"]
        });
        let props = json_object_properties(&value).unwrap();
        assert_eq!(props.len(), 2);
        assert!(props.iter().any(|(name, _, required)| name == "b" && *required));
        assert!(props.iter().any(|(name, _, required)| name == "a" && !*required));
    }
}
