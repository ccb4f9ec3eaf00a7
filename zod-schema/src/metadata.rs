//! Schema metadata.
//!
//! Metadata never affects parsing. It carries documentation (description,
//! examples, deprecation) and the identifiers used when a schema is promoted to
//! a shared OpenAPI component.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Documentation and component metadata attached to a schema node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    /// Human-readable description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Single example value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,

    /// Example values
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<Value>,

    /// Whether the schema is deprecated
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,

    /// Component identifier. A schema carrying an id is emitted once under
    /// `components.schemas.<id>` and referenced everywhere else.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Parameter-level overrides, used when the schema is a query, path or
    /// header property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param: Option<ParamMetadata>,
}

/// Metadata only meaningful for request parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamMetadata {
    /// Component identifier for `components.parameters.<id>`
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Parameter name override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl SchemaMetadata {
    /// Create metadata with a description.
    pub fn with_description(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            ..Default::default()
        }
    }

    /// Set the description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the example.
    pub fn example(mut self, example: impl Into<Value>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Add an example to the examples list.
    pub fn push_example(mut self, example: impl Into<Value>) -> Self {
        self.examples.push(example.into());
        self
    }

    /// Mark as deprecated.
    pub fn deprecated(mut self) -> Self {
        self.deprecated = true;
        self
    }

    /// Set the component identifier.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the parameter component identifier.
    pub fn param_id(mut self, id: impl Into<String>) -> Self {
        self.param.get_or_insert_with(ParamMetadata::default).id = Some(id.into());
        self
    }

    /// True when no documentation field is set. The id is not documentation.
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.example.is_none()
            && self.examples.is_empty()
            && !self.deprecated
    }

    /// Overlay `outer` on top of `self`: fields set on `outer` win.
    ///
    /// Identifiers are not inherited, they belong to the node that declared
    /// them.
    pub fn overlay(&self, outer: &SchemaMetadata) -> SchemaMetadata {
        SchemaMetadata {
            description: outer
                .description
                .clone()
                .or_else(|| self.description.clone()),
            example: outer.example.clone().or_else(|| self.example.clone()),
            examples: if outer.examples.is_empty() {
                self.examples.clone()
            } else {
                outer.examples.clone()
            },
            deprecated: outer.deprecated || self.deprecated,
            id: None,
            param: outer.param.clone().or_else(|| self.param.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_overlay_outer_wins() {
        let inner = SchemaMetadata::with_description("inner").example("a");
        let outer = SchemaMetadata::with_description("outer");
        let merged = inner.overlay(&outer);
        assert_eq!(merged.description.as_deref(), Some("outer"));
        assert_eq!(merged.example, Some(json!("a")));
    }

    #[test]
    fn test_overlay_drops_id() {
        let inner = SchemaMetadata::default().id("jobId");
        let merged = inner.overlay(&SchemaMetadata::default());
        assert!(merged.id.is_none());
    }

    #[test]
    fn test_serializes_id_as_ref() {
        let meta = SchemaMetadata::with_description("Job ID").id("jobId");
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value, json!({"description": "Job ID", "ref": "jobId"}));
    }

    #[test]
    fn test_is_empty_ignores_id() {
        assert!(SchemaMetadata::default().id("x").is_empty());
        assert!(!SchemaMetadata::default().deprecated().is_empty());
    }
}
