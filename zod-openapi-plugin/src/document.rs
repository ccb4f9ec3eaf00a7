//! Document paths and version flavor.
//!
//! A [`DocPath`] addresses one slot of the document under construction, such as
//! `paths./jobs/{id}.post.requestBody.content.application/json.schema`.
//! Keys are kept verbatim. Only the JSON pointer rendering escapes them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// OpenAPI flavor a document is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecFlavor {
    /// OpenAPI 3.0.x
    OpenApi30,
    /// OpenAPI 3.1.x
    OpenApi31,
}

impl SpecFlavor {
    /// Flavor for an `openapi` version string, `None` if unsupported.
    pub fn from_version(version: &str) -> Option<Self> {
        if version.starts_with("3.0.") || version == "3.0" {
            Some(Self::OpenApi30)
        } else if version.starts_with("3.1.") || version == "3.1" {
            Some(Self::OpenApi31)
        } else {
            None
        }
    }

    /// Flavor declared by a document's `openapi` field.
    pub fn of_document(doc: &Value) -> Option<Self> {
        doc.get("openapi")
            .and_then(Value::as_str)
            .and_then(Self::from_version)
    }
}

/// One step of a [`DocPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Segment {
    Key(String),
    Index(usize),
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// Location of a slot inside the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocPath(Vec<Segment>);

impl DocPath {
    /// The document root.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn new<S: Into<Segment>>(segments: impl IntoIterator<Item = S>) -> Self {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Path to `components.<kind>.<name>`.
    pub fn component(kind: &str, name: &str) -> Self {
        Self::new(["components", kind, name])
    }

    /// Extend with an object key.
    #[must_use]
    pub fn key(&self, key: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Key(key.into()));
        Self(segments)
    }

    /// Extend with an array index.
    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(Segment::Index(index));
        Self(segments)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &DocPath) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Replace the prefix `from` with `to`. Paths outside `from` are returned
    /// unchanged.
    #[must_use]
    pub fn rebase(&self, from: &DocPath, to: &DocPath) -> Self {
        if !self.starts_with(from) {
            return self.clone();
        }
        let mut segments = to.0.clone();
        segments.extend_from_slice(&self.0[from.0.len()..]);
        Self(segments)
    }

    /// RFC 6901 pointer, e.g. `/paths/~1jobs/post`.
    pub fn to_pointer(&self) -> String {
        self.0
            .iter()
            .map(|segment| match segment {
                Segment::Key(k) => format!("/{}", k.replace('~', "~0").replace('/', "~1")),
                Segment::Index(i) => format!("/{i}"),
            })
            .collect()
    }

    /// Resolve this path in `doc`.
    pub fn resolve<'a>(&self, doc: &'a Value) -> Option<&'a Value> {
        self.0.iter().try_fold(doc, |current, segment| match segment {
            Segment::Key(k) => current.as_object()?.get(k),
            Segment::Index(i) => current.as_array()?.get(*i),
        })
    }

    /// Resolve this path in `doc` for modification.
    pub fn resolve_mut<'a>(&self, doc: &'a mut Value) -> Option<&'a mut Value> {
        self.0.iter().try_fold(doc, |current, segment| match segment {
            Segment::Key(k) => current.as_object_mut()?.get_mut(k),
            Segment::Index(i) => current.as_array_mut()?.get_mut(*i),
        })
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("#");
        }
        write!(f, "#{}", self.to_pointer())
    }
}

/// `{"$ref": "<prefix><name>"}`.
pub fn reference(prefix: &str, name: &str) -> Value {
    let mut map = Map::new();
    map.insert("$ref".into(), Value::String(format!("{prefix}{name}")));
    Value::Object(map)
}

/// True if `value` is an object carrying `$ref`.
pub fn is_ref(value: &Value) -> bool {
    value.as_object().is_some_and(|m| m.contains_key("$ref"))
}

/// Component name a `$ref` points at, if it points into `prefix`.
pub fn ref_target<'a>(value: &'a Value, prefix: &str) -> Option<&'a str> {
    value.get("$ref")?.as_str()?.strip_prefix(prefix)
}

/// Shallow merge `fragment` into `slot`: keys of `fragment` win.
pub fn merge_into(slot: &mut Value, fragment: &Value) {
    match (slot.as_object_mut(), fragment.as_object()) {
        (Some(target), Some(source)) => {
            for (k, v) in source {
                target.insert(k.clone(), v.clone());
            }
        }
        _ => *slot = fragment.clone(),
    }
}
