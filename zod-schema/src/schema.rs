//! Schema nodes.
//!
//! A [`Schema`] is a cheap-to-clone handle to an immutable definition. Every
//! builder call returns a *new* node with a fresh [`SchemaId`]; cloning a
//! handle keeps the id. Consumers that need to recognise "the same schema"
//! (component deduplication) compare ids, never structure.

use crate::checks::{ArrayCheck, NumberCheck, StringCheck};
use crate::issue::{PathSegment, ZodError};
use crate::metadata::SchemaMetadata;
use crate::parse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaId(u64);

impl SchemaId {
    fn next() -> Self {
        Self(NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value, useful for logging.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema#{}", self.0)
    }
}

/// Which side of a parse a schema is looked at from.
///
/// `Input` is what a value must look like before parsing, `Output` is what
/// parsing produces. They differ for defaults and transforms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// Policy for keys not declared on an object schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKeys {
    /// Drop unknown keys from the parsed value
    #[default]
    Strip,
    /// Reject unknown keys
    Strict,
    /// Keep unknown keys as they are
    Passthrough,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StringDef {
    pub checks: Vec<StringCheck>,
    pub coerce: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NumberDef {
    pub int: bool,
    pub checks: Vec<NumberCheck>,
    pub coerce: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BooleanDef {
    pub coerce: bool,
}

/// Ordered object properties.
#[derive(Debug, Clone)]
pub struct ObjectShape {
    properties: Vec<(String, Schema)>,
    unknown_keys: UnknownKeys,
}

impl ObjectShape {
    /// Properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Schema)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn get(&self, key: &str) -> Option<&Schema> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn unknown_keys(&self) -> UnknownKeys {
        self.unknown_keys
    }

    /// Names of properties that must be present in the given direction,
    /// in declaration order.
    pub fn required_keys(&self, direction: Direction) -> Vec<&str> {
        self.properties
            .iter()
            .filter(|(_, schema)| !schema.is_optional_in(direction))
            .map(|(k, _)| k.as_str())
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ArrayDef {
    pub items: Schema,
    pub checks: Vec<ArrayCheck>,
}

#[derive(Debug, Clone)]
pub struct DiscriminatedUnionDef {
    pub discriminator: String,
    pub options: Vec<Schema>,
}

pub type RefineFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;
pub type TransformFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Post-parse effect wrapped around an inner schema.
#[derive(Clone)]
pub enum Effect {
    /// Reject parsed values for which `check` returns false
    Refinement { check: RefineFn, message: String },
    /// Map the parsed value
    Transform(TransformFn),
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Refinement { message, .. } => f
                .debug_struct("Refinement")
                .field("message", message)
                .finish_non_exhaustive(),
            Self::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EffectsDef {
    pub inner: Schema,
    pub effect: Effect,
}

/// Discriminant of a schema node.
#[derive(Debug, Clone)]
pub enum SchemaKind {
    String(StringDef),
    Number(NumberDef),
    Boolean(BooleanDef),
    Null,
    Any,
    Literal(Value),
    Enum(Vec<String>),
    Object(ObjectShape),
    Array(ArrayDef),
    Tuple(Vec<Schema>),
    Record(Schema),
    Union(Vec<Schema>),
    DiscriminatedUnion(DiscriminatedUnionDef),
    Optional(Schema),
    Nullable(Schema),
    Default(Schema, Value),
    Effects(EffectsDef),
}

impl SchemaKind {
    /// Short lowercase name of the kind.
    pub fn name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Number(_) => "number",
            Self::Boolean(_) => "boolean",
            Self::Null => "null",
            Self::Any => "any",
            Self::Literal(_) => "literal",
            Self::Enum(_) => "enum",
            Self::Object(_) => "object",
            Self::Array(_) => "array",
            Self::Tuple(_) => "tuple",
            Self::Record(_) => "record",
            Self::Union(_) => "union",
            Self::DiscriminatedUnion(_) => "discriminated_union",
            Self::Optional(_) => "optional",
            Self::Nullable(_) => "nullable",
            Self::Default(..) => "default",
            Self::Effects(_) => "effects",
        }
    }

    /// True for kinds that only wrap another schema.
    pub fn is_wrapper(&self) -> bool {
        matches!(
            self,
            Self::Optional(_) | Self::Nullable(_) | Self::Default(..) | Self::Effects(_)
        )
    }
}

#[derive(Debug, Clone)]
struct SchemaDef {
    id: SchemaId,
    kind: SchemaKind,
    metadata: SchemaMetadata,
}

/// Handle to a schema node.
#[derive(Clone)]
pub struct Schema(Arc<SchemaDef>);

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id", &self.0.id)
            .field("kind", &self.0.kind)
            .field("metadata", &self.0.metadata)
            .finish()
    }
}

impl Schema {
    pub(crate) fn from_kind(kind: SchemaKind) -> Self {
        Self(Arc::new(SchemaDef {
            id: SchemaId::next(),
            kind,
            metadata: SchemaMetadata::default(),
        }))
    }

    fn derive(self, f: impl FnOnce(&mut SchemaDef)) -> Self {
        let mut def = Arc::unwrap_or_clone(self.0);
        def.id = SchemaId::next();
        f(&mut def);
        Self(Arc::new(def))
    }

    fn wrap(self, wrap: impl FnOnce(Schema) -> SchemaKind) -> Self {
        Self::from_kind(wrap(self))
    }

    // ------------------------------------------------------------------
    // Introspection
    // ------------------------------------------------------------------

    /// Identity of this node.
    pub fn id(&self) -> SchemaId {
        self.0.id
    }

    pub fn kind(&self) -> &SchemaKind {
        &self.0.kind
    }

    /// Metadata declared on this node only.
    pub fn own_metadata(&self) -> &SchemaMetadata {
        &self.0.metadata
    }

    /// Component identifier declared on this node.
    pub fn component_id(&self) -> Option<&str> {
        self.0.metadata.id.as_deref()
    }

    /// Effective metadata: wrapper metadata overlays the wrapped node's.
    ///
    /// The returned `id` is this node's own component id.
    pub fn metadata(&self) -> SchemaMetadata {
        let mut merged = match self.inner() {
            Some(inner) => inner.metadata().overlay(&self.0.metadata),
            None => self.0.metadata.clone(),
        };
        merged.id = self.0.metadata.id.clone();
        merged
    }

    /// The wrapped schema, for wrapper kinds.
    pub fn inner(&self) -> Option<&Schema> {
        match &self.0.kind {
            SchemaKind::Optional(inner)
            | SchemaKind::Nullable(inner)
            | SchemaKind::Default(inner, _) => Some(inner),
            SchemaKind::Effects(effects) => Some(&effects.inner),
            _ => None,
        }
    }

    /// Innermost non-wrapper schema.
    pub fn unwrapped(&self) -> &Schema {
        let mut current = self;
        while let Some(inner) = current.inner() {
            current = inner;
        }
        current
    }

    /// Object shape, seen through wrapper nodes.
    pub fn shape(&self) -> Option<&ObjectShape> {
        match self.unwrapped().kind() {
            SchemaKind::Object(shape) => Some(shape),
            _ => None,
        }
    }

    /// Whether a missing value is accepted when parsing.
    pub fn is_optional(&self) -> bool {
        self.is_optional_in(Direction::Input)
    }

    /// Whether the value may be absent in the given direction.
    ///
    /// A defaulted field may be omitted on input but is always present in
    /// the parsed output.
    pub fn is_optional_in(&self, direction: Direction) -> bool {
        match &self.0.kind {
            SchemaKind::Optional(_) | SchemaKind::Any => true,
            SchemaKind::Default(..) => direction == Direction::Input,
            SchemaKind::Nullable(inner) => inner.is_optional_in(direction),
            SchemaKind::Effects(effects) => effects.inner.is_optional_in(direction),
            _ => false,
        }
    }

    /// Whether `null` is an accepted value.
    pub fn is_nullable(&self) -> bool {
        match &self.0.kind {
            SchemaKind::Nullable(_) | SchemaKind::Null | SchemaKind::Any => true,
            SchemaKind::Optional(inner)
            | SchemaKind::Default(inner, _) => inner.is_nullable(),
            SchemaKind::Effects(effects) => effects.inner.is_nullable(),
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Parsing
    // ------------------------------------------------------------------

    /// Parse a value, returning the parsed output or every issue found.
    pub fn safe_parse(&self, value: &Value) -> Result<Value, ZodError> {
        self.safe_parse_maybe(Some(value))
            .map(|parsed| parsed.unwrap_or(Value::Null))
    }

    /// Parse a possibly absent value. `Ok(None)` means the schema accepted the
    /// absence and produced nothing.
    pub fn safe_parse_maybe(&self, value: Option<&Value>) -> Result<Option<Value>, ZodError> {
        let mut path: Vec<PathSegment> = Vec::new();
        let mut issues = Vec::new();
        let parsed = parse::parse_node(self, value, &mut path, &mut issues);
        if issues.is_empty() {
            Ok(parsed)
        } else {
            Err(ZodError::new(issues))
        }
    }

    // ------------------------------------------------------------------
    // Metadata builders
    // ------------------------------------------------------------------

    pub fn describe(self, description: impl Into<String>) -> Self {
        let description = description.into();
        self.derive(|def| def.metadata.description = Some(description))
    }

    pub fn example(self, example: impl Into<Value>) -> Self {
        let example = example.into();
        self.derive(|def| def.metadata.example = Some(example))
    }

    pub fn examples(self, examples: impl IntoIterator<Item = Value>) -> Self {
        let examples: Vec<Value> = examples.into_iter().collect();
        self.derive(|def| def.metadata.examples = examples)
    }

    pub fn deprecated(self) -> Self {
        self.derive(|def| def.metadata.deprecated = true)
    }

    /// Register this node as the shared component `id`.
    pub fn ref_id(self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.derive(|def| def.metadata.id = Some(id))
    }

    /// Register this node, used as a parameter, as the parameter component `id`.
    pub fn param_ref(self, id: impl Into<String>) -> Self {
        let id = id.into();
        self.derive(|def| def.metadata = std::mem::take(&mut def.metadata).param_id(id))
    }

    /// Apply OpenAPI metadata. Fields set on `meta` replace the node's own.
    pub fn openapi(self, meta: SchemaMetadata) -> Self {
        self.derive(|def| {
            let id = meta.id.clone().or_else(|| def.metadata.id.take());
            let mut merged = def.metadata.overlay(&meta);
            merged.id = id;
            def.metadata = merged;
        })
    }

    // ------------------------------------------------------------------
    // Wrappers
    // ------------------------------------------------------------------

    pub fn optional(self) -> Self {
        self.wrap(SchemaKind::Optional)
    }

    pub fn nullable(self) -> Self {
        self.wrap(SchemaKind::Nullable)
    }

    pub fn nullish(self) -> Self {
        self.nullable().optional()
    }

    pub fn default_value(self, value: impl Into<Value>) -> Self {
        let value = value.into();
        self.wrap(|inner| SchemaKind::Default(inner, value))
    }

    /// Reject parsed values for which `check` returns false.
    pub fn refine<F>(self, check: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        let effect = Effect::Refinement {
            check: Arc::new(check),
            message: message.into(),
        };
        self.wrap(|inner| SchemaKind::Effects(EffectsDef { inner, effect }))
    }

    /// Map the parsed value.
    pub fn transform<F>(self, f: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        let effect = Effect::Transform(Arc::new(f));
        self.wrap(|inner| SchemaKind::Effects(EffectsDef { inner, effect }))
    }

    pub fn array(self) -> Self {
        crate::z::array(self)
    }

    // ------------------------------------------------------------------
    // Constraints
    // ------------------------------------------------------------------

    /// Minimum string length, number value or array length.
    pub fn min(self, n: impl Into<f64>) -> Self {
        let n = n.into();
        self.constrain("min", |kind| match kind {
            SchemaKind::String(def) => {
                def.checks.push(StringCheck::Min(n as usize));
                Some(())
            }
            SchemaKind::Number(def) => {
                def.checks.push(NumberCheck::Gte(n));
                Some(())
            }
            SchemaKind::Array(def) => {
                def.checks.push(ArrayCheck::Min(n as usize));
                Some(())
            }
            _ => None,
        })
    }

    /// Maximum string length, number value or array length.
    pub fn max(self, n: impl Into<f64>) -> Self {
        let n = n.into();
        self.constrain("max", |kind| match kind {
            SchemaKind::String(def) => {
                def.checks.push(StringCheck::Max(n as usize));
                Some(())
            }
            SchemaKind::Number(def) => {
                def.checks.push(NumberCheck::Lte(n));
                Some(())
            }
            SchemaKind::Array(def) => {
                def.checks.push(ArrayCheck::Max(n as usize));
                Some(())
            }
            _ => None,
        })
    }

    /// Exact string or array length.
    pub fn length(self, n: usize) -> Self {
        self.constrain("length", |kind| match kind {
            SchemaKind::String(def) => {
                def.checks.push(StringCheck::Length(n));
                Some(())
            }
            SchemaKind::Array(def) => {
                def.checks.push(ArrayCheck::Length(n));
                Some(())
            }
            _ => None,
        })
    }

    pub fn email(self) -> Self {
        self.string_check("email", StringCheck::Email)
    }

    pub fn uuid(self) -> Self {
        self.string_check("uuid", StringCheck::Uuid)
    }

    pub fn url(self) -> Self {
        self.string_check("url", StringCheck::Url)
    }

    pub fn datetime(self) -> Self {
        self.string_check("datetime", StringCheck::Datetime)
    }

    pub fn regex(self, pattern: impl Into<String>) -> Self {
        self.string_check("regex", StringCheck::Regex(pattern.into()))
    }

    pub fn int(self) -> Self {
        self.constrain("int", |kind| match kind {
            SchemaKind::Number(def) => {
                def.int = true;
                Some(())
            }
            _ => None,
        })
    }

    pub fn gt(self, n: f64) -> Self {
        self.number_check("gt", NumberCheck::Gt(n))
    }

    pub fn gte(self, n: f64) -> Self {
        self.number_check("gte", NumberCheck::Gte(n))
    }

    pub fn lt(self, n: f64) -> Self {
        self.number_check("lt", NumberCheck::Lt(n))
    }

    pub fn lte(self, n: f64) -> Self {
        self.number_check("lte", NumberCheck::Lte(n))
    }

    pub fn positive(self) -> Self {
        self.gt(0.0)
    }

    pub fn nonnegative(self) -> Self {
        self.gte(0.0)
    }

    pub fn multiple_of(self, n: f64) -> Self {
        self.number_check("multiple_of", NumberCheck::MultipleOf(n))
    }

    /// Reject keys not declared on the object.
    pub fn strict(self) -> Self {
        self.unknown_keys("strict", UnknownKeys::Strict)
    }

    /// Keep keys not declared on the object.
    pub fn passthrough(self) -> Self {
        self.unknown_keys("passthrough", UnknownKeys::Passthrough)
    }

    /// Drop keys not declared on the object (the default).
    pub fn strip(self) -> Self {
        self.unknown_keys("strip", UnknownKeys::Strip)
    }

    /// Add or replace properties of an object schema.
    pub fn extend<K: Into<String>>(self, properties: impl IntoIterator<Item = (K, Schema)>) -> Self {
        let properties: Vec<(String, Schema)> =
            properties.into_iter().map(|(k, v)| (k.into(), v)).collect();
        self.constrain("extend", |kind| match kind {
            SchemaKind::Object(shape) => {
                for (key, schema) in properties {
                    match shape.properties.iter_mut().find(|(k, _)| *k == key) {
                        Some(slot) => slot.1 = schema,
                        None => shape.properties.push((key, schema)),
                    }
                }
                Some(())
            }
            _ => None,
        })
    }

    fn unknown_keys(self, method: &'static str, policy: UnknownKeys) -> Self {
        self.constrain(method, |kind| match kind {
            SchemaKind::Object(shape) => {
                shape.unknown_keys = policy;
                Some(())
            }
            _ => None,
        })
    }

    fn string_check(self, method: &'static str, check: StringCheck) -> Self {
        self.constrain(method, |kind| match kind {
            SchemaKind::String(def) => {
                def.checks.push(check);
                Some(())
            }
            _ => None,
        })
    }

    fn number_check(self, method: &'static str, check: NumberCheck) -> Self {
        self.constrain(method, |kind| match kind {
            SchemaKind::Number(def) => {
                def.checks.push(check);
                Some(())
            }
            _ => None,
        })
    }

    /// Apply a kind-specific mutation to a copy of this node. Kinds the
    /// mutation does not support leave the node unchanged.
    fn constrain(self, method: &'static str, f: impl FnOnce(&mut SchemaKind) -> Option<()>) -> Self {
        let mut kind = self.0.kind.clone();
        match f(&mut kind) {
            Some(()) => self.derive(|def| def.kind = kind),
            None => {
                warn!(
                    method = method,
                    kind = self.0.kind.name(),
                    "Constraint not supported by schema kind, ignoring"
                );
                self
            }
        }
    }
}

pub(crate) fn object_shape(properties: Vec<(String, Schema)>) -> ObjectShape {
    ObjectShape {
        properties,
        unknown_keys: UnknownKeys::Strip,
    }
}

#[cfg(test)]
mod tests {
    use crate::z;

    #[test]
    fn test_builders_create_new_identity() {
        let base = z::string();
        let described = base.clone().describe("x");
        assert_ne!(base.id(), described.id());
        assert_eq!(base.id(), base.clone().id());
    }

    #[test]
    fn test_wrapper_keeps_inner_identity() {
        let inner = z::string();
        let optional = inner.clone().optional();
        assert_eq!(optional.inner().map(|s| s.id()), Some(inner.id()));
    }

    #[test]
    fn test_metadata_last_applied_wins() {
        let schema = z::string().describe("inner").optional().describe("outer");
        assert_eq!(schema.metadata().description.as_deref(), Some("outer"));
    }

    #[test]
    fn test_component_id_not_inherited() {
        let schema = z::string().ref_id("jobId").optional();
        assert!(schema.component_id().is_none());
        assert_eq!(schema.unwrapped().component_id(), Some("jobId"));
    }

    #[test]
    fn test_default_optional_per_direction() {
        use super::Direction;
        let schema = z::string().default_value("foo");
        assert!(schema.is_optional_in(Direction::Input));
        assert!(!schema.is_optional_in(Direction::Output));
    }

    #[test]
    fn test_unsupported_constraint_is_ignored() {
        let schema = z::boolean();
        let id = schema.id();
        let constrained = schema.email();
        assert_eq!(constrained.id(), id);
    }

    #[test]
    fn test_shape_sees_through_wrappers() {
        let schema = z::object([("a", z::string())])
            .refine(|_| true, "never")
            .optional();
        let shape = schema.shape().expect("object shape");
        assert_eq!(shape.len(), 1);
    }

    #[test]
    fn test_extend_replaces_and_appends() {
        let schema = z::object([("a", z::string()), ("b", z::string())])
            .extend([("b", z::number()), ("c", z::boolean())]);
        let keys: Vec<_> = schema.shape().unwrap().properties().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
        assert_eq!(schema.shape().unwrap().get("b").unwrap().kind().name(), "number");
    }
}
