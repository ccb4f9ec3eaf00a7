//! Schema constructors, mirroring zod's `z.*` namespace.
//!
//! ```rust
//! use zod_schema::z;
//!
//! let job = z::object([
//!     ("jobId", z::string().describe("Job ID")),
//!     ("attempts", z::number().int().optional()),
//! ]);
//! assert!(job.safe_parse(&serde_json::json!({"jobId": "1"})).is_ok());
//! ```

use crate::schema::{
    ArrayDef, BooleanDef, DiscriminatedUnionDef, NumberDef, Schema, SchemaKind, StringDef,
    object_shape,
};
use serde_json::Value;

pub fn string() -> Schema {
    Schema::from_kind(SchemaKind::String(StringDef::default()))
}

pub fn number() -> Schema {
    Schema::from_kind(SchemaKind::Number(NumberDef::default()))
}

/// Shorthand for `number().int()`.
pub fn integer() -> Schema {
    Schema::from_kind(SchemaKind::Number(NumberDef {
        int: true,
        ..NumberDef::default()
    }))
}

pub fn boolean() -> Schema {
    Schema::from_kind(SchemaKind::Boolean(BooleanDef::default()))
}

pub fn null() -> Schema {
    Schema::from_kind(SchemaKind::Null)
}

pub fn any() -> Schema {
    Schema::from_kind(SchemaKind::Any)
}

pub fn literal(value: impl Into<Value>) -> Schema {
    Schema::from_kind(SchemaKind::Literal(value.into()))
}

/// String enumeration (`z.enum([...])`).
pub fn enumeration<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Schema {
    Schema::from_kind(SchemaKind::Enum(values.into_iter().map(Into::into).collect()))
}

/// Object with properties in declaration order.
pub fn object<K: Into<String>>(properties: impl IntoIterator<Item = (K, Schema)>) -> Schema {
    let properties = properties.into_iter().map(|(k, v)| (k.into(), v)).collect();
    Schema::from_kind(SchemaKind::Object(object_shape(properties)))
}

pub fn array(items: Schema) -> Schema {
    Schema::from_kind(SchemaKind::Array(ArrayDef {
        items,
        checks: Vec::new(),
    }))
}

pub fn tuple(items: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::from_kind(SchemaKind::Tuple(items.into_iter().collect()))
}

/// Object with arbitrary string keys and values matching `values`.
pub fn record(values: Schema) -> Schema {
    Schema::from_kind(SchemaKind::Record(values))
}

pub fn union(options: impl IntoIterator<Item = Schema>) -> Schema {
    Schema::from_kind(SchemaKind::Union(options.into_iter().collect()))
}

/// Union of object schemas selected by the literal value of `discriminator`.
pub fn discriminated_union(
    discriminator: impl Into<String>,
    options: impl IntoIterator<Item = Schema>,
) -> Schema {
    Schema::from_kind(SchemaKind::DiscriminatedUnion(DiscriminatedUnionDef {
        discriminator: discriminator.into(),
        options: options.into_iter().collect(),
    }))
}

/// Coercing primitives (`z.coerce.*`). Input is converted before checks run.
pub mod coerce {
    use super::*;

    pub fn string() -> Schema {
        Schema::from_kind(SchemaKind::String(StringDef {
            coerce: true,
            ..StringDef::default()
        }))
    }

    pub fn number() -> Schema {
        Schema::from_kind(SchemaKind::Number(NumberDef {
            coerce: true,
            ..NumberDef::default()
        }))
    }

    pub fn boolean() -> Schema {
        Schema::from_kind(SchemaKind::Boolean(BooleanDef { coerce: true }))
    }
}
