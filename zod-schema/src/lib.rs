//! # zod-schema
//!
//! Zod-style runtime schemas for JSON values.
//!
//! Schemas are built with the [`z`] constructors, refined with builder methods
//! and used in two ways:
//!
//! - **Parsing**: [`Schema::safe_parse`] validates a [`serde_json::Value`],
//!   applies coercions, defaults and transforms, and returns either the parsed
//!   value or a [`ZodError`] listing every [`ZodIssue`].
//! - **Introspection**: [`Schema::kind`], [`Schema::shape`],
//!   [`Schema::is_optional`] and [`Schema::metadata`] expose enough structure
//!   for other tools (such as an OpenAPI generator) to describe the schema.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use zod_schema::z;
//!
//! let query = z::object([
//!     ("jobId", z::coerce::number().describe("Job ID")),
//!     ("verbose", z::boolean().optional()),
//! ]);
//!
//! let parsed = query.safe_parse(&json!({"jobId": "42"})).unwrap();
//! assert_eq!(parsed, json!({"jobId": 42}));
//!
//! let error = query.safe_parse(&json!({"jobId": "a"})).unwrap_err();
//! assert_eq!(error.issues[0].message, "Expected number, received nan");
//! ```
//!
//! ## Identity
//!
//! | Operation | Identity |
//! |-----------|----------|
//! | `schema.clone()` | same [`SchemaId`] |
//! | any builder (`describe`, `min`, `optional`, ...) | new [`SchemaId`] |
//!
//! Wrappers such as `optional()` keep the wrapped node (and its id) inside.

pub mod checks;
pub mod issue;
pub mod metadata;
mod parse;
pub mod schema;
pub mod z;

#[cfg(test)]
mod tests;

pub use checks::{ArrayCheck, NumberCheck, StringCheck};
pub use issue::{IssueCode, PathSegment, ZodError, ZodIssue};
pub use metadata::{ParamMetadata, SchemaMetadata};
pub use schema::{
    ArrayDef, BooleanDef, Direction, DiscriminatedUnionDef, Effect, EffectsDef, NumberDef,
    ObjectShape, Schema, SchemaId, SchemaKind, StringDef, UnknownKeys,
};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::{Direction, Schema, SchemaKind, SchemaMetadata, ZodError, ZodIssue, z};
}
