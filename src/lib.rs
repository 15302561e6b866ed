//! CQL Schema Compiler
//!
//! Describe a record shape once as a JSON declaration and compile it into
//! parameterized CQL statements and default documents.
//!
//! ## Features
//!
//! - **Typed paths**: Declarations resolve to a closed set of types with
//!   storage casts, defaults and validators
//! - **Nested and positional paths**: `address.city` and `comments.3.body`
//!   resolve through the same path tree
//! - **Statement compilation**: `SELECT`/`INSERT` with `?` placeholders in
//!   parameter order
//! - **Validation aggregation**: Every failing field of a write is reported,
//!   without aborting compilation
//! - **Hydration**: Default documents under inclusion or exclusion projections
//!
//! ## Architecture
//!
//! ```text
//! declaration (JSON)
//!   └── Schema ─┬── PathTree        (arena mirror of the nesting)
//!               └── paths           (dotted path -> TypedPath)
//!                     ├── QueryCompiler ──> CompiledQuery { query, params, errors }
//!                     └── Schema::build ──> default document
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use cql_schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::new(&json!({
//!     "id": "number",
//!     "email": { "type": "string", "required": true, "lowercase": true },
//! }))?;
//!
//! let select = schema.select("users", &json!({ "id": 5 }), &[], 0)?;
//! assert_eq!(select.query, "SELECT id, email FROM users WHERE id = ?");
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod hydrate;
pub mod path;
pub mod schema;
pub mod tree;
pub mod types;
pub mod validation;

pub use compiler::{CompiledQuery, CompilerSettings, QueryCompiler};
pub use config::SchemaConfig;
pub use error::{Result, SchemaError};
pub use hydrate::Projection;
pub use path::{DefaultValue, ElementType, TypedPath};
pub use schema::{PathType, Schema, SchemaOptions};
pub use tree::{PathTree, TreeNode};
pub use types::SchemaType;
pub use validation::{ValidationError, Validator, ValidatorError, ValidatorKind};
