//! Error types for schema declaration and query compilation

use thiserror::Error;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema and compiler errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Invalid value for schema path `{0}`")]
    InvalidPath(String),

    #[error("`{0}` may not be used as a schema pathname")]
    ReservedName(String),

    #[error("Undefined type `{type_name}` at `{path}`\n  Did you try nesting Schemas? You can only nest using refs or arrays.")]
    UnknownType { path: String, type_name: String },

    #[error("Cannot set nested path `{path}`. Parent path `{parent}` already set to type {type_name}.")]
    PathConflict {
        path: String,
        parent: String,
        type_name: String,
    },

    #[error("`{0}` is already a nested path and cannot be declared as a field")]
    NestedConflict(String),

    #[error("Invalid option `{option}` at `{path}`: {reason}")]
    InvalidOption {
        path: String,
        option: String,
        reason: String,
    },

    #[error("Unknown field `{0}`")]
    UnknownField(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Cast to {expected} failed for value {value} at path `{path}`")]
    Cast {
        path: String,
        expected: &'static str,
        value: serde_json::Value,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    /// Whether this error was raised while building a schema
    pub fn is_declaration_error(&self) -> bool {
        matches!(
            self,
            SchemaError::InvalidPath(_)
                | SchemaError::ReservedName(_)
                | SchemaError::UnknownType { .. }
                | SchemaError::PathConflict { .. }
                | SchemaError::NestedConflict(_)
                | SchemaError::InvalidOption { .. }
        )
    }
}
