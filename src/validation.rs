//! Field validators and the per-write validation aggregate

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Validator callback: receives the field value and the whole record.
///
/// `Ok(false)` marks the value invalid; `Err` carries a failure message that
/// replaces the validator's own.
pub type ValidatorFn =
    Arc<dyn Fn(&Value, &Value) -> std::result::Result<bool, String> + Send + Sync>;

/// Which check produced a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidatorKind {
    Required,
    Enum,
    Regexp,
    Min,
    Max,
    Cast,
    #[serde(rename = "user defined")]
    UserDefined,
}

impl fmt::Display for ValidatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ValidatorKind::Required => "required",
            ValidatorKind::Enum => "enum",
            ValidatorKind::Regexp => "regexp",
            ValidatorKind::Min => "min",
            ValidatorKind::Max => "max",
            ValidatorKind::Cast => "cast",
            ValidatorKind::UserDefined => "user defined",
        };
        write!(f, "{}", s)
    }
}

/// A single check attached to a typed path
#[derive(Clone)]
pub struct Validator {
    kind: ValidatorKind,
    message: String,
    check: ValidatorFn,
}

impl Validator {
    /// Create a validator. `{PATH}` and `{VALUE}` in `message` are
    /// substituted when it fails.
    pub fn new<F>(kind: ValidatorKind, message: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, &Value) -> std::result::Result<bool, String> + Send + Sync + 'static,
    {
        Self {
            kind,
            message: message.into(),
            check: Arc::new(check),
        }
    }

    pub fn kind(&self) -> ValidatorKind {
        self.kind
    }

    /// Run the check, returning the failure for `path` if any
    pub fn run(&self, path: &str, value: &Value, record: &Value) -> Option<ValidatorError> {
        match (self.check)(value, record) {
            Ok(true) => None,
            Ok(false) => Some(ValidatorError::new(
                path,
                format_message(&self.message, path, value),
                self.kind,
                value.clone(),
            )),
            Err(reason) => Some(ValidatorError::new(path, reason, self.kind, value.clone())),
        }
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

fn format_message(template: &str, path: &str, value: &Value) -> String {
    let shown = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    template.replace("{PATH}", path).replace("{VALUE}", &shown)
}

/// Failure of one field
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[error("{message}")]
pub struct ValidatorError {
    pub path: String,
    pub message: String,
    pub kind: ValidatorKind,
    pub value: Value,
}

impl ValidatorError {
    pub fn new(
        path: impl Into<String>,
        message: impl Into<String>,
        kind: ValidatorKind,
        value: Value,
    ) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
            value,
        }
    }
}

/// Field failures collected while compiling a single write, keyed by path in
/// the order they were found
#[derive(Error, Debug, Clone, Default, PartialEq, Serialize)]
#[error("Validation failed{}", describe(.errors))]
pub struct ValidationError {
    errors: IndexMap<String, ValidatorError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure. Only the first failure of a path is kept.
    pub fn insert(&mut self, error: ValidatorError) {
        self.errors.entry(error.path.clone()).or_insert(error);
    }

    pub fn get(&self, path: &str) -> Option<&ValidatorError> {
        self.errors.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.errors.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.errors.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidatorError> {
        self.errors.values()
    }
}

fn describe(errors: &IndexMap<String, ValidatorError>) -> String {
    if errors.is_empty() {
        return String::new();
    }
    let failures: Vec<String> = errors
        .values()
        .map(|error| format!("{}: {}", error.path, error.message))
        .collect();
    format!(": {}", failures.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failed_check_formats_message() {
        let validator = Validator::new(
            ValidatorKind::UserDefined,
            "Path `{PATH}` rejected {VALUE}",
            |value, _| Ok(value.as_str() != Some("bad")),
        );
        assert!(validator.run("email", &json!("ok"), &json!({})).is_none());

        let err = validator.run("email", &json!("bad"), &json!({})).unwrap();
        assert_eq!(err.path, "email");
        assert_eq!(err.message, "Path `email` rejected bad");
        assert_eq!(err.kind, ValidatorKind::UserDefined);
    }

    #[test]
    fn test_raised_message_is_kept() {
        let validator = Validator::new(ValidatorKind::UserDefined, "unused", |_, _| {
            Err("lookup failed".to_string())
        });
        let err = validator.run("email", &json!("x"), &json!({})).unwrap();
        assert_eq!(err.message, "lookup failed");
    }

    #[test]
    fn test_validator_sees_record() {
        let validator = Validator::new(ValidatorKind::UserDefined, "mismatch", |value, record| {
            Ok(record.get("password") == Some(value))
        });
        let record = json!({"password": "a", "confirm": "b"});
        assert!(validator.run("confirm", &json!("b"), &record).is_some());
        assert!(validator.run("confirm", &json!("a"), &record).is_none());
    }

    #[test]
    fn test_aggregate_keeps_order() {
        let mut agg = ValidationError::new();
        assert!(agg.is_empty());
        agg.insert(ValidatorError::new("b", "bad b", ValidatorKind::Required, Value::Null));
        agg.insert(ValidatorError::new("a", "bad a", ValidatorKind::Min, json!(1)));

        assert_eq!(agg.len(), 2);
        assert_eq!(agg.paths().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(agg.to_string(), "Validation failed: b: bad b, a: bad a");
    }

    #[test]
    fn test_aggregate_keeps_first_failure_per_path() {
        let mut agg = ValidationError::new();
        agg.insert(ValidatorError::new("n", "not allowed", ValidatorKind::Enum, json!("abc")));
        agg.insert(ValidatorError::new("n", "not a number", ValidatorKind::Cast, json!("abc")));

        assert_eq!(agg.len(), 1);
        assert_eq!(agg.get("n").unwrap().kind, ValidatorKind::Enum);
        assert_eq!(agg.to_string(), "Validation failed: n: not allowed");
        assert_eq!(ValidationError::new().to_string(), "Validation failed");
    }

    #[test]
    fn test_aggregate_serializes_by_path() {
        let mut agg = ValidationError::new();
        agg.insert(ValidatorError::new("email", "nope", ValidatorKind::UserDefined, json!("x")));
        let out = serde_json::to_value(&agg).unwrap();
        assert_eq!(out["errors"]["email"]["kind"], json!("user defined"));
    }
}
