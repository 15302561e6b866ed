//! Type registry and scalar casting
//!
//! Declared type names resolve to a closed set of [`SchemaType`] tags. Each tag
//! knows how to cast an input value into the representation handed to the
//! CQL driver.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::fmt;

use crate::error::{Result, SchemaError};

/// Semantic type of a declared path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaType {
    /// UTF-8 text
    String,
    /// Integer or floating point number
    Number,
    /// Boolean flag
    Boolean,
    /// Timestamp, stored as epoch milliseconds
    Date,
    /// 24 hex digit document identifier
    ObjectId,
    /// RFC 4122 UUID
    Uuid,
    /// Opaque value, stored as given
    Mixed,
    /// Homogeneous list of a single element type
    Collection,
}

/// Names accepted in declarations, after first-letter normalization
const REGISTRY: &[(&str, SchemaType)] = &[
    ("String", SchemaType::String),
    ("Number", SchemaType::Number),
    ("Boolean", SchemaType::Boolean),
    ("Date", SchemaType::Date),
    ("ObjectId", SchemaType::ObjectId),
    ("ObjectID", SchemaType::ObjectId),
    ("Uuid", SchemaType::Uuid),
    ("Mixed", SchemaType::Mixed),
];

impl SchemaType {
    /// Look up a declared type name. The first character is upper-cased
    /// before lookup, so `"string"` and `"String"` are equivalent.
    pub fn lookup(type_name: &str) -> Option<SchemaType> {
        let normalized = normalize_name(type_name);
        REGISTRY
            .iter()
            .find(|(name, _)| *name == normalized)
            .map(|(_, ty)| *ty)
    }

    /// Resolve a declared type name for `path`, failing with
    /// [`SchemaError::UnknownType`] if it is not registered
    pub fn resolve(path: &str, type_name: &str) -> Result<SchemaType> {
        Self::lookup(type_name).ok_or_else(|| SchemaError::UnknownType {
            path: path.to_string(),
            type_name: type_name.to_string(),
        })
    }

    /// Canonical type name
    pub fn name(&self) -> &'static str {
        match self {
            SchemaType::String => "String",
            SchemaType::Number => "Number",
            SchemaType::Boolean => "Boolean",
            SchemaType::Date => "Date",
            SchemaType::ObjectId => "ObjectId",
            SchemaType::Uuid => "Uuid",
            SchemaType::Mixed => "Mixed",
            SchemaType::Collection => "Collection",
        }
    }

    /// Identifier types are never part of a projected column list
    pub fn is_identifier(&self) -> bool {
        matches!(self, SchemaType::ObjectId)
    }

    /// Cast a scalar value for `path` into its storage representation.
    ///
    /// `null` always casts to `null`. Collections are cast element-wise by
    /// their owning path and are passed through here unchanged.
    pub fn cast(&self, path: &str, value: &Value) -> Result<Value> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        let cast = match self {
            SchemaType::String => cast_string(value),
            SchemaType::Number => cast_number(value),
            SchemaType::Boolean => cast_boolean(value),
            SchemaType::Date => cast_date(value),
            SchemaType::ObjectId => cast_object_id(value),
            SchemaType::Uuid => cast_uuid(value),
            SchemaType::Mixed | SchemaType::Collection => Some(value.clone()),
        };

        cast.ok_or_else(|| SchemaError::Cast {
            path: path.to_string(),
            expected: self.name(),
            value: value.clone(),
        })
    }

    /// Whether `value` satisfies a `required` constraint for this type
    pub fn check_required(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => false,
            (SchemaType::String, Value::String(s)) => !s.is_empty(),
            (SchemaType::String, _) => false,
            (SchemaType::Number, v) => v.is_number(),
            (SchemaType::Boolean, v) => v.is_boolean(),
            (SchemaType::Collection, Value::Array(items)) => !items.is_empty(),
            _ => true,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

fn normalize_name(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn cast_string(value: &Value) -> Option<Value> {
    match value {
        Value::String(_) => Some(value.clone()),
        Value::Number(n) => Some(Value::String(n.to_string())),
        Value::Bool(b) => Some(Value::String(b.to_string())),
        _ => None,
    }
}

fn cast_number(value: &Value) -> Option<Value> {
    match value {
        Value::Number(_) => Some(value.clone()),
        Value::Bool(b) => Some(Value::from(u8::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return Some(Value::Null);
            }
            if let Ok(i) = s.parse::<i64>() {
                return Some(Value::from(i));
            }
            s.parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
        }
        _ => None,
    }
}

fn cast_boolean(value: &Value) -> Option<Value> {
    match value {
        Value::Bool(_) => Some(value.clone()),
        Value::String(s) => match s.as_str() {
            "true" | "1" => Some(Value::Bool(true)),
            "false" | "0" => Some(Value::Bool(false)),
            _ => None,
        },
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(Value::Bool(true)),
            Some(0) => Some(Value::Bool(false)),
            _ => None,
        },
        _ => None,
    }
}

/// Epoch milliseconds for a date value, accepting integers and RFC 3339 text
pub(crate) fn date_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|d| d.timestamp_millis())),
        _ => None,
    }
}

fn cast_date(value: &Value) -> Option<Value> {
    date_millis(value).map(Value::from)
}

fn cast_object_id(value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    if s.len() == 24 && s.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(Value::String(s.to_ascii_lowercase()))
    } else {
        None
    }
}

fn cast_uuid(value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    uuid::Uuid::parse_str(s)
        .ok()
        .map(|id| Value::String(id.hyphenated().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_normalizes_first_letter() {
        assert_eq!(SchemaType::lookup("string"), Some(SchemaType::String));
        assert_eq!(SchemaType::lookup("String"), Some(SchemaType::String));
        assert_eq!(SchemaType::lookup("objectId"), Some(SchemaType::ObjectId));
        assert_eq!(SchemaType::lookup("ObjectID"), Some(SchemaType::ObjectId));
        assert_eq!(SchemaType::lookup("Collection"), None);
        assert_eq!(SchemaType::lookup(""), None);
    }

    #[test]
    fn test_unknown_type_hints_at_nesting() {
        let err = SchemaType::resolve("profile", "Profile").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("profile"));
        assert!(message.contains("You can only nest using refs or arrays"));
        assert!(err.is_declaration_error());
    }

    #[test]
    fn test_number_cast() {
        let ty = SchemaType::Number;
        assert_eq!(ty.cast("age", &json!(5)).unwrap(), json!(5));
        assert_eq!(ty.cast("age", &json!("42")).unwrap(), json!(42));
        assert_eq!(ty.cast("age", &json!("1.5")).unwrap(), json!(1.5));
        assert_eq!(ty.cast("age", &json!(true)).unwrap(), json!(1));
        assert!(ty.cast("age", &json!("many")).is_err());
        assert!(ty.cast("age", &json!({"n": 1})).is_err());
    }

    #[test]
    fn test_date_cast_to_millis() {
        let ty = SchemaType::Date;
        assert_eq!(ty.cast("at", &json!(1_000)).unwrap(), json!(1_000));
        assert_eq!(
            ty.cast("at", &json!("1970-01-01T00:00:01Z")).unwrap(),
            json!(1_000)
        );
        assert!(ty.cast("at", &json!("yesterday")).is_err());
    }

    #[test]
    fn test_identifier_casts() {
        let oid = SchemaType::ObjectId
            .cast("_id", &json!("507F1F77BCF86CD799439011"))
            .unwrap();
        assert_eq!(oid, json!("507f1f77bcf86cd799439011"));
        assert!(SchemaType::ObjectId.cast("_id", &json!("xyz")).is_err());

        let id = SchemaType::Uuid
            .cast("key", &json!("67E55044-10B1-426F-9247-BB680E5FE0C8"))
            .unwrap();
        assert_eq!(id, json!("67e55044-10b1-426f-9247-bb680e5fe0c8"));
    }

    #[test]
    fn test_null_casts_to_null() {
        for ty in [SchemaType::String, SchemaType::Number, SchemaType::Uuid] {
            assert_eq!(ty.cast("p", &Value::Null).unwrap(), Value::Null);
        }
    }

    #[test]
    fn test_check_required() {
        assert!(!SchemaType::String.check_required(&json!("")));
        assert!(SchemaType::String.check_required(&json!("x")));
        assert!(SchemaType::Number.check_required(&json!(0)));
        assert!(SchemaType::Boolean.check_required(&json!(false)));
        assert!(!SchemaType::Collection.check_required(&json!([])));
        assert!(!SchemaType::Mixed.check_required(&Value::Null));
    }
}
