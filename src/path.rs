//! Typed path descriptors
//!
//! A [`TypedPath`] is the resolved form of one declared field: its storage
//! column, semantic type, default, cast and validators.

use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use crate::error::{Result, SchemaError};
use crate::schema::Schema;
use crate::types::{date_millis, SchemaType};
use crate::validation::{Validator, ValidatorError, ValidatorKind};

/// Default producer; `None` means "no default"
pub type DefaultFn = Arc<dyn Fn() -> Option<Value> + Send + Sync>;

/// Declared default of a path
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Producer(DefaultFn),
}

impl DefaultValue {
    pub fn produce(&self) -> Option<Value> {
        match self {
            DefaultValue::Literal(value) => Some(value.clone()),
            DefaultValue::Producer(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            DefaultValue::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// Element type of a collection path
#[derive(Debug, Clone)]
pub enum ElementType {
    /// Scalar (or nested collection) elements, cast by their own descriptor
    Caster(Box<TypedPath>),
    /// Embedded documents with their own schema
    Document(Box<Schema>),
}

/// Modifiers applied when casting text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct TextModifiers {
    lowercase: bool,
    uppercase: bool,
    trim: bool,
}

impl TextModifiers {
    fn apply(&self, value: Value) -> Value {
        let mut s = match value {
            Value::String(s) => s,
            other => return other,
        };
        if self.trim {
            s = s.trim().to_string();
        }
        if self.lowercase {
            s = s.to_lowercase();
        }
        if self.uppercase {
            s = s.to_uppercase();
        }
        Value::String(s)
    }
}

/// Resolved descriptor for one declared field
#[derive(Debug, Clone)]
pub struct TypedPath {
    path: String,
    column: String,
    instance: SchemaType,
    element: Option<ElementType>,
    default: Option<DefaultValue>,
    validators: Vec<Validator>,
    text: TextModifiers,
    options: Map<String, Value>,
}

impl TypedPath {
    /// Build a scalar path from its declaration options
    pub fn scalar(
        path: impl Into<String>,
        column: impl Into<String>,
        instance: SchemaType,
        options: &Map<String, Value>,
    ) -> Result<Self> {
        let mut typed = Self {
            path: path.into(),
            column: column.into(),
            instance,
            element: None,
            default: None,
            validators: Vec::new(),
            text: TextModifiers::default(),
            options: options.clone(),
        };
        typed.apply_options()?;
        Ok(typed)
    }

    /// Build a collection path over `element`
    pub fn collection(
        path: impl Into<String>,
        column: impl Into<String>,
        element: ElementType,
        options: &Map<String, Value>,
    ) -> Result<Self> {
        let mut typed = Self::scalar(path, column, SchemaType::Collection, options)?;
        typed.element = Some(element);
        Ok(typed)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Storage column name
    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn instance(&self) -> SchemaType {
        self.instance
    }

    pub fn element(&self) -> Option<&ElementType> {
        self.element.as_ref()
    }

    /// Descriptor used to cast single elements of a scalar collection
    pub fn caster(&self) -> Option<&TypedPath> {
        match &self.element {
            Some(ElementType::Caster(caster)) => Some(caster),
            _ => None,
        }
    }

    /// Schema of embedded documents of a document collection
    pub fn schema(&self) -> Option<&Schema> {
        match &self.element {
            Some(ElementType::Document(schema)) => Some(schema),
            _ => None,
        }
    }

    /// Raw declaration options (`type`, `name`, `default`, ...)
    pub fn options(&self) -> &Map<String, Value> {
        &self.options
    }

    pub fn validators(&self) -> &[Validator] {
        &self.validators
    }

    pub fn is_required(&self) -> bool {
        self.validators
            .iter()
            .any(|v| v.kind() == ValidatorKind::Required)
    }

    /// Whether the path belongs in a projected column list. Identifiers and
    /// collections of identifiers are never selected.
    pub fn is_selectable(&self) -> bool {
        if self.instance.is_identifier() {
            return false;
        }
        match self.caster() {
            Some(caster) => caster.is_selectable(),
            None => true,
        }
    }

    /// Attach a validator returning `true` for valid values
    pub fn validate<F>(&mut self, check: F, message: impl Into<String>) -> &mut Self
    where
        F: Fn(&Value, &Value) -> bool + Send + Sync + 'static,
    {
        self.validators.push(Validator::new(
            ValidatorKind::UserDefined,
            message,
            move |value, record| Ok(check(value, record)),
        ));
        self
    }

    /// Attach a validator that reports its own failure message
    pub fn validate_with<F>(&mut self, check: F) -> &mut Self
    where
        F: Fn(&Value, &Value) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.validators.push(Validator::new(
            ValidatorKind::UserDefined,
            "Validator failed for path `{PATH}` with value `{VALUE}`",
            move |value, record| check(value, record).map(|()| true),
        ));
        self
    }

    pub fn set_default(&mut self, value: Value) -> &mut Self {
        self.default = Some(DefaultValue::Literal(value));
        self
    }

    /// Use a function to produce the default of each hydrated document
    pub fn default_with<F>(&mut self, producer: F) -> &mut Self
    where
        F: Fn() -> Option<Value> + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Producer(Arc::new(producer)));
        self
    }

    /// Default for a freshly built document. Collections without an explicit
    /// default start empty.
    pub fn get_default(&self) -> Option<Value> {
        match &self.default {
            Some(default) => default.produce(),
            None if self.instance == SchemaType::Collection => Some(Value::Array(Vec::new())),
            None => None,
        }
    }

    /// Cast `value` into its storage representation
    pub fn cast_for_query(&self, value: &Value) -> Result<Value> {
        if self.instance != SchemaType::Collection {
            return self
                .instance
                .cast(&self.path, value)
                .map(|cast| self.text.apply(cast));
        }

        match value {
            Value::Null => Ok(Value::Null),
            Value::Array(items) => items
                .iter()
                .map(|item| self.cast_element(item))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            single => Ok(Value::Array(vec![self.cast_element(single)?])),
        }
    }

    fn cast_element(&self, item: &Value) -> Result<Value> {
        match &self.element {
            Some(ElementType::Caster(caster)) => caster.cast_for_query(item),
            Some(ElementType::Document(schema)) => cast_document(&self.path, schema, item),
            None => Ok(item.clone()),
        }
    }

    /// Run validators in declaration order, stopping at the first failure
    pub fn do_validate(&self, value: &Value, record: &Value) -> Option<ValidatorError> {
        self.validators
            .iter()
            .find_map(|validator| validator.run(&self.path, value, record))
    }

    fn apply_options(&mut self) -> Result<()> {
        let options = self.options.clone();

        if let Some(default) = options.get("default") {
            self.default = Some(DefaultValue::Literal(default.clone()));
        }

        self.text = TextModifiers {
            lowercase: flag(&options, "lowercase"),
            uppercase: flag(&options, "uppercase"),
            trim: flag(&options, "trim"),
        };

        match options.get("required") {
            None | Some(Value::Bool(false)) | Some(Value::Null) => {}
            Some(Value::Bool(true)) => self.push_required("Path `{PATH}` is required."),
            Some(Value::String(message)) => self.push_required(message),
            Some(_) => return Err(self.invalid_option("required", "expected a boolean or message")),
        }

        if let Some(allowed) = options.get("enum") {
            let allowed = allowed
                .as_array()
                .cloned()
                .ok_or_else(|| self.invalid_option("enum", "expected a list of values"))?;
            self.validators.push(Validator::new(
                ValidatorKind::Enum,
                "`{VALUE}` is not a valid enum value for path `{PATH}`.",
                move |value, _| Ok(value.is_null() || allowed.contains(value)),
            ));
        }

        if let Some(pattern) = options.get("match") {
            let source = pattern
                .as_str()
                .ok_or_else(|| self.invalid_option("match", "expected a regular expression"))?;
            let re = Regex::new(source)
                .map_err(|e| self.invalid_option("match", &e.to_string()))?;
            self.validators.push(Validator::new(
                ValidatorKind::Regexp,
                "Path `{PATH}` is invalid ({VALUE}).",
                move |value, _| Ok(value.as_str().map_or(true, |s| re.is_match(s))),
            ));
        }

        for (key, kind) in [("min", ValidatorKind::Min), ("max", ValidatorKind::Max)] {
            let Some(bound) = options.get(key) else {
                continue;
            };
            let bound = bound
                .as_f64()
                .ok_or_else(|| self.invalid_option(key, "expected a number"))?;
            let instance = self.instance;
            let message = match kind {
                ValidatorKind::Min => format!(
                    "Path `{{PATH}}` ({{VALUE}}) is less than minimum allowed value ({}).",
                    bound
                ),
                _ => format!(
                    "Path `{{PATH}}` ({{VALUE}}) is more than maximum allowed value ({}).",
                    bound
                ),
            };
            self.validators.push(Validator::new(kind, message, move |value, _| {
                let Some(n) = comparable(instance, value) else {
                    return Ok(true);
                };
                Ok(match kind {
                    ValidatorKind::Min => n >= bound,
                    _ => n <= bound,
                })
            }));
        }

        Ok(())
    }

    fn push_required(&mut self, message: &str) {
        let instance = self.instance;
        self.validators.push(Validator::new(
            ValidatorKind::Required,
            message,
            move |value, _| Ok(instance.check_required(value)),
        ));
    }

    fn invalid_option(&self, option: &str, reason: &str) -> SchemaError {
        SchemaError::InvalidOption {
            path: self.path.clone(),
            option: option.to_string(),
            reason: reason.to_string(),
        }
    }
}

fn flag(options: &Map<String, Value>, key: &str) -> bool {
    options.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn comparable(instance: SchemaType, value: &Value) -> Option<f64> {
    match instance {
        SchemaType::Date => date_millis(value).map(|ms| ms as f64),
        SchemaType::Number => SchemaType::Number
            .cast("", value)
            .ok()
            .and_then(|cast| cast.as_f64()),
        _ => value.as_f64(),
    }
}

fn cast_document(path: &str, schema: &Schema, item: &Value) -> Result<Value> {
    match item {
        Value::Null => Ok(Value::Null),
        Value::Object(fields) => {
            let mut cast = Map::new();
            for (key, value) in fields {
                let value = match schema.path(key) {
                    Some(typed) => typed.cast_for_query(value)?,
                    None => value.clone(),
                };
                cast.insert(key.clone(), value);
            }
            Ok(Value::Object(cast))
        }
        other => Err(SchemaError::Cast {
            path: path.to_string(),
            expected: "Document",
            value: other.clone(),
        }),
    }
}
