//! Query compiler
//!
//! Turns criteria, projections and records into parameterized CQL statements.
//! Placeholders (`?`) appear in exactly the order of [`CompiledQuery::params`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};
use crate::schema::{is_truthy, Schema};
use crate::validation::{ValidationError, ValidatorError, ValidatorKind};

/// A compiled statement with its ordered parameters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub query: String,
    pub params: Vec<Value>,
    /// Field failures found while compiling an INSERT. The statement is still
    /// produced; callers decide whether to execute it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationError>,
}

impl CompiledQuery {
    pub fn is_valid(&self) -> bool {
        self.errors.is_none()
    }
}

/// Compiler behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerSettings {
    /// Emit a debug event for every compiled statement
    #[serde(default = "default_true")]
    pub trace_queries: bool,

    /// Limit used when a SELECT is compiled without one (0 = none)
    #[serde(default)]
    pub default_limit: u64,
}

fn default_true() -> bool {
    true
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            trace_queries: true,
            default_limit: 0,
        }
    }
}

/// Compiles statements against one schema
#[derive(Debug, Clone)]
pub struct QueryCompiler<'a> {
    schema: &'a Schema,
    settings: CompilerSettings,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self {
            schema,
            settings: CompilerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CompilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Compile `SELECT <columns> FROM <table> [WHERE ...] [LIMIT n]`.
    ///
    /// Every criteria key must be a declared path; its value is cast to the
    /// storage representation. `fields` restricts the projected columns.
    pub fn select(
        &self,
        table: &str,
        criteria: &Value,
        fields: &[&str],
        limit: u64,
    ) -> Result<CompiledQuery> {
        let criteria = as_object(criteria, "criteria")?;
        let columns = self.select_fields(fields)?;

        let mut conditions = Vec::with_capacity(criteria.len());
        let mut params = Vec::with_capacity(criteria.len());
        for (key, value) in criteria {
            let typed = self
                .schema
                .paths()
                .get(key)
                .ok_or_else(|| SchemaError::UnknownField(key.clone()))?;
            conditions.push(format!("{} = ?", typed.column()));
            params.push(typed.cast_for_query(value)?);
        }

        let mut query = format!("SELECT {} FROM {}", columns, table);
        if !conditions.is_empty() {
            query.push_str(" WHERE ");
            query.push_str(&conditions.join(" AND "));
        }

        let limit = if limit > 0 { limit } else { self.settings.default_limit };
        if limit > 0 {
            query.push_str(&format!(" LIMIT {}", limit));
        }

        self.trace("select", table, &query, params.len());
        Ok(CompiledQuery {
            query,
            params,
            errors: None,
        })
    }

    /// Compile `INSERT INTO <table> (<columns>) VALUES (<placeholders>)`.
    ///
    /// Every declared path is validated against `record`; failures are
    /// collected in [`CompiledQuery::errors`] without stopping compilation.
    /// Falsy values (`null`, `false`, `0`, `""`, absent) never produce a
    /// column.
    pub fn insert(&self, table: &str, record: &Value, fields: &[&str]) -> Result<CompiledQuery> {
        as_object(record, "record")?;
        self.check_fields(fields)?;

        let mut columns = Vec::new();
        let mut params = Vec::new();
        let mut errors: Option<ValidationError> = None;

        for path in self.schema.leaf_paths() {
            let Some(typed) = self.schema.paths().get(&path) else {
                continue;
            };
            let value = value_at(record, &path);

            if let Some(failure) = typed.do_validate(value.unwrap_or(&Value::Null), record) {
                errors.get_or_insert_with(ValidationError::new).insert(failure);
            }

            let Some(value) = value.filter(|v| is_truthy(v)) else {
                continue;
            };
            if !is_listed(fields, &path) {
                continue;
            }

            match typed.cast_for_query(value) {
                Ok(cast) => {
                    columns.push(typed.column().to_string());
                    params.push(cast);
                }
                Err(err) => {
                    let failure =
                        ValidatorError::new(&path, err.to_string(), ValidatorKind::Cast, value.clone());
                    errors.get_or_insert_with(ValidationError::new).insert(failure);
                }
            }
        }

        let placeholders = vec!["?"; columns.len()].join(", ");
        let query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        );

        self.trace("insert", table, &query, params.len());
        if let Some(errors) = &errors {
            tracing::debug!(table, failed = errors.len(), "insert has validation errors");
        }
        Ok(CompiledQuery {
            query,
            params,
            errors,
        })
    }

    /// Projected column list for a SELECT, `*` when nothing is selectable
    pub fn select_fields(&self, fields: &[&str]) -> Result<String> {
        self.check_fields(fields)?;

        let columns: Vec<&str> = self
            .schema
            .leaf_paths()
            .iter()
            .filter(|path| is_listed(fields, path))
            .filter_map(|path| self.schema.paths().get(path.as_str()))
            .filter(|typed| typed.is_selectable())
            .map(|typed| typed.column())
            .collect();

        if columns.is_empty() {
            Ok("*".to_string())
        } else {
            Ok(columns.join(", "))
        }
    }

    /// Allow-list entries must name a declared path or nested prefix
    fn check_fields(&self, fields: &[&str]) -> Result<()> {
        for field in fields {
            if !self.schema.paths().contains_key(*field) && !self.schema.nested().any(|n| n == *field) {
                return Err(SchemaError::UnknownField(field.to_string()));
            }
        }
        Ok(())
    }

    fn trace(&self, kind: &str, table: &str, query: &str, params: usize) {
        if self.settings.trace_queries {
            tracing::debug!(target: "cql_schema::compiler", kind, table, params, "{}", query);
        }
    }
}

impl Schema {
    /// Compile a SELECT with default compiler settings
    pub fn select(
        &self,
        table: &str,
        criteria: &Value,
        fields: &[&str],
        limit: u64,
    ) -> Result<CompiledQuery> {
        QueryCompiler::new(self).select(table, criteria, fields, limit)
    }

    /// Compile an INSERT with default compiler settings
    pub fn insert(&self, table: &str, record: &Value, fields: &[&str]) -> Result<CompiledQuery> {
        QueryCompiler::new(self).insert(table, record, fields)
    }
}

fn as_object<'v>(value: &'v Value, what: &str) -> Result<&'v Map<String, Value>> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(EMPTY.get_or_init(Map::new)),
        other => Err(SchemaError::InvalidInput(format!(
            "{} must be a JSON object, got {}",
            what, other
        ))),
    }
}

/// An empty allow-list includes everything; otherwise a path is listed
/// directly or through one of its nested prefixes
fn is_listed(fields: &[&str], path: &str) -> bool {
    fields.is_empty()
        || fields.iter().any(|field| {
            path == *field
                || path
                    .strip_prefix(*field)
                    .map_or(false, |rest| rest.starts_with('.'))
        })
}

/// Value at a dotted path, preferring a literal dotted key
fn value_at<'v>(record: &'v Value, path: &str) -> Option<&'v Value> {
    if let Some(value) = record.get(path) {
        return Some(value);
    }
    path.split('.')
        .try_fold(record, |current, segment| current.get(segment))
}
