//! Schema declaration and path resolution
//!
//! A [`Schema`] is built once from a nested JSON declaration and keeps two
//! views of it: the [`PathTree`] mirroring the declared nesting, and a flat,
//! insertion-ordered map from dotted path to [`TypedPath`].
//!
//! ```text
//! {                                  paths
//!   "name": { "first": "string" },   ├── name.first  -> String
//!   "age": { "type": "number" },     ├── age         -> Number
//!   "tags": ["string"]               └── tags        -> Collection<String>
//! }
//! ```

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};
use crate::path::{ElementType, TypedPath};
use crate::tree::PathTree;
use crate::types::SchemaType;

/// Path names that collide with document accessors
pub const RESERVED: &[&str] = &[
    "on",
    "db",
    "set",
    "get",
    "init",
    "isNew",
    "errors",
    "schema",
    "options",
    "modelName",
    "collection",
    "toObject",
    "emit",
    "_events",
    "_pres",
    "_posts",
];

/// Schema-wide options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaOptions {
    /// Derive lower-cased column names from paths
    #[serde(default)]
    pub insensitive: bool,
}

impl SchemaOptions {
    pub fn insensitive() -> Self {
        Self { insensitive: true }
    }
}

/// How a path string relates to the schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathType {
    /// Declared field, directly or through a positional segment
    Real,
    /// Prefix of declared fields
    Nested,
    /// Not declared
    Adhoc,
}

/// A declared record shape
#[derive(Debug, Clone, Default)]
pub struct Schema {
    paths: IndexMap<String, TypedPath>,
    tree: PathTree,
    nested: IndexSet<String>,
    options: SchemaOptions,
}

impl Schema {
    /// Build a schema from a declaration with default options
    pub fn new(declaration: &Value) -> Result<Self> {
        Self::with_options(declaration, SchemaOptions::default())
    }

    /// Build a schema from a declaration
    pub fn with_options(declaration: &Value, options: SchemaOptions) -> Result<Self> {
        let mut schema = Self::empty(options);
        schema.add(declaration, "")?;
        tracing::trace!(paths = schema.paths.len(), "schema built");
        Ok(schema)
    }

    pub fn empty(options: SchemaOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &SchemaOptions {
        &self.options
    }

    pub fn is_insensitive(&self) -> bool {
        self.options.insensitive
    }

    /// Flat map of declared paths
    pub fn paths(&self) -> &IndexMap<String, TypedPath> {
        &self.paths
    }

    pub fn tree(&self) -> &PathTree {
        &self.tree
    }

    /// Nested prefixes registered while adding declarations
    pub fn nested(&self) -> impl Iterator<Item = &str> {
        self.nested.iter().map(String::as_str)
    }

    /// Declared paths in tree order
    pub fn leaf_paths(&self) -> Vec<String> {
        self.tree.leaf_paths()
    }

    /// Introspection copy of the declaration as it was registered
    pub fn tree_json(&self) -> Value {
        self.tree.to_json()
    }

    /// Add every key of `declaration` under `prefix` (`""` or ending in `.`).
    ///
    /// Plain objects without a `type` key are nested shapes and recurse;
    /// empty objects declare a Mixed field.
    pub fn add(&mut self, declaration: &Value, prefix: &str) -> Result<&mut Self> {
        let Some(fields) = declaration.as_object() else {
            return Err(SchemaError::InvalidPath(prefix.trim_end_matches('.').to_string()));
        };

        for (key, desc) in fields {
            let full_path = format!("{}{}", prefix, key);
            if desc.is_null() {
                return Err(SchemaError::InvalidPath(full_path));
            }

            match desc.as_object() {
                Some(shape) if is_nested_shape(desc) && !shape.is_empty() => {
                    self.nested.insert(full_path.clone());
                    self.add(desc, &format!("{}.", full_path))?;
                }
                _ => {
                    self.define_path(&full_path, desc)?;
                }
            }
        }

        Ok(self)
    }

    /// Register a single field at `path`. A later declaration of the same
    /// path replaces the earlier one.
    pub fn define_path(&mut self, path: &str, declaration: &Value) -> Result<&mut TypedPath> {
        if RESERVED.contains(&path) {
            return Err(SchemaError::ReservedName(path.to_string()));
        }
        if path.split('.').any(str::is_empty) {
            return Err(SchemaError::InvalidPath(path.to_string()));
        }

        let typed = interpret_as_type(self.options, path, declaration)?;
        self.tree.insert(path, declaration.clone())?;

        tracing::trace!(path, column = typed.column(), instance = %typed.instance(), "path declared");
        let (index, _) = self.paths.insert_full(path.to_string(), typed);
        Ok(&mut self.paths[index])
    }

    /// Resolve a path string to its descriptor.
    ///
    /// Exact declarations are returned directly. Paths with numeric segments
    /// (`list.3.name`) resolve through the collection's element type.
    pub fn path(&self, path: &str) -> Option<&TypedPath> {
        if let Some(typed) = self.paths.get(path) {
            return Some(typed);
        }
        if is_positional(path) {
            self.positional_path(path)
        } else {
            None
        }
    }

    /// Mutable access to an exactly declared path, for attaching validators
    /// and default producers while the schema is being built
    pub fn path_mut(&mut self, path: &str) -> Option<&mut TypedPath> {
        self.paths.get_mut(path)
    }

    pub fn path_type(&self, path: &str) -> PathType {
        if self.paths.contains_key(path) {
            PathType::Real
        } else if self.nested.contains(path) {
            PathType::Nested
        } else if self.path(path).is_some() {
            PathType::Real
        } else {
            PathType::Adhoc
        }
    }

    fn positional_path(&self, path: &str) -> Option<&TypedPath> {
        let parts = split_positional(path);
        let (head, rest) = parts.split_first()?;
        let PathPart::Name(head) = head else {
            return None;
        };

        let mut current = self.paths.get(head)?;
        let last = rest.len().saturating_sub(1);
        for (i, part) in rest.iter().enumerate() {
            match part {
                PathPart::Index if i == last => {
                    return match current.element()? {
                        ElementType::Caster(caster) => Some(caster.as_ref()),
                        ElementType::Document(_) => Some(current),
                    };
                }
                PathPart::Index => continue,
                PathPart::Name(name) => {
                    current = current.schema()?.path(name)?;
                }
            }
        }
        Some(current)
    }
}

/// Interpret a raw declaration as a typed path
pub(crate) fn interpret_as_type(
    options: SchemaOptions,
    path: &str,
    declaration: &Value,
) -> Result<TypedPath> {
    let decl: Map<String, Value> = match declaration {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("type".to_string(), other.clone());
            map
        }
    };

    // { type: { type: String } } declares a field named "type"
    let ty = match decl.get("type") {
        Some(t) if is_truthy(t) && !has_type_key(t) => t.clone(),
        _ => Value::Object(Map::new()),
    };

    let column = match decl.get("name").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ if options.insensitive => path.to_lowercase(),
        _ => path.to_string(),
    };

    if ty.is_array() || is_array_marker(&ty) || decl.contains_key("cast") {
        let cast = match &ty {
            Value::Array(items) => items.first(),
            _ => decl.get("cast"),
        };
        let element = interpret_element(options, path, cast)?;
        return TypedPath::collection(path, column, element, &decl);
    }

    let name = match &ty {
        Value::String(name) => name.as_str(),
        Value::Object(map) if map.is_empty() => "Mixed",
        Value::Object(map) => map.get("name").and_then(Value::as_str).unwrap_or_default(),
        _ => "",
    };
    if name.is_empty() {
        return Err(SchemaError::UnknownType {
            path: path.to_string(),
            type_name: ty.to_string(),
        });
    }

    let instance = SchemaType::resolve(path, name)?;
    TypedPath::scalar(path, column, instance, &decl)
}

fn interpret_element(
    options: SchemaOptions,
    path: &str,
    cast: Option<&Value>,
) -> Result<ElementType> {
    match cast {
        None | Some(Value::Null) => Ok(ElementType::Caster(Box::new(interpret_as_type(
            options,
            path,
            &Value::String("Mixed".to_string()),
        )?))),
        Some(shape) if is_nested_shape(shape) && shape.as_object().map_or(false, |m| !m.is_empty()) => {
            Ok(ElementType::Document(Box::new(Schema::with_options(shape, options)?)))
        }
        Some(other) => Ok(ElementType::Caster(Box::new(interpret_as_type(
            options, path, other,
        )?))),
    }
}

/// A plain object whose `type` is absent, or is itself an object declaring
/// a `type`, describes a nested shape rather than a field
fn is_nested_shape(value: &Value) -> bool {
    match value.as_object() {
        Some(map) => match map.get("type") {
            Some(ty) if is_truthy(ty) => has_type_key(ty),
            _ => true,
        },
        None => false,
    }
}

fn has_type_key(value: &Value) -> bool {
    value
        .as_object()
        .and_then(|map| map.get("type"))
        .map_or(false, is_truthy)
}

fn is_array_marker(value: &Value) -> bool {
    matches!(value.as_str(), Some("Array") | Some("array"))
}

/// Loose truthiness of a declaration or record value: `null`, `false`, `0`
/// and `""` are falsy
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

fn is_positional(path: &str) -> bool {
    path.split('.').skip(1).any(is_index)
}

#[derive(Debug, PartialEq)]
enum PathPart {
    Name(String),
    Index,
}

/// Split `a.b.3.c.d` into `[Name("a.b"), Index, Name("c.d")]`
fn split_positional(path: &str) -> Vec<PathPart> {
    let mut parts = Vec::new();
    let mut run: Vec<&str> = Vec::new();
    for segment in path.split('.') {
        if is_index(segment) && !(parts.is_empty() && run.is_empty()) {
            if !run.is_empty() {
                parts.push(PathPart::Name(run.join(".")));
                run.clear();
            }
            parts.push(PathPart::Index);
        } else {
            run.push(segment);
        }
    }
    if !run.is_empty() {
        parts.push(PathPart::Name(run.join(".")));
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn user_schema() -> Schema {
        Schema::new(&json!({
            "name": { "first": "string", "last": { "type": "String" } },
            "age": { "type": "number", "min": 0 },
            "tags": ["string"],
            "comments": [{ "body": "string", "votes": "number" }],
            "meta": {},
        }))
        .unwrap()
    }

    #[test]
    fn test_nested_declaration_builds_paths() {
        let schema = user_schema();
        let paths: Vec<&str> = schema.paths().keys().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec!["name.first", "name.last", "age", "tags", "comments", "meta"]
        );
        assert_eq!(schema.nested().collect::<Vec<_>>(), vec!["name"]);
        assert_eq!(schema.path_type("name"), PathType::Nested);
        assert_eq!(schema.path_type("age"), PathType::Real);
        assert_eq!(schema.path_type("nope"), PathType::Adhoc);
    }

    #[test]
    fn test_empty_object_is_mixed() {
        let schema = user_schema();
        assert_eq!(schema.path("meta").unwrap().instance(), SchemaType::Mixed);
    }

    #[test]
    fn test_path_returns_same_descriptor() {
        let schema = user_schema();
        let a = schema.path("name.first").unwrap();
        let b = schema.path("name.first").unwrap();
        assert!(std::ptr::eq(a, b));
        assert_eq!(a.column(), "name.first");
    }

    #[test]
    fn test_insensitive_columns() {
        let schema = Schema::with_options(
            &json!({ "firstName": "string", "lastName": { "type": "string", "name": "surname" } }),
            SchemaOptions::insensitive(),
        )
        .unwrap();
        assert_eq!(schema.path("firstName").unwrap().column(), "firstname");
        assert_eq!(schema.path("lastName").unwrap().column(), "surname");
    }

    #[test]
    fn test_field_named_type() {
        let schema = Schema::new(&json!({
            "asset": { "type": { "type": "string" }, "size": "number" }
        }))
        .unwrap();
        assert_eq!(schema.path("asset.type").unwrap().instance(), SchemaType::String);
        assert_eq!(schema.path("asset.size").unwrap().instance(), SchemaType::Number);
    }

    #[test]
    fn test_array_declarations() {
        let schema = Schema::new(&json!({
            "ids": { "type": "Array", "cast": "ObjectId" },
            "anything": [],
            "scores": { "type": "number", "cast": "number" },
        }))
        .unwrap();

        let ids = schema.path("ids").unwrap();
        assert_eq!(ids.instance(), SchemaType::Collection);
        assert_eq!(ids.caster().unwrap().instance(), SchemaType::ObjectId);
        assert!(!ids.is_selectable());

        let anything = schema.path("anything").unwrap();
        assert_eq!(anything.caster().unwrap().instance(), SchemaType::Mixed);

        assert_eq!(schema.path("scores").unwrap().instance(), SchemaType::Collection);
    }

    #[test]
    fn test_positional_paths() {
        let schema = user_schema();

        let caster = schema.path("tags.0").unwrap();
        assert_eq!(caster.instance(), SchemaType::String);
        assert!(std::ptr::eq(caster, schema.path("tags").unwrap().caster().unwrap()));

        for index in ["0", "7", "1024"] {
            let votes = schema.path(&format!("comments.{}.votes", index)).unwrap();
            assert_eq!(votes.instance(), SchemaType::Number);
        }
        assert_eq!(
            schema.path("comments.3").unwrap().instance(),
            SchemaType::Collection
        );
        assert!(schema.path("comments.0.missing").is_none());
        assert!(schema.path("age.0").is_none());
        assert!(schema.path("tags.0.x").is_none());
        assert_eq!(schema.path_type("comments.2.body"), PathType::Real);
    }

    #[test]
    fn test_redeclaring_overwrites() {
        let mut schema = user_schema();
        schema.define_path("age", &json!("string")).unwrap();
        assert_eq!(schema.path("age").unwrap().instance(), SchemaType::String);
        assert_eq!(schema.paths().len(), 6);
    }

    #[test]
    fn test_leaf_branch_conflicts() {
        let mut schema = Schema::new(&json!({ "a": { "b": "string" } })).unwrap();
        let err = schema.add(&json!({ "a": "number" }), "").unwrap_err();
        assert!(err.is_declaration_error());

        let mut schema = Schema::new(&json!({ "a": "number" })).unwrap();
        let err = schema.define_path("a.b", &json!("string")).unwrap_err();
        assert!(matches!(err, SchemaError::PathConflict { ref parent, .. } if parent == "a"));
    }

    #[test]
    fn test_declaration_errors() {
        let err = Schema::new(&json!({ "errors": "string" })).unwrap_err();
        assert_eq!(err.to_string(), "`errors` may not be used as a schema pathname");

        let err = Schema::new(&json!({ "a": { "b": null } })).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPath(ref p) if p == "a.b"));

        let err = Schema::new(&json!({ "profile": "Profile" })).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { .. }));

        let err = Schema::new(&json!({ "n": { "type": 5 } })).unwrap_err();
        assert!(err.is_declaration_error());
    }

    #[test]
    fn test_tree_keeps_raw_declaration() {
        let schema = Schema::new(&json!({ "age": { "type": "number", "default": 3 } })).unwrap();
        assert_eq!(
            schema.tree_json(),
            json!({ "age": { "type": "number", "default": 3 } })
        );
    }

    #[test]
    fn test_split_positional() {
        assert_eq!(
            split_positional("a.b.3.c.d"),
            vec![
                PathPart::Name("a.b".to_string()),
                PathPart::Index,
                PathPart::Name("c.d".to_string()),
            ]
        );
        assert_eq!(
            split_positional("list.0"),
            vec![PathPart::Name("list".to_string()), PathPart::Index]
        );
    }
}
