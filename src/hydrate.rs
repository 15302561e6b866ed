//! Document hydration
//!
//! Builds a fresh document holding every path's default, honoring an
//! inclusion or exclusion projection.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};
use crate::schema::Schema;

/// Identity key that never decides the projection mode
pub const ID_KEY: &str = "_id";

/// Field flags controlling which paths a document is hydrated with.
///
/// A projection is in exclusion mode as soon as any non-identifier key is
/// excluded; otherwise it lists the only paths to include.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Projection {
    fields: IndexMap<String, bool>,
}

impl Projection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.fields.insert(path.into(), true);
        self
    }

    pub fn exclude(mut self, path: impl Into<String>) -> Self {
        self.fields.insert(path.into(), false);
        self
    }

    /// Parse `{"path": 0 | 1 | true | false, ...}`
    pub fn from_json(value: &Value) -> Result<Self> {
        let Some(map) = value.as_object() else {
            return Err(SchemaError::InvalidInput(format!(
                "projection must be a JSON object, got {}",
                value
            )));
        };

        let mut fields = IndexMap::with_capacity(map.len());
        for (key, flag) in map {
            let included = match flag {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().map_or(false, |f| f != 0.0),
                other => {
                    return Err(SchemaError::InvalidInput(format!(
                        "projection flag for `{}` must be 0/1 or a boolean, got {}",
                        key, other
                    )))
                }
            };
            fields.insert(key.clone(), included);
        }
        Ok(Self { fields })
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.fields.contains_key(path)
    }

    /// Whether any non-identifier key is excluded
    pub fn is_exclusive(&self, schema: &Schema) -> bool {
        self.fields.iter().any(|(key, included)| {
            !included
                && key != ID_KEY
                && !schema
                    .paths()
                    .get(key)
                    .map_or(false, |typed| typed.instance().is_identifier())
        })
    }
}

impl<K: Into<String>> FromIterator<(K, bool)> for Projection {
    fn from_iter<I: IntoIterator<Item = (K, bool)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl Schema {
    /// Build a document populated with defaults.
    ///
    /// Without a projection (or with an empty one) every path that has a
    /// default is populated. Intermediate objects are created on the way to
    /// each nested path.
    pub fn build(&self, projection: Option<&Projection>) -> Value {
        let projection = projection.filter(|p| !p.is_empty());
        let exclude = projection.map_or(false, |p| p.is_exclusive(self));

        let mut doc = Map::new();
        for (path, typed) in self.paths() {
            let pieces: Vec<&str> = path.split('.').collect();
            let last = pieces.len() - 1;
            let mut current = &mut doc;
            let mut prefix = String::new();

            for (i, piece) in pieces.iter().enumerate() {
                if exclude {
                    prefix.push_str(piece);
                    if projection.map_or(false, |p| p.contains(&prefix)) {
                        break;
                    }
                    prefix.push('.');
                }

                if i == last {
                    let wanted = match projection {
                        None => true,
                        Some(p) if exclude => !p.contains(path),
                        Some(p) => p.contains(path),
                    };
                    if wanted {
                        if let Some(default) = typed.get_default() {
                            current.insert(piece.to_string(), default);
                        }
                    }
                } else {
                    let slot = current
                        .entry(piece.to_string())
                        .or_insert_with(|| Value::Object(Map::new()));
                    if !slot.is_object() {
                        *slot = Value::Object(Map::new());
                    }
                    match slot.as_object_mut() {
                        Some(next) => current = next,
                        None => break,
                    }
                }
            }
        }

        Value::Object(doc)
    }
}
