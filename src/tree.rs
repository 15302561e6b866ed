//! Path tree
//!
//! Arena-backed mirror of the declared nesting. Branch nodes map the next path
//! segment to a child; leaf nodes keep a copy of the raw declaration for
//! introspection. A path can never continue past a leaf, and a leaf can never
//! replace a branch.

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{Result, SchemaError};

/// Index of a node in the arena
pub type NodeId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Branch(IndexMap<String, NodeId>),
    Leaf(Value),
}

#[derive(Debug, Clone)]
pub struct PathTree {
    nodes: Vec<TreeNode>,
}

impl Default for PathTree {
    fn default() -> Self {
        Self::new()
    }
}

impl PathTree {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![TreeNode::Branch(IndexMap::new())],
        }
    }

    /// Store `declaration` at `path`, creating branches for every parent
    /// segment. Re-declaring an existing leaf replaces it in place.
    pub fn insert(&mut self, path: &str, declaration: Value) -> Result<NodeId> {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| SchemaError::InvalidPath(path.to_string()))?;

        let mut current = Self::ROOT;
        for (i, segment) in parents.iter().enumerate() {
            current = match self.child(current, segment) {
                Some(child) => match &self.nodes[child] {
                    TreeNode::Branch(_) => child,
                    TreeNode::Leaf(existing) => {
                        return Err(SchemaError::PathConflict {
                            path: path.to_string(),
                            parent: segments[..=i].join("."),
                            type_name: describe(existing),
                        });
                    }
                },
                None => self.push_child(current, segment, TreeNode::Branch(IndexMap::new())),
            };
        }

        match self.child(current, last) {
            Some(existing) => {
                if matches!(self.nodes[existing], TreeNode::Branch(_)) {
                    return Err(SchemaError::NestedConflict(path.to_string()));
                }
                self.nodes[existing] = TreeNode::Leaf(declaration);
                Ok(existing)
            }
            None => Ok(self.push_child(current, last, TreeNode::Leaf(declaration))),
        }
    }

    /// Look up the node at a dotted path
    pub fn get(&self, path: &str) -> Option<&TreeNode> {
        let mut current = Self::ROOT;
        for segment in path.split('.') {
            current = self.child(current, segment)?;
        }
        self.nodes.get(current)
    }

    /// Leaf paths in declaration order, depth first
    pub fn leaf_paths(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_leaves(Self::ROOT, "", &mut out);
        out
    }

    /// Render the tree as nested JSON, leaves holding their declarations
    pub fn to_json(&self) -> Value {
        self.render(Self::ROOT)
    }

    fn child(&self, parent: NodeId, segment: &str) -> Option<NodeId> {
        match &self.nodes[parent] {
            TreeNode::Branch(children) => children.get(segment).copied(),
            TreeNode::Leaf(_) => None,
        }
    }

    fn push_child(&mut self, parent: NodeId, segment: &str, node: TreeNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        if let TreeNode::Branch(children) = &mut self.nodes[parent] {
            children.insert(segment.to_string(), id);
        }
        id
    }

    fn collect_leaves(&self, id: NodeId, prefix: &str, out: &mut Vec<String>) {
        let TreeNode::Branch(children) = &self.nodes[id] else {
            return;
        };
        for (segment, &child) in children {
            let path = if prefix.is_empty() {
                segment.clone()
            } else {
                format!("{}.{}", prefix, segment)
            };
            match self.nodes[child] {
                TreeNode::Leaf(_) => out.push(path),
                TreeNode::Branch(_) => self.collect_leaves(child, &path, out),
            }
        }
    }

    fn render(&self, id: NodeId) -> Value {
        match &self.nodes[id] {
            TreeNode::Leaf(declaration) => declaration.clone(),
            TreeNode::Branch(children) => {
                let mut map = Map::new();
                for (segment, &child) in children {
                    map.insert(segment.clone(), self.render(child));
                }
                Value::Object(map)
            }
        }
    }
}

/// Short type description of a raw declaration, for conflict messages
fn describe(declaration: &Value) -> String {
    let ty = match declaration {
        Value::Object(map) => map.get("type").unwrap_or(declaration),
        other => other,
    };
    match ty {
        Value::String(name) => name.clone(),
        Value::Array(_) => "Collection".to_string(),
        _ => "Mixed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_builds_branches() {
        let mut tree = PathTree::new();
        tree.insert("name.first", json!("string")).unwrap();
        tree.insert("name.last", json!("string")).unwrap();
        tree.insert("age", json!({"type": "number"})).unwrap();

        assert!(matches!(tree.get("name"), Some(TreeNode::Branch(_))));
        assert_eq!(tree.get("name.first"), Some(&TreeNode::Leaf(json!("string"))));
        assert_eq!(tree.leaf_paths(), vec!["name.first", "name.last", "age"]);
        assert_eq!(
            tree.to_json(),
            json!({"name": {"first": "string", "last": "string"}, "age": {"type": "number"}})
        );
    }

    #[test]
    fn test_cannot_nest_under_leaf() {
        let mut tree = PathTree::new();
        tree.insert("a", json!("number")).unwrap();
        let err = tree.insert("a.b", json!("string")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot set nested path `a.b`. Parent path `a` already set to type number."
        );
    }

    #[test]
    fn test_cannot_replace_branch_with_leaf() {
        let mut tree = PathTree::new();
        tree.insert("a.b", json!("string")).unwrap();
        let err = tree.insert("a", json!("number")).unwrap_err();
        assert!(matches!(err, SchemaError::NestedConflict(ref p) if p == "a"));
    }

    #[test]
    fn test_redeclared_leaf_keeps_position() {
        let mut tree = PathTree::new();
        let first = tree.insert("a", json!("string")).unwrap();
        tree.insert("b", json!("string")).unwrap();
        let second = tree.insert("a", json!("number")).unwrap();

        assert_eq!(first, second);
        assert_eq!(tree.leaf_paths(), vec!["a", "b"]);
        assert_eq!(tree.get("a"), Some(&TreeNode::Leaf(json!("number"))));
    }
}
