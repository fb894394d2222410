//! Tree nodes for materialized result sets.
//!
//! Parents own their children; there are no back-pointers. Navigation is by
//! index path from the root, which keeps the tree trivially safe to mutate
//! from its owning task.

use bridge_traits::site::Record;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stable identity of a node, used for diffing across refreshes.
///
/// Leaves are identified by their remote record id, intermediate grouping
/// nodes by the field value they represent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    /// Leaf node: remote record id
    Leaf(i64),
    /// Intermediate grouping node: the grouped field value
    Group(String),
}

/// One entry in a materialized tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Display text
    pub text: String,
    /// Remote record snapshot; `None` for intermediate nodes
    pub record: Option<Record>,
    /// Local thumbnail path, patched in asynchronously
    pub icon: Option<PathBuf>,
    /// Lower-cased text used by UI search filters
    pub search_text: String,
    /// Stable identity for diffing
    pub key: NodeKey,
    /// Owned children, sorted by display text
    pub children: Vec<Node>,
}

impl Node {
    /// The invisible root every tree hangs off.
    pub fn root() -> Self {
        Self {
            text: String::new(),
            record: None,
            icon: None,
            search_text: String::new(),
            key: NodeKey::Group(String::new()),
            children: Vec::new(),
        }
    }

    /// An intermediate grouping node for one field value.
    pub fn group(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            search_text: text.to_lowercase(),
            key: NodeKey::Group(text.clone()),
            record: None,
            icon: None,
            children: Vec::new(),
            text,
        }
    }

    /// A leaf node carrying a record snapshot.
    ///
    /// The search string folds in the fields users actually filter on: the
    /// display text plus type and task names.
    pub fn leaf(text: impl Into<String>, record: Record) -> Self {
        let text = text.into();
        let mut search_text = text.to_lowercase();
        if let Some(name) = record.publish_type.as_ref().and_then(|t| t.name.as_deref()) {
            search_text.push(' ');
            search_text.push_str(&name.to_lowercase());
        }
        if let Some(name) = record.task.as_ref().and_then(|t| t.name.as_deref()) {
            search_text.push(' ');
            search_text.push_str(&name.to_lowercase());
        }
        Self {
            search_text,
            key: NodeKey::Leaf(record.id),
            record: Some(record),
            icon: None,
            children: Vec::new(),
            text,
        }
    }

    /// Whether this node is a leaf (carries a record snapshot).
    pub fn is_leaf(&self) -> bool {
        self.record.is_some()
    }

    /// Collect the record ids of every leaf under this node.
    pub fn leaf_ids(&self) -> Vec<i64> {
        let mut ids = Vec::new();
        let mut stack: Vec<&Node> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            if let Some(record) = &node.record {
                ids.push(record.id);
            }
            stack.extend(node.children.iter());
        }
        ids
    }

    /// Find a leaf by record id anywhere under this node.
    pub fn find_leaf(&self, record_id: i64) -> Option<&Node> {
        let mut stack: Vec<&Node> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            if node.key == NodeKey::Leaf(record_id) {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }

    /// Mutable variant of [`find_leaf`](Self::find_leaf).
    pub fn find_leaf_mut(&mut self, record_id: i64) -> Option<&mut Node> {
        let mut stack: Vec<&mut Node> = self.children.iter_mut().collect();
        while let Some(node) = stack.pop() {
            if node.key == NodeKey::Leaf(record_id) {
                return Some(node);
            }
            stack.extend(node.children.iter_mut());
        }
        None
    }

    /// Total number of leaves under this node.
    pub fn leaf_count(&self) -> usize {
        self.leaf_ids().len()
    }
}

/// Resolve an index path from `root` to a node, mutably.
///
/// Panics on an out-of-range path; paths are only ever produced by the
/// traversals in this crate.
pub(crate) fn node_at_path_mut<'a>(root: &'a mut Node, path: &[usize]) -> &'a mut Node {
    let mut node = root;
    for &index in path {
        node = &mut node.children[index];
    }
    node
}
