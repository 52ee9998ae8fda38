//! Key-addressed staging graph for one tree under construction.

use std::collections::BTreeMap;

use crate::repr::Split;

/// Caller-chosen identifier of a staged node. Unrelated to its final position.
pub type NodeKey = i32;

/// A node in the staging graph.
#[derive(Debug, Clone, PartialEq)]
pub enum StagedNode {
    /// Created but not yet assigned a role.
    Empty,
    /// Test node referencing its children by key. The keys may be forward
    /// references to nodes that do not exist yet.
    Test {
        split: Split,
        left: NodeKey,
        right: NodeKey,
    },
    /// Leaf node.
    Leaf { value: f64 },
}

impl StagedNode {
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, StagedNode::Empty)
    }

    /// Child keys, if this is a test node.
    #[inline]
    pub fn children(&self) -> Option<(NodeKey, NodeKey)> {
        match *self {
            StagedNode::Test { left, right, .. } => Some((left, right)),
            _ => None,
        }
    }
}

/// Staged tree: nodes by key plus the designated root.
///
/// May be inconsistent at any point; structure is only checked on commit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StagedTree {
    pub(super) nodes: BTreeMap<NodeKey, StagedNode>,
    pub(super) root: Option<NodeKey>,
}

impl StagedTree {
    /// Designated root key, if any.
    #[inline]
    pub fn root(&self) -> Option<NodeKey> {
        self.root
    }

    #[inline]
    pub fn node(&self, key: NodeKey) -> Option<&StagedNode> {
        self.nodes.get(&key)
    }

    #[inline]
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(&key)
    }

    /// Number of staged nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Staged nodes in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeKey, &StagedNode)> {
        self.nodes.iter().map(|(&k, n)| (k, n))
    }

    /// Some other node naming `key` as a child, if one exists.
    pub(super) fn referencing_parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.iter().find_map(|(&parent, node)| match node.children() {
            Some((left, right)) if parent != key && (left == key || right == key) => Some(parent),
            _ => None,
        })
    }
}
