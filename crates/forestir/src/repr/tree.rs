//! Canonical tree representation (SoA) and its read-only surface.
//!
//! This module provides:
//! - [`Tree`]: immutable SoA tree storage, position 0 is the root
//! - [`TreeValidationError`]: structural validation errors
//! - [`BreadthFirst`]: the traversal order used by compaction and the printer
//!
//! Trees are produced by [`ModelBuilder::commit_model`](crate::builder::ModelBuilder::commit_model)
//! or by deserializing a [`RawTree`], which is validated on the way in.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::node::{Branch, Node, NodeKind, Operator, Split};
use super::{AccessError, NodeId};

// ============================================================================
// TreeValidationError
// ============================================================================

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,
    #[error("array `{field}` has {len} entries, expected {expected}")]
    ArrayLenMismatch {
        field: &'static str,
        len: usize,
        expected: usize,
    },
    #[error("node {node} references {side} child {child} but tree has {n_nodes} nodes")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },
    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },
    #[error("node {node} is referenced by more than one parent")]
    DuplicateVisit { node: NodeId },
    #[error("root node has parent {parent}")]
    RootHasParent { parent: NodeId },
    #[error("parent link of node {node} does not point back to the node that references it")]
    ParentMismatch { node: NodeId },
    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
    #[error("node {node} sits at a position out of breadth-first order (expected position {expected})")]
    NotBreadthFirst { node: NodeId, expected: NodeId },
}

// ============================================================================
// RawTree (serialized form)
// ============================================================================

/// Serialized layout of a [`Tree`]: parallel arrays without parent links.
///
/// Parent links are derived when converting into a [`Tree`], which also runs
/// full structural validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTree {
    pub is_leaf: Vec<bool>,
    pub split_indices: Vec<u32>,
    pub thresholds: Vec<f64>,
    pub ops: Vec<Operator>,
    pub default_left: Vec<bool>,
    pub left_children: Vec<NodeId>,
    pub right_children: Vec<NodeId>,
    pub leaf_values: Vec<f64>,
}

impl TryFrom<RawTree> for Tree {
    type Error = TreeValidationError;

    fn try_from(raw: RawTree) -> Result<Self, Self::Error> {
        let n_nodes = raw.is_leaf.len();
        let lens = [
            ("split_indices", raw.split_indices.len()),
            ("thresholds", raw.thresholds.len()),
            ("ops", raw.ops.len()),
            ("default_left", raw.default_left.len()),
            ("left_children", raw.left_children.len()),
            ("right_children", raw.right_children.len()),
            ("leaf_values", raw.leaf_values.len()),
        ];
        for (field, len) in lens {
            if len != n_nodes {
                return Err(TreeValidationError::ArrayLenMismatch {
                    field,
                    len,
                    expected: n_nodes,
                });
            }
        }

        // Parents are derived from child links; `validate` rejects any
        // inconsistency (out-of-bounds, shared children, orphans).
        let mut parents = vec![None; n_nodes];
        for node in 0..n_nodes {
            if raw.is_leaf[node] {
                continue;
            }
            for child in [raw.left_children[node], raw.right_children[node]] {
                if let Some(slot) = parents.get_mut(child as usize) {
                    if slot.is_some() {
                        return Err(TreeValidationError::DuplicateVisit { node: child });
                    }
                    *slot = Some(node as NodeId);
                }
            }
        }

        let tree = Tree {
            is_leaf: raw.is_leaf.into_boxed_slice(),
            split_indices: raw.split_indices.into_boxed_slice(),
            thresholds: raw.thresholds.into_boxed_slice(),
            ops: raw.ops.into_boxed_slice(),
            default_left: raw.default_left.into_boxed_slice(),
            left_children: raw.left_children.into_boxed_slice(),
            right_children: raw.right_children.into_boxed_slice(),
            leaf_values: raw.leaf_values.into_boxed_slice(),
            parents: parents.into_boxed_slice(),
        };
        tree.validate()?;
        Ok(tree)
    }
}

impl From<Tree> for RawTree {
    fn from(tree: Tree) -> Self {
        Self {
            is_leaf: tree.is_leaf.into_vec(),
            split_indices: tree.split_indices.into_vec(),
            thresholds: tree.thresholds.into_vec(),
            ops: tree.ops.into_vec(),
            default_left: tree.default_left.into_vec(),
            left_children: tree.left_children.into_vec(),
            right_children: tree.right_children.into_vec(),
            leaf_values: tree.leaf_values.into_vec(),
        }
    }
}

// ============================================================================
// Tree
// ============================================================================

/// Structure-of-Arrays tree storage.
///
/// Child indices are local to this tree (0 = root). Fields of the unused role
/// hold defaults: test fields of a leaf are zero, the leaf value of a test node
/// is zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTree", into = "RawTree")]
pub struct Tree {
    is_leaf: Box<[bool]>,
    split_indices: Box<[u32]>,
    thresholds: Box<[f64]>,
    ops: Box<[Operator]>,
    default_left: Box<[bool]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    leaf_values: Box<[f64]>,
    parents: Box<[Option<NodeId>]>,
}

/// Node, leaf and depth counts of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub n_nodes: usize,
    pub n_leaves: usize,
    /// Number of edges on the longest root-to-leaf path.
    pub depth: usize,
}

impl Tree {
    /// Number of nodes in the tree.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    #[inline]
    fn check(&self, node: NodeId) -> Result<usize, AccessError> {
        let idx = node as usize;
        if idx < self.n_nodes() {
            Ok(idx)
        } else {
            Err(AccessError::NodeOutOfRange {
                position: node,
                n_nodes: self.n_nodes(),
            })
        }
    }

    /// Snapshot of the node at `node`.
    pub fn node(&self, node: NodeId) -> Result<Node, AccessError> {
        let idx = self.check(node)?;
        let kind = if self.is_leaf[idx] {
            NodeKind::Leaf {
                value: self.leaf_values[idx],
            }
        } else {
            NodeKind::Test {
                split: self.split_at(idx),
                left: self.left_children[idx],
                right: self.right_children[idx],
            }
        };
        Ok(Node {
            id: node,
            kind,
            parent: self.parents[idx],
        })
    }

    #[inline]
    pub fn is_leaf(&self, node: NodeId) -> Result<bool, AccessError> {
        Ok(self.is_leaf[self.check(node)?])
    }

    #[inline]
    pub fn is_root(&self, node: NodeId) -> Result<bool, AccessError> {
        Ok(self.parents[self.check(node)?].is_none())
    }

    /// Parent position, `None` for the root.
    #[inline]
    pub fn parent(&self, node: NodeId) -> Result<Option<NodeId>, AccessError> {
        Ok(self.parents[self.check(node)?])
    }

    /// `(left, right)` child positions, `None` for leaves.
    #[inline]
    pub fn children(&self, node: NodeId) -> Result<Option<(NodeId, NodeId)>, AccessError> {
        let idx = self.check(node)?;
        Ok((!self.is_leaf[idx]).then(|| (self.left_children[idx], self.right_children[idx])))
    }

    #[inline]
    pub fn leaf_value(&self, node: NodeId) -> Result<Option<f64>, AccessError> {
        let idx = self.check(node)?;
        Ok(self.is_leaf[idx].then(|| self.leaf_values[idx]))
    }

    #[inline]
    pub fn split(&self, node: NodeId) -> Result<Option<Split>, AccessError> {
        let idx = self.check(node)?;
        Ok((!self.is_leaf[idx]).then(|| self.split_at(idx)))
    }

    #[inline]
    fn split_at(&self, idx: usize) -> Split {
        Split {
            feature: self.split_indices[idx],
            threshold: self.thresholds[idx],
            op: self.ops[idx],
            default_left: self.default_left[idx],
        }
    }

    /// All nodes in position order.
    pub fn nodes(&self) -> impl Iterator<Item = Node> + '_ {
        (0..self.n_nodes() as NodeId).filter_map(|id| self.node(id).ok())
    }

    /// Breadth-first traversal from the root.
    pub fn bfs(&self) -> BreadthFirst<'_> {
        BreadthFirst::new(self)
    }

    /// Largest feature index tested by any node, if the tree has tests.
    pub fn max_feature(&self) -> Option<u32> {
        (0..self.n_nodes())
            .filter(|&idx| !self.is_leaf[idx])
            .map(|idx| self.split_indices[idx])
            .max()
    }

    /// Node count, leaf count and depth.
    pub fn stats(&self) -> TreeStats {
        let mut depths = vec![0usize; self.n_nodes()];
        let mut n_leaves = 0;
        let mut depth = 0;
        for node in self.bfs() {
            let idx = node.id() as usize;
            match node.children() {
                Some((left, right)) => {
                    depths[left as usize] = depths[idx] + 1;
                    depths[right as usize] = depths[idx] + 1;
                }
                None => {
                    n_leaves += 1;
                    depth = depth.max(depths[idx]);
                }
            }
        }
        TreeStats {
            n_nodes: self.n_nodes(),
            n_leaves,
            depth,
        }
    }

    /// Follow test nodes from the root and return the leaf position reached.
    ///
    /// NaN and feature indices beyond `features.len()` count as missing.
    pub fn traverse_to_leaf(&self, features: &[f64]) -> NodeId {
        let mut idx = 0usize;
        while !self.is_leaf[idx] {
            let split = self.split_at(idx);
            let fvalue = features
                .get(split.feature as usize)
                .copied()
                .unwrap_or(f64::NAN);
            idx = match split.branch(fvalue) {
                Branch::Left => self.left_children[idx],
                Branch::Right => self.right_children[idx],
            } as usize;
        }
        idx as NodeId
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Validate structural invariants: non-empty, children in bounds, no
    /// self-loops, every node reached exactly once from the root, parent
    /// links mirroring child links, and positions in breadth-first order.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }
        if let Some(parent) = self.parents[0] {
            return Err(TreeValidationError::RootHasParent { parent });
        }

        let mut seen = vec![false; n_nodes];
        seen[0] = true;
        let mut queue = VecDeque::from([0usize]);
        // positions must be handed out in discovery order, left before right
        let mut next = 1usize;

        while let Some(idx) = queue.pop_front() {
            if self.is_leaf[idx] {
                continue;
            }
            let node = idx as NodeId;
            for (side, child) in [
                ("left", self.left_children[idx]),
                ("right", self.right_children[idx]),
            ] {
                if child == node {
                    return Err(TreeValidationError::SelfLoop { node });
                }
                let child_idx = child as usize;
                if child_idx >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
                if seen[child_idx] {
                    return Err(TreeValidationError::DuplicateVisit { node: child });
                }
                if self.parents[child_idx] != Some(node) {
                    return Err(TreeValidationError::ParentMismatch { node: child });
                }
                if child_idx != next {
                    return Err(TreeValidationError::NotBreadthFirst {
                        node: child,
                        expected: next as NodeId,
                    });
                }
                next += 1;
                seen[child_idx] = true;
                queue.push_back(child_idx);
            }
        }

        if let Some(node) = seen.iter().position(|&s| !s) {
            return Err(TreeValidationError::UnreachableNode {
                node: node as NodeId,
            });
        }
        Ok(())
    }
}

// ============================================================================
// TreeBuffer (in-crate construction)
// ============================================================================

/// Append-only buffer used by compaction to emit nodes in position order.
#[derive(Debug, Default)]
pub(crate) struct TreeBuffer {
    is_leaf: Vec<bool>,
    split_indices: Vec<u32>,
    thresholds: Vec<f64>,
    ops: Vec<Operator>,
    default_left: Vec<bool>,
    left_children: Vec<NodeId>,
    right_children: Vec<NodeId>,
    leaf_values: Vec<f64>,
    parents: Vec<Option<NodeId>>,
}

impl TreeBuffer {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            is_leaf: Vec::with_capacity(capacity),
            split_indices: Vec::with_capacity(capacity),
            thresholds: Vec::with_capacity(capacity),
            ops: Vec::with_capacity(capacity),
            default_left: Vec::with_capacity(capacity),
            left_children: Vec::with_capacity(capacity),
            right_children: Vec::with_capacity(capacity),
            leaf_values: Vec::with_capacity(capacity),
            parents: Vec::with_capacity(capacity),
        }
    }

    /// Append a test node. Returns its position.
    pub(crate) fn push_test(
        &mut self,
        split: Split,
        left: NodeId,
        right: NodeId,
        parent: Option<NodeId>,
    ) -> NodeId {
        let idx = self.is_leaf.len() as NodeId;
        self.is_leaf.push(false);
        self.split_indices.push(split.feature);
        self.thresholds.push(split.threshold);
        self.ops.push(split.op);
        self.default_left.push(split.default_left);
        self.left_children.push(left);
        self.right_children.push(right);
        self.leaf_values.push(0.0);
        self.parents.push(parent);
        idx
    }

    /// Append a leaf node. Returns its position.
    pub(crate) fn push_leaf(&mut self, value: f64, parent: Option<NodeId>) -> NodeId {
        let idx = self.is_leaf.len() as NodeId;
        self.is_leaf.push(true);
        self.split_indices.push(0);
        self.thresholds.push(0.0);
        self.ops.push(Operator::default());
        self.default_left.push(false);
        self.left_children.push(0);
        self.right_children.push(0);
        self.leaf_values.push(value);
        self.parents.push(parent);
        idx
    }

    /// Freeze into a [`Tree`]. Callers guarantee the structure is valid.
    pub(crate) fn finish(self) -> Tree {
        let tree = Tree {
            is_leaf: self.is_leaf.into_boxed_slice(),
            split_indices: self.split_indices.into_boxed_slice(),
            thresholds: self.thresholds.into_boxed_slice(),
            ops: self.ops.into_boxed_slice(),
            default_left: self.default_left.into_boxed_slice(),
            left_children: self.left_children.into_boxed_slice(),
            right_children: self.right_children.into_boxed_slice(),
            leaf_values: self.leaf_values.into_boxed_slice(),
            parents: self.parents.into_boxed_slice(),
        };
        debug_assert_eq!(tree.validate(), Ok(()));
        tree
    }
}

// ============================================================================
// BreadthFirst
// ============================================================================

/// Breadth-first iterator over the nodes of a [`Tree`], left child first.
///
/// Every valid tree stores its nodes in this order, so it yields positions
/// `0, 1, 2, ...`.
#[derive(Debug, Clone)]
pub struct BreadthFirst<'a> {
    tree: &'a Tree,
    queue: VecDeque<NodeId>,
}

impl<'a> BreadthFirst<'a> {
    fn new(tree: &'a Tree) -> Self {
        let mut queue = VecDeque::new();
        if tree.n_nodes() > 0 {
            queue.push_back(0);
        }
        Self { tree, queue }
    }
}

impl Iterator for BreadthFirst<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Node> {
        let id = self.queue.pop_front()?;
        let node = self.tree.node(id).ok()?;
        if let Some((left, right)) = node.children() {
            self.queue.push_back(left);
            self.queue.push_back(right);
        }
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ```text
    ///        [0] f0 < 0.5
    ///        /          \
    ///    [1] 1.0     [2] f1 <= 0.3 (default right)
    ///                 /         \
    ///             [3] 2.0     [4] 3.0
    /// ```
    fn build_test_tree() -> Tree {
        let mut buf = TreeBuffer::default();
        buf.push_test(Split::new(0, Operator::Lt, 0.5, true), 1, 2, None);
        buf.push_leaf(1.0, Some(0));
        buf.push_test(Split::new(1, Operator::Le, 0.3, false), 3, 4, Some(0));
        buf.push_leaf(2.0, Some(2));
        buf.push_leaf(3.0, Some(2));
        buf.finish()
    }

    fn raw_stump() -> RawTree {
        RawTree {
            is_leaf: vec![false, true, true],
            split_indices: vec![0, 0, 0],
            thresholds: vec![0.5, 0.0, 0.0],
            ops: vec![Operator::Lt; 3],
            default_left: vec![true, false, false],
            left_children: vec![1, 0, 0],
            right_children: vec![2, 0, 0],
            leaf_values: vec![0.0, -1.0, 1.0],
        }
    }

    #[test]
    fn tree_structure() {
        let tree = build_test_tree();
        assert_eq!(tree.n_nodes(), 5);

        let root = tree.node(0).unwrap();
        assert!(root.is_root());
        assert_eq!(root.children(), Some((1, 2)));
        assert_eq!(root.split().unwrap().feature, 0);

        assert_eq!(tree.leaf_value(1).unwrap(), Some(1.0));
        assert_eq!(tree.parent(3).unwrap(), Some(2));
        assert_eq!(tree.split(2).unwrap().unwrap().op, Operator::Le);
        assert_eq!(tree.children(4).unwrap(), None);
        assert!(!tree.is_root(4).unwrap());
    }

    #[test]
    fn out_of_range_positions() {
        let tree = build_test_tree();
        let err = tree.node(5).unwrap_err();
        assert_eq!(
            err,
            AccessError::NodeOutOfRange {
                position: 5,
                n_nodes: 5
            }
        );
        assert!(tree.parent(99).is_err());
        assert!(tree.leaf_value(5).is_err());
    }

    #[test]
    fn traverse_follows_branch_convention() {
        let tree = build_test_tree();
        assert_eq!(tree.traverse_to_leaf(&[0.3, 0.0]), 1);
        assert_eq!(tree.traverse_to_leaf(&[0.7, 0.3]), 3);
        assert_eq!(tree.traverse_to_leaf(&[0.7, 0.5]), 4);
        assert_eq!(tree.traverse_to_leaf(&[f64::NAN, 0.5]), 1);
        // feature 1 missing -> default right
        assert_eq!(tree.traverse_to_leaf(&[0.7]), 4);
    }

    #[test]
    fn bfs_visits_positions_in_order() {
        let tree = build_test_tree();
        let order: Vec<_> = tree.bfs().map(|n| n.id()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn stats_counts_leaves_and_depth() {
        let stats = build_test_tree().stats();
        assert_eq!(
            stats,
            TreeStats {
                n_nodes: 5,
                n_leaves: 3,
                depth: 2
            }
        );
    }

    #[test]
    fn raw_roundtrip_derives_parents() {
        let tree = Tree::try_from(raw_stump()).unwrap();
        assert_eq!(tree.parent(0).unwrap(), None);
        assert_eq!(tree.parent(1).unwrap(), Some(0));
        assert_eq!(tree.parent(2).unwrap(), Some(0));
        assert_eq!(RawTree::from(tree), raw_stump());
    }

    #[test]
    fn raw_rejects_length_mismatch() {
        let mut raw = raw_stump();
        raw.leaf_values.pop();
        assert_eq!(
            Tree::try_from(raw).unwrap_err(),
            TreeValidationError::ArrayLenMismatch {
                field: "leaf_values",
                len: 2,
                expected: 3
            }
        );
    }

    #[test]
    fn raw_rejects_shared_child() {
        let mut raw = raw_stump();
        raw.right_children[0] = 1;
        assert_eq!(
            Tree::try_from(raw).unwrap_err(),
            TreeValidationError::DuplicateVisit { node: 1 }
        );
    }

    #[test]
    fn raw_rejects_self_loop_and_bounds() {
        let mut raw = raw_stump();
        raw.left_children[0] = 0;
        assert_eq!(
            Tree::try_from(raw).unwrap_err(),
            TreeValidationError::RootHasParent { parent: 0 }
        );

        let mut raw = raw_stump();
        raw.right_children[0] = 7;
        assert!(matches!(
            Tree::try_from(raw).unwrap_err(),
            TreeValidationError::ChildOutOfBounds { child: 7, .. }
        ));
    }

    #[test]
    fn raw_rejects_unreachable_and_empty() {
        let mut raw = raw_stump();
        raw.is_leaf[0] = true;
        assert_eq!(
            Tree::try_from(raw).unwrap_err(),
            TreeValidationError::UnreachableNode { node: 1 }
        );

        let empty = RawTree {
            is_leaf: vec![],
            split_indices: vec![],
            thresholds: vec![],
            ops: vec![],
            default_left: vec![],
            left_children: vec![],
            right_children: vec![],
            leaf_values: vec![],
        };
        assert_eq!(Tree::try_from(empty).unwrap_err(), TreeValidationError::EmptyTree);
    }

    #[test]
    fn raw_rejects_positions_out_of_bfs_order() {
        let mut raw = raw_stump();
        raw.left_children[0] = 2;
        raw.right_children[0] = 1;
        assert_eq!(
            Tree::try_from(raw).unwrap_err(),
            TreeValidationError::NotBreadthFirst { node: 2, expected: 1 }
        );

        // depth-first numbering of a valid shape
        let raw = RawTree {
            is_leaf: vec![false, false, true, true, true],
            split_indices: vec![0; 5],
            thresholds: vec![0.5, 0.3, 0.0, 0.0, 0.0],
            ops: vec![Operator::Lt; 5],
            default_left: vec![false; 5],
            left_children: vec![1, 2, 0, 0, 0],
            right_children: vec![4, 3, 0, 0, 0],
            leaf_values: vec![0.0, 0.0, 1.0, 2.0, 3.0],
        };
        assert_eq!(
            Tree::try_from(raw).unwrap_err(),
            TreeValidationError::NotBreadthFirst { node: 4, expected: 2 }
        );
    }

    #[test]
    fn serde_json_roundtrip() {
        let tree = build_test_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let back: Tree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
