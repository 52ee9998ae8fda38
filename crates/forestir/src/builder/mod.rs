//! Incremental, key-addressed construction of tree ensembles.
//!
//! [`ModelBuilder`] stages trees whose nodes are identified by caller-chosen
//! integer keys. Nodes can be created, wired and assigned roles in any order;
//! test nodes may name children that do not exist yet. Nothing is checked
//! structurally until [`ModelBuilder::commit_model`], which validates every
//! staged tree and compacts them into a position-addressed [`Model`].
//!
//! # Example
//!
//! ```
//! use forestir::builder::{ModelBuilder, TreePosition};
//! use forestir::repr::{Operator, Split};
//!
//! let mut builder = ModelBuilder::new(1);
//! let tree = builder.create_tree(TreePosition::Append)?;
//! for key in [10, 11, 12] {
//!     builder.create_node(tree, key)?;
//! }
//! builder.set_root_node(tree, 10)?;
//! builder.set_test_node(tree, 10, Split::new(0, Operator::Lt, 0.5, true), 11, 12)?;
//! builder.set_leaf_node(tree, 11, -1.0)?;
//! builder.set_leaf_node(tree, 12, 1.0)?;
//!
//! let model = builder.commit_model()?;
//! assert_eq!(model.tree(0)?.n_nodes(), 3);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod commit;
mod error;
mod staging;

pub use error::{BuildError, ValidationError};
pub use staging::{NodeKey, StagedNode, StagedTree};

use crate::repr::{Model, NodeKind, Split};

/// Where [`ModelBuilder::create_tree`] places the new tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreePosition {
    /// After all existing trees.
    #[default]
    Append,
    /// At this index, shifting later trees back. `At(n_trees)` appends.
    At(usize),
}

impl From<usize> for TreePosition {
    fn from(index: usize) -> Self {
        TreePosition::At(index)
    }
}

/// Mutable staging area for an ensemble under construction.
///
/// The builder exclusively owns its staged state. Every mutation takes
/// `&mut self`; a failed operation leaves the state unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModelBuilder {
    num_features: u32,
    trees: Vec<StagedTree>,
}

impl ModelBuilder {
    /// Create an empty builder for models over `num_features` input features.
    pub fn new(num_features: u32) -> Self {
        Self {
            num_features,
            trees: Vec::new(),
        }
    }

    /// Stage the trees of an existing model, using node positions as keys.
    ///
    /// Committing the result reproduces `model`.
    pub fn from_model(model: &Model) -> Self {
        let trees = model
            .trees()
            .map(|tree| {
                let mut staged = StagedTree {
                    root: Some(0),
                    ..StagedTree::default()
                };
                for node in tree.nodes() {
                    let staged_node = match *node.kind() {
                        NodeKind::Leaf { value } => StagedNode::Leaf { value },
                        NodeKind::Test { split, left, right } => StagedNode::Test {
                            split,
                            left: left as NodeKey,
                            right: right as NodeKey,
                        },
                    };
                    staged.nodes.insert(node.id() as NodeKey, staged_node);
                }
                staged
            })
            .collect();

        Self {
            num_features: model.num_features(),
            trees,
        }
    }

    #[inline]
    pub fn num_features(&self) -> u32 {
        self.num_features
    }

    /// Number of staged trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Read-only view of a staged tree.
    pub fn tree(&self, tree: usize) -> Result<&StagedTree, BuildError> {
        self.trees.get(tree).ok_or(BuildError::TreeNotFound {
            tree,
            n_trees: self.trees.len(),
        })
    }

    fn tree_mut(&mut self, tree: usize) -> Result<&mut StagedTree, BuildError> {
        let n_trees = self.trees.len();
        self.trees
            .get_mut(tree)
            .ok_or(BuildError::TreeNotFound { tree, n_trees })
    }

    /// Look up a staged node.
    pub fn node(&self, tree: usize, key: NodeKey) -> Result<&StagedNode, BuildError> {
        self.tree(tree)?
            .node(key)
            .ok_or(BuildError::NodeNotFound { tree, key })
    }

    fn node_mut(&mut self, tree: usize, key: NodeKey) -> Result<&mut StagedNode, BuildError> {
        self.tree_mut(tree)?
            .nodes
            .get_mut(&key)
            .ok_or(BuildError::NodeNotFound { tree, key })
    }

    // =========================================================================
    // Trees
    // =========================================================================

    /// Insert a new empty tree. Returns its index.
    pub fn create_tree(&mut self, position: TreePosition) -> Result<usize, BuildError> {
        let index = match position {
            TreePosition::Append => self.trees.len(),
            TreePosition::At(index) if index <= self.trees.len() => index,
            TreePosition::At(index) => {
                return Err(BuildError::TreeNotFound {
                    tree: index,
                    n_trees: self.trees.len(),
                })
            }
        };
        self.trees.insert(index, StagedTree::default());
        Ok(index)
    }

    /// Remove a tree and all its staged nodes. Later trees shift forward.
    pub fn delete_tree(&mut self, tree: usize) -> Result<(), BuildError> {
        self.tree(tree)?;
        self.trees.remove(tree);
        Ok(())
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Create an empty node under `key`.
    pub fn create_node(&mut self, tree: usize, key: NodeKey) -> Result<(), BuildError> {
        let staged = self.tree_mut(tree)?;
        if staged.nodes.contains_key(&key) {
            return Err(BuildError::DuplicateKey { tree, key });
        }
        staged.nodes.insert(key, StagedNode::Empty);
        Ok(())
    }

    /// Remove a node that no other node names as a child.
    ///
    /// Deleting the designated root clears the designation.
    pub fn delete_node(&mut self, tree: usize, key: NodeKey) -> Result<(), BuildError> {
        let staged = self.tree_mut(tree)?;
        if !staged.nodes.contains_key(&key) {
            return Err(BuildError::NodeNotFound { tree, key });
        }
        if let Some(parent) = staged.referencing_parent(key) {
            return Err(BuildError::InUse { tree, key, parent });
        }
        staged.nodes.remove(&key);
        if staged.root == Some(key) {
            staged.root = None;
        }
        Ok(())
    }

    /// Designate `key` as the root, replacing any previous designation.
    pub fn set_root_node(&mut self, tree: usize, key: NodeKey) -> Result<(), BuildError> {
        let staged = self.tree_mut(tree)?;
        if !staged.nodes.contains_key(&key) {
            return Err(BuildError::NodeNotFound { tree, key });
        }
        staged.root = Some(key);
        Ok(())
    }

    /// Turn an empty node into a test node.
    ///
    /// `left` is taken when `value <op> threshold` holds, `right` otherwise.
    /// Neither child needs to exist yet.
    pub fn set_test_node(
        &mut self,
        tree: usize,
        key: NodeKey,
        split: Split,
        left: NodeKey,
        right: NodeKey,
    ) -> Result<(), BuildError> {
        let node = self.node_mut(tree, key)?;
        if !node.is_empty() {
            return Err(BuildError::AlreadyDefined { tree, key });
        }
        *node = StagedNode::Test { split, left, right };
        Ok(())
    }

    /// Turn an empty node into a leaf.
    ///
    /// A non-finite `value` is accepted here and rejected at commit.
    pub fn set_leaf_node(&mut self, tree: usize, key: NodeKey, value: f64) -> Result<(), BuildError> {
        let node = self.node_mut(tree, key)?;
        if !node.is_empty() {
            return Err(BuildError::AlreadyDefined { tree, key });
        }
        *node = StagedNode::Leaf { value };
        Ok(())
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Validate every staged tree and compact them into a new [`Model`].
    ///
    /// Fails with [`BuildError::ValidationFailed`] for the first invalid tree;
    /// no model is produced in that case. The staged state is never modified,
    /// so the builder can be repaired and committed again, and models issued
    /// earlier share no storage with it.
    pub fn commit_model(&self) -> Result<Model, BuildError> {
        let trees = self
            .trees
            .iter()
            .enumerate()
            .map(|(tree, staged)| {
                commit::compact(staged, self.num_features)
                    .map_err(|error| BuildError::ValidationFailed { tree, error })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Model::new_unchecked(self.num_features, trees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::Operator;

    fn lt(feature: u32, threshold: f64) -> Split {
        Split::new(feature, Operator::Lt, threshold, true)
    }

    #[test]
    fn create_tree_positions() {
        let mut b = ModelBuilder::new(1);
        assert_eq!(b.create_tree(TreePosition::Append), Ok(0));
        assert_eq!(b.create_tree(TreePosition::Append), Ok(1));
        b.create_node(1, 7).unwrap();

        // insert in front; the tree holding key 7 moves to index 2
        assert_eq!(b.create_tree(0usize.into()), Ok(0));
        assert!(b.tree(2).unwrap().contains(7));
        assert_eq!(b.create_tree(TreePosition::At(3)), Ok(3));
        assert_eq!(
            b.create_tree(TreePosition::At(9)),
            Err(BuildError::TreeNotFound {
                tree: 9,
                n_trees: 4
            })
        );
        assert_eq!(b.n_trees(), 4);
    }

    #[test]
    fn delete_tree_shifts_and_reports_missing() {
        let mut b = ModelBuilder::new(1);
        b.create_tree(TreePosition::Append).unwrap();
        b.create_tree(TreePosition::Append).unwrap();
        b.create_node(1, 3).unwrap();

        b.delete_tree(0).unwrap();
        assert_eq!(b.n_trees(), 1);
        assert!(b.tree(0).unwrap().contains(3));
        assert!(b.delete_tree(1).unwrap_err().is_not_found());
    }

    #[test]
    fn node_operations_require_existing_tree() {
        let mut b = ModelBuilder::new(1);
        let err = b.create_node(0, 1).unwrap_err();
        assert_eq!(err, BuildError::TreeNotFound { tree: 0, n_trees: 0 });
        assert!(b.set_root_node(0, 1).unwrap_err().is_not_found());
        assert!(b.set_leaf_node(0, 1, 0.0).unwrap_err().is_not_found());
    }

    #[test]
    fn roles_are_assigned_once() {
        let mut b = ModelBuilder::new(1);
        b.create_tree(TreePosition::Append).unwrap();
        b.create_node(0, 1).unwrap();
        b.set_leaf_node(0, 1, 2.0).unwrap();

        assert_eq!(
            b.set_leaf_node(0, 1, 3.0),
            Err(BuildError::AlreadyDefined { tree: 0, key: 1 })
        );
        assert_eq!(
            b.set_test_node(0, 1, lt(0, 0.5), 2, 3),
            Err(BuildError::AlreadyDefined { tree: 0, key: 1 })
        );
        assert_eq!(b.node(0, 1), Ok(&StagedNode::Leaf { value: 2.0 }));
        assert_eq!(
            b.set_leaf_node(0, 9, 0.0),
            Err(BuildError::NodeNotFound { tree: 0, key: 9 })
        );
    }

    #[test]
    fn delete_node_refuses_referenced_children() {
        let mut b = ModelBuilder::new(1);
        b.create_tree(TreePosition::Append).unwrap();
        for key in [1, 2, 3] {
            b.create_node(0, key).unwrap();
        }
        b.set_test_node(0, 1, lt(0, 0.5), 2, 3).unwrap();

        assert_eq!(
            b.delete_node(0, 3),
            Err(BuildError::InUse {
                tree: 0,
                key: 3,
                parent: 1
            })
        );
        assert!(b.tree(0).unwrap().contains(3));

        // the parent itself can go, after which the child is free
        b.delete_node(0, 1).unwrap();
        b.delete_node(0, 3).unwrap();
        assert_eq!(
            b.delete_node(0, 3),
            Err(BuildError::NodeNotFound { tree: 0, key: 3 })
        );
        assert_eq!(b.tree(0).unwrap().len(), 1);
    }

    #[test]
    fn delete_root_clears_designation() {
        let mut b = ModelBuilder::new(1);
        b.create_tree(TreePosition::Append).unwrap();
        b.create_node(0, 4).unwrap();
        b.set_root_node(0, 4).unwrap();
        b.delete_node(0, 4).unwrap();
        assert_eq!(b.tree(0).unwrap().root(), None);
    }

    #[test]
    fn set_root_replaces_previous() {
        let mut b = ModelBuilder::new(1);
        b.create_tree(TreePosition::Append).unwrap();
        b.create_node(0, 1).unwrap();
        b.create_node(0, 2).unwrap();
        b.set_root_node(0, 1).unwrap();
        b.set_root_node(0, 2).unwrap();
        assert_eq!(b.tree(0).unwrap().root(), Some(2));
        assert_eq!(
            b.set_root_node(0, 3),
            Err(BuildError::NodeNotFound { tree: 0, key: 3 })
        );
        assert_eq!(b.tree(0).unwrap().root(), Some(2));
    }

    #[test]
    fn forward_references_commit() {
        let mut b = ModelBuilder::new(2);
        b.create_tree(TreePosition::Append).unwrap();
        b.create_node(0, 100).unwrap();
        b.set_test_node(0, 100, lt(1, 2.5), 200, 300).unwrap();
        b.set_root_node(0, 100).unwrap();
        b.create_node(0, 300).unwrap();
        b.create_node(0, 200).unwrap();
        b.set_leaf_node(0, 300, 9.0).unwrap();
        b.set_leaf_node(0, 200, 8.0).unwrap();

        let model = b.commit_model().unwrap();
        let tree = model.tree(0).unwrap();
        assert_eq!(tree.children(0).unwrap(), Some((1, 2)));
        assert_eq!(tree.leaf_value(1).unwrap(), Some(8.0));
        assert_eq!(tree.leaf_value(2).unwrap(), Some(9.0));
    }

    #[test]
    fn empty_builder_commits_empty_model() {
        let model = ModelBuilder::new(3).commit_model().unwrap();
        assert!(model.is_empty());
        assert_eq!(model.num_features(), 3);
    }

    #[test]
    fn empty_tree_fails_commit() {
        let mut b = ModelBuilder::new(1);
        b.create_tree(TreePosition::Append).unwrap();
        assert_eq!(
            b.commit_model(),
            Err(BuildError::ValidationFailed {
                tree: 0,
                error: ValidationError::MissingRoot
            })
        );
    }
}
