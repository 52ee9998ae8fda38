//! Canonical, position-addressed representation of tree ensembles.

/// Position of a node within its tree's dense arrays. Position 0 is the root.
pub type NodeId = u32;

pub mod model;
pub mod node;
pub mod tree;

pub use model::{Model, ModelValidationError, RawModel};
pub use node::{Branch, Node, NodeKind, Operator, ParseOperatorError, Split};
pub use tree::{BreadthFirst, RawTree, Tree, TreeStats, TreeValidationError};

pub(crate) use tree::TreeBuffer;

/// Lookup of a position outside a finalized model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("node position {position} is out of range for a tree of {n_nodes} nodes")]
    NodeOutOfRange { position: NodeId, n_nodes: usize },
    #[error("tree index {index} is out of range for a model of {n_trees} trees")]
    TreeOutOfRange { index: usize, n_trees: usize },
}
