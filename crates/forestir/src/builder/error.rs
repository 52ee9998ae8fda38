//! Error types for the incremental builder.

use super::staging::NodeKey;

/// Failure of a builder operation.
///
/// Every failing operation leaves the staged state exactly as it was.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("tree {tree} not found (builder has {n_trees} trees)")]
    TreeNotFound { tree: usize, n_trees: usize },
    #[error("node key {key} not found in tree {tree}")]
    NodeNotFound { tree: usize, key: NodeKey },
    #[error("node key {key} is already in use in tree {tree}")]
    DuplicateKey { tree: usize, key: NodeKey },
    #[error("node {key} in tree {tree} already has a role")]
    AlreadyDefined { tree: usize, key: NodeKey },
    #[error("node {key} in tree {tree} is referenced as a child by node {parent}")]
    InUse {
        tree: usize,
        key: NodeKey,
        parent: NodeKey,
    },
    #[error("tree {tree} failed validation: {error}")]
    ValidationFailed {
        tree: usize,
        #[source]
        error: ValidationError,
    },
}

impl BuildError {
    /// True for the not-found family (`TreeNotFound`, `NodeNotFound`).
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BuildError::TreeNotFound { .. } | BuildError::NodeNotFound { .. }
        )
    }
}

/// Commit-time structural violation in one staged tree.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("no root designated")]
    MissingRoot,
    #[error("dangling child reference: node {parent} names {side} child {child}, which does not exist")]
    DanglingChild {
        parent: NodeKey,
        side: &'static str,
        child: NodeKey,
    },
    #[error("node {key} is reachable but has no role")]
    UndefinedNode { key: NodeKey },
    #[error("node {key} references itself as a child")]
    SelfLoop { key: NodeKey },
    #[error("node {key} is reached more than once (cycle or shared child)")]
    RevisitedNode { key: NodeKey },
    #[error("node {key} is not reachable from the root")]
    Orphan { key: NodeKey },
    #[error("node {key} tests feature {feature} but the builder has {num_features} features")]
    FeatureOutOfRange {
        key: NodeKey,
        feature: u32,
        num_features: u32,
    },
    #[error("node {key} has a non-finite {field}")]
    NonFinite { key: NodeKey, field: &'static str },
}
