//! Commit-time validation and compaction of staged trees.
//!
//! A staged tree is walked breadth-first from its root. Positions are handed
//! out as children are discovered (left before right), so the dequeue order
//! equals position order and nodes can be appended to the output directly.

use std::collections::{HashMap, VecDeque};

use crate::repr::{NodeId, Tree, TreeBuffer};

use super::error::ValidationError;
use super::staging::{NodeKey, StagedNode, StagedTree};

/// Validate `staged` and compact it into a position-addressed [`Tree`].
pub(super) fn compact(staged: &StagedTree, num_features: u32) -> Result<Tree, ValidationError> {
    let root = staged
        .root
        .filter(|root| staged.nodes.contains_key(root))
        .ok_or(ValidationError::MissingRoot)?;

    let n_nodes = staged.nodes.len();
    let mut positions: HashMap<NodeKey, NodeId> = HashMap::with_capacity(n_nodes);
    let mut queue: VecDeque<(NodeKey, Option<NodeId>)> = VecDeque::with_capacity(n_nodes);
    let mut out = TreeBuffer::with_capacity(n_nodes);

    positions.insert(root, 0);
    queue.push_back((root, None));
    let mut next: NodeId = 1;

    while let Some((key, parent)) = queue.pop_front() {
        // Only existing keys are ever enqueued.
        match staged.nodes[&key] {
            StagedNode::Empty => return Err(ValidationError::UndefinedNode { key }),
            StagedNode::Leaf { value } => {
                if !value.is_finite() {
                    return Err(ValidationError::NonFinite { key, field: "leaf value" });
                }
                out.push_leaf(value, parent);
            }
            StagedNode::Test { split, left, right } => {
                if split.feature >= num_features {
                    return Err(ValidationError::FeatureOutOfRange {
                        key,
                        feature: split.feature,
                        num_features,
                    });
                }
                if !split.threshold.is_finite() {
                    return Err(ValidationError::NonFinite { key, field: "threshold" });
                }

                let mut child_pos = [0; 2];
                let sides = [("left", left), ("right", right)];
                for (slot, (side, child)) in sides.into_iter().enumerate() {
                    if child == key {
                        return Err(ValidationError::SelfLoop { key });
                    }
                    if !staged.nodes.contains_key(&child) {
                        return Err(ValidationError::DanglingChild {
                            parent: key,
                            side,
                            child,
                        });
                    }
                    if positions.contains_key(&child) {
                        return Err(ValidationError::RevisitedNode { key: child });
                    }
                    positions.insert(child, next);
                    child_pos[slot] = next;
                    next += 1;
                }

                let pos = out.push_test(split, child_pos[0], child_pos[1], parent);
                debug_assert_eq!(Some(&pos), positions.get(&key));
                queue.push_back((left, Some(pos)));
                queue.push_back((right, Some(pos)));
            }
        }
    }

    if positions.len() != n_nodes {
        if let Some(&key) = staged.nodes.keys().find(|k| !positions.contains_key(k)) {
            return Err(ValidationError::Orphan { key });
        }
    }

    Ok(out.finish())
}
