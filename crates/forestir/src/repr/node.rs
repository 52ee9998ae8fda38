//! Tree node types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::NodeId;

/// Comparison operator used by a test node.
///
/// A test evaluates `feature_value <op> threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    /// `==`
    Eq,
    /// `<`
    #[default]
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Operator {
    /// Evaluate `value <op> threshold`.
    #[inline]
    pub fn compare(self, value: f64, threshold: f64) -> bool {
        match self {
            Operator::Eq => value == threshold,
            Operator::Lt => value < threshold,
            Operator::Le => value <= threshold,
            Operator::Gt => value > threshold,
            Operator::Ge => value >= threshold,
        }
    }

    /// Infix symbol for this operator.
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Eq => "==",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Error returned when parsing an [`Operator`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown comparison operator: {0:?}")]
pub struct ParseOperatorError(pub String);

impl FromStr for Operator {
    type Err = ParseOperatorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" | "eq" => Ok(Operator::Eq),
            "<" | "lt" => Ok(Operator::Lt),
            "<=" | "le" => Ok(Operator::Le),
            ">" | "gt" => Ok(Operator::Gt),
            ">=" | "ge" => Ok(Operator::Ge),
            other => Err(ParseOperatorError(other.to_string())),
        }
    }
}

/// Which child a test node selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    Left,
    Right,
}

/// Test condition of an internal node.
///
/// Branch convention: when the feature value is present and the comparison
/// holds, the left child is taken; otherwise the right child. A missing value
/// (NaN) follows `default_left`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Feature index to test.
    pub feature: u32,
    /// Threshold compared against.
    pub threshold: f64,
    /// Comparison operator.
    pub op: Operator,
    /// Direction for missing values (true = left).
    pub default_left: bool,
}

impl Split {
    pub fn new(feature: u32, op: Operator, threshold: f64, default_left: bool) -> Self {
        Self {
            feature,
            threshold,
            op,
            default_left,
        }
    }

    /// Decide the branch for a feature value. NaN counts as missing.
    #[inline]
    pub fn branch(&self, value: f64) -> Branch {
        let go_left = if value.is_nan() {
            self.default_left
        } else {
            self.op.compare(value, self.threshold)
        };
        if go_left {
            Branch::Left
        } else {
            Branch::Right
        }
    }

    /// The branch taken for a missing value.
    #[inline]
    pub fn default_branch(&self) -> Branch {
        if self.default_left {
            Branch::Left
        } else {
            Branch::Right
        }
    }
}

/// Role of a node in a finalized tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeKind {
    /// Terminal node carrying a leaf value.
    Leaf { value: f64 },
    /// Internal test node with two children.
    Test {
        split: Split,
        left: NodeId,
        right: NodeId,
    },
}

/// Snapshot of one node of a finalized tree.
///
/// Returned by value from [`Tree::node`](super::Tree::node).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
}

impl Node {
    /// Position of this node within its tree.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// True only for position 0.
    #[inline]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Leaf value, if this is a leaf.
    #[inline]
    pub fn leaf_value(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Leaf { value } => Some(value),
            NodeKind::Test { .. } => None,
        }
    }

    /// Test condition, if this is a test node.
    #[inline]
    pub fn split(&self) -> Option<&Split> {
        match &self.kind {
            NodeKind::Test { split, .. } => Some(split),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// `(left, right)` child positions, if this is a test node.
    #[inline]
    pub fn children(&self) -> Option<(NodeId, NodeId)> {
        match self.kind {
            NodeKind::Test { left, right, .. } => Some((left, right)),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Child selected when the tested feature is missing.
    #[inline]
    pub fn default_child(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::Test { split, left, right } => Some(match split.default_branch() {
                Branch::Left => left,
                Branch::Right => right,
            }),
            NodeKind::Leaf { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Operator::Eq, 0.5, true)]
    #[case(Operator::Eq, 0.4, false)]
    #[case(Operator::Lt, 0.4, true)]
    #[case(Operator::Lt, 0.5, false)]
    #[case(Operator::Le, 0.5, true)]
    #[case(Operator::Le, 0.6, false)]
    #[case(Operator::Gt, 0.6, true)]
    #[case(Operator::Gt, 0.5, false)]
    #[case(Operator::Ge, 0.5, true)]
    #[case(Operator::Ge, 0.4, false)]
    fn operator_compare(#[case] op: Operator, #[case] value: f64, #[case] expected: bool) {
        assert_eq!(op.compare(value, 0.5), expected);
    }

    #[test]
    fn operator_parse_and_display() {
        for op in [Operator::Eq, Operator::Lt, Operator::Le, Operator::Gt, Operator::Ge] {
            assert_eq!(op.symbol().parse::<Operator>(), Ok(op));
            assert_eq!(op.to_string(), op.symbol());
        }
        assert!("<>".parse::<Operator>().is_err());
    }

    #[test]
    fn split_true_goes_left() {
        let split = Split::new(0, Operator::Lt, 0.5, false);
        assert_eq!(split.branch(0.3), Branch::Left);
        assert_eq!(split.branch(0.7), Branch::Right);
        // == threshold fails `<`
        assert_eq!(split.branch(0.5), Branch::Right);
    }

    #[test]
    fn split_missing_uses_default() {
        let left = Split::new(0, Operator::Ge, 0.5, true);
        let right = Split::new(0, Operator::Ge, 0.5, false);
        assert_eq!(left.branch(f64::NAN), Branch::Left);
        assert_eq!(right.branch(f64::NAN), Branch::Right);
    }

    #[test]
    fn node_accessors() {
        let leaf = Node {
            id: 1,
            kind: NodeKind::Leaf { value: 1.5 },
            parent: Some(0),
        };
        assert!(leaf.is_leaf());
        assert!(!leaf.is_root());
        assert_eq!(leaf.leaf_value(), Some(1.5));
        assert_eq!(leaf.split(), None);
        assert_eq!(leaf.children(), None);

        let split = Split::new(2, Operator::Le, 0.25, false);
        let test = Node {
            id: 0,
            kind: NodeKind::Test {
                split,
                left: 1,
                right: 2,
            },
            parent: None,
        };
        assert!(test.is_root());
        assert_eq!(test.split(), Some(&split));
        assert_eq!(test.children(), Some((1, 2)));
        assert_eq!(test.default_child(), Some(2));
    }
}
