//! Testing utilities for forestir.
//!
//! Fixtures and assertion helpers shared by unit tests and integration tests.
//!
//! ```ignore
//! use forestir::testing::{assert_models_approx_eq, scenario_a_builder};
//! ```

use approx::AbsDiffEq;

use crate::builder::{BuildError, ModelBuilder, TreePosition};
use crate::repr::{Model, NodeId, Operator, Split, Tree};

// =============================================================================
// Constants
// =============================================================================

/// Default tolerance for threshold and leaf value comparisons.
pub const DEFAULT_TOLERANCE: f64 = 1e-9;

// =============================================================================
// Fixtures
// =============================================================================

/// Builder holding one staged stump over one feature.
///
/// Keys 10 (root test `f0 < 0.5`, missing goes left), 11 (leaf -1.0) and
/// 12 (leaf 1.0). Committing yields positions 0, 1, 2.
pub fn scenario_a_builder() -> Result<ModelBuilder, BuildError> {
    let mut builder = ModelBuilder::new(1);
    let tree = builder.create_tree(TreePosition::Append)?;
    for key in [10, 11, 12] {
        builder.create_node(tree, key)?;
    }
    builder.set_root_node(tree, 10)?;
    builder.set_test_node(tree, 10, Split::new(0, Operator::Lt, 0.5, true), 11, 12)?;
    builder.set_leaf_node(tree, 11, -1.0)?;
    builder.set_leaf_node(tree, 12, 1.0)?;
    Ok(builder)
}

/// Builder with a single tree consisting of one leaf.
pub fn constant_builder(num_features: u32, value: f64) -> Result<ModelBuilder, BuildError> {
    let mut builder = ModelBuilder::new(num_features);
    let tree = builder.create_tree(TreePosition::Append)?;
    builder.create_node(tree, 0)?;
    builder.set_leaf_node(tree, 0, value)?;
    builder.set_root_node(tree, 0)?;
    Ok(builder)
}

// =============================================================================
// Approximate comparison
// =============================================================================

impl AbsDiffEq for Split {
    type Epsilon = f64;

    fn default_epsilon() -> f64 {
        DEFAULT_TOLERANCE
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f64) -> bool {
        self.feature == other.feature
            && self.op == other.op
            && self.default_left == other.default_left
            && self.threshold.abs_diff_eq(&other.threshold, epsilon)
    }
}

/// First position where two trees differ, with a description.
fn first_difference(actual: &Tree, expected: &Tree, epsilon: f64) -> Option<(NodeId, String)> {
    if actual.n_nodes() != expected.n_nodes() {
        return Some((
            0,
            format!("node count {} != {}", actual.n_nodes(), expected.n_nodes()),
        ));
    }
    for (a, e) in actual.nodes().zip(expected.nodes()) {
        let same = a.parent() == e.parent()
            && a.children() == e.children()
            && match (a.split(), e.split()) {
                (Some(sa), Some(se)) => sa.abs_diff_eq(se, epsilon),
                (None, None) => match (a.leaf_value(), e.leaf_value()) {
                    (Some(va), Some(ve)) => va.abs_diff_eq(&ve, epsilon),
                    _ => false,
                },
                _ => false,
            };
        if !same {
            return Some((a.id(), format!("- {e:?}\n+ {a:?}")));
        }
    }
    None
}

/// Assert that two trees have the same shape and approximately equal values.
///
/// # Panics
///
/// Panics at the first differing position, showing expected (`-`) and actual (`+`).
pub fn assert_trees_approx_eq(actual: &Tree, expected: &Tree, epsilon: f64, context: &str) {
    if let Some((pos, diff)) = first_difference(actual, expected, epsilon) {
        panic!("{context}: trees differ at position {pos} (epsilon {epsilon:.0e})\n{diff}");
    }
}

/// Assert that two models agree tree by tree within [`DEFAULT_TOLERANCE`].
pub fn assert_models_approx_eq(actual: &Model, expected: &Model, context: &str) {
    assert_eq!(
        actual.num_features(),
        expected.num_features(),
        "{context}: num_features mismatch"
    );
    assert_eq!(
        actual.n_trees(),
        expected.n_trees(),
        "{context}: tree count mismatch"
    );
    for (idx, (a, e)) in actual.trees().zip(expected.trees()).enumerate() {
        assert_trees_approx_eq(a, e, DEFAULT_TOLERANCE, &format!("{context}: tree {idx}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stump(threshold: f64, right_value: f64) -> Model {
        let mut builder = ModelBuilder::new(1);
        let t = builder.create_tree(TreePosition::Append).unwrap();
        for key in 0..3 {
            builder.create_node(t, key).unwrap();
        }
        builder
            .set_test_node(t, 0, Split::new(0, Operator::Lt, threshold, true), 1, 2)
            .unwrap();
        builder.set_leaf_node(t, 1, -1.0).unwrap();
        builder.set_leaf_node(t, 2, right_value).unwrap();
        builder.set_root_node(t, 0).unwrap();
        builder.commit_model().unwrap()
    }

    #[test]
    fn fixtures_commit() {
        let model = scenario_a_builder().unwrap().commit_model().unwrap();
        assert_eq!(model.tree(0).unwrap().n_nodes(), 3);

        let constant = constant_builder(4, 2.5).unwrap().commit_model().unwrap();
        assert_eq!(constant.num_features(), 4);
        assert_eq!(constant.tree(0).unwrap().leaf_value(0).unwrap(), Some(2.5));
    }

    #[test]
    fn tolerates_small_threshold_drift() {
        let expected = scenario_a_builder().unwrap().commit_model().unwrap();
        let actual = stump(0.5 + 1e-12, 1.0);
        assert_ne!(actual, expected);
        assert_models_approx_eq(&actual, &expected, "drift");
    }

    #[test]
    #[should_panic(expected = "trees differ at position 2")]
    fn reports_leaf_difference() {
        let expected = scenario_a_builder().unwrap().commit_model().unwrap();
        assert_models_approx_eq(&stump(0.5, 2.0), &expected, "leaf");
    }
}
