//! Canonical ensemble representation (ordered collection of trees).

use serde::{Deserialize, Serialize};

use super::tree::{Tree, TreeValidationError};
use super::AccessError;

/// Structural validation errors for [`Model`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelValidationError {
    #[error("tree {tree_idx} is invalid: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
    #[error("tree {tree_idx} tests feature {feature} but the model has {num_features} features")]
    FeatureOutOfRange {
        tree_idx: usize,
        feature: u32,
        num_features: u32,
    },
}

/// Serialized layout of a [`Model`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawModel {
    pub num_features: u32,
    pub trees: Vec<Tree>,
}

/// An ensemble of decision trees.
///
/// Immutable once built: there are no mutators, so a `Model` can be shared
/// across threads and read concurrently. Build one with
/// [`ModelBuilder`](crate::builder::ModelBuilder) or [`Model::from_trees`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawModel", into = "RawModel")]
pub struct Model {
    num_features: u32,
    trees: Vec<Tree>,
}

impl Model {
    /// Assemble a model from finalized trees, checking feature indices.
    ///
    /// Trees are structurally valid by construction; this only checks that
    /// every tested feature is below `num_features`.
    pub fn from_trees(num_features: u32, trees: Vec<Tree>) -> Result<Self, ModelValidationError> {
        let model = Self {
            num_features,
            trees,
        };
        model.validate()?;
        Ok(model)
    }

    /// Crate-internal constructor for trees already checked by the builder.
    pub(crate) fn new_unchecked(num_features: u32, trees: Vec<Tree>) -> Self {
        Self {
            num_features,
            trees,
        }
    }

    /// Number of input features the model was built against.
    #[inline]
    pub fn num_features(&self) -> u32 {
        self.num_features
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    /// Get a reference to a specific tree.
    pub fn tree(&self, idx: usize) -> Result<&Tree, AccessError> {
        self.trees.get(idx).ok_or(AccessError::TreeOutOfRange {
            index: idx,
            n_trees: self.trees.len(),
        })
    }

    /// Iterate over trees in ensemble order.
    pub fn trees(&self) -> impl ExactSizeIterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Total number of nodes across all trees.
    pub fn n_nodes(&self) -> usize {
        self.trees.iter().map(Tree::n_nodes).sum()
    }

    /// Validate every tree and the feature bound.
    pub fn validate(&self) -> Result<(), ModelValidationError> {
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|error| ModelValidationError::InvalidTree { tree_idx, error })?;
            if let Some(feature) = tree.max_feature() {
                if feature >= self.num_features {
                    return Err(ModelValidationError::FeatureOutOfRange {
                        tree_idx,
                        feature,
                        num_features: self.num_features,
                    });
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<RawModel> for Model {
    type Error = ModelValidationError;

    fn try_from(raw: RawModel) -> Result<Self, Self::Error> {
        Self::from_trees(raw.num_features, raw.trees)
    }
}

impl From<Model> for RawModel {
    fn from(model: Model) -> Self {
        Self {
            num_features: model.num_features,
            trees: model.trees,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repr::{Operator, Split, TreeBuffer};

    fn stump(feature: u32, left: f64, right: f64) -> Tree {
        let mut buf = TreeBuffer::default();
        buf.push_test(Split::new(feature, Operator::Lt, 0.5, true), 1, 2, None);
        buf.push_leaf(left, Some(0));
        buf.push_leaf(right, Some(0));
        buf.finish()
    }

    #[test]
    fn model_accessors() {
        let model = Model::from_trees(2, vec![stump(0, 1.0, 2.0), stump(1, 3.0, 4.0)]).unwrap();
        assert_eq!(model.num_features(), 2);
        assert_eq!(model.n_trees(), 2);
        assert_eq!(model.n_nodes(), 6);
        assert_eq!(model.tree(1).unwrap().leaf_value(2).unwrap(), Some(4.0));
        assert_eq!(
            model.tree(2).unwrap_err(),
            AccessError::TreeOutOfRange {
                index: 2,
                n_trees: 2
            }
        );
    }

    #[test]
    fn feature_out_of_range_is_rejected() {
        let err = Model::from_trees(1, vec![stump(0, 1.0, 2.0), stump(3, 1.0, 2.0)]).unwrap_err();
        assert_eq!(
            err,
            ModelValidationError::FeatureOutOfRange {
                tree_idx: 1,
                feature: 3,
                num_features: 1
            }
        );
    }

    #[test]
    fn serde_rejects_bad_feature_bound() {
        let model = Model::from_trees(4, vec![stump(3, 1.0, 2.0)]).unwrap();
        let mut json: serde_json::Value = serde_json::to_value(&model).unwrap();
        json["num_features"] = serde_json::json!(2);
        let err = serde_json::from_value::<Model>(json).unwrap_err();
        assert!(err.to_string().contains("feature 3"), "{err}");
    }

    #[test]
    fn model_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Model>();
    }
}
