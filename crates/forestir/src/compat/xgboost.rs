//! XGBoost JSON model loader.
//!
//! Reads the tree section of XGBoost >= 1.0 JSON models (`gbtree` booster).
//! These are foreign types used only for parsing; every tree is replayed into
//! a [`ModelBuilder`] using XGBoost's node indices as staging keys.
//!
//! XGBoost conventions:
//! - `left_children[i] == -1` marks a leaf; its value is `split_conditions[i]`
//! - a split sends `value < split_conditions[i]` left, i.e. [`Operator::Lt`]
//! - `default_left[i]` gives the direction for missing values

use std::io::Read;

use log::debug;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};

use crate::builder::{ModelBuilder, NodeKey, TreePosition};
use crate::repr::{Model, Operator, Split};

use super::{FormatError, ModelLoader};

// =============================================================================
// Foreign types
// =============================================================================

/// Integer or boolean flag (XGBoost writes `default_left` as either).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    pub fn is_set(self) -> bool {
        match self {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_nodes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbTree {
    pub tree_param: TreeParam,
    pub left_children: Vec<i32>,
    pub right_children: Vec<i32>,
    pub split_indices: Vec<i64>,
    pub split_conditions: Vec<f64>,
    pub default_left: Vec<Flag>,
    #[serde(default)]
    pub split_type: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelTrees {
    pub trees: Vec<XgbTree>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum GradientBooster {
    Gbtree { model: ModelTrees },
    Gblinear {},
    Dart {},
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnerModelParam {
    #[serde_as(as = "DisplayFromStr")]
    pub num_feature: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learner {
    pub learner_model_param: LearnerModelParam,
    pub gradient_booster: GradientBooster,
}

/// Top-level XGBoost JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XgbModel {
    pub learner: Learner,
}

// =============================================================================
// Conversion
// =============================================================================

impl XgbModel {
    /// Parse an XGBoost JSON document.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, FormatError> {
        Ok(serde_json::from_reader(reader)?)
    }

    /// Translate into a [`Model`].
    pub fn to_model(&self) -> Result<Model, FormatError> {
        let trees = match &self.learner.gradient_booster {
            GradientBooster::Gbtree { model } => &model.trees,
            GradientBooster::Gblinear {} => {
                return Err(FormatError::InvalidValue {
                    field: "gradient_booster",
                    message: "gblinear models contain no trees".to_string(),
                })
            }
            GradientBooster::Dart {} => {
                return Err(FormatError::InvalidValue {
                    field: "gradient_booster",
                    message: "dart models carry per-tree weights, which are not represented"
                        .to_string(),
                })
            }
        };

        let num_features = self.learner.learner_model_param.num_feature;
        let mut builder = ModelBuilder::new(num_features);
        for (tree_idx, tree) in trees.iter().enumerate() {
            stage_tree(&mut builder, tree_idx, tree)?;
        }
        let model = builder.commit_model()?;
        debug!(
            "converted xgboost model: {} trees over {} features",
            model.n_trees(),
            num_features
        );
        Ok(model)
    }
}

fn check_len(tree: usize, field: &'static str, actual: usize, expected: usize) -> Result<(), FormatError> {
    if actual == expected {
        Ok(())
    } else {
        Err(FormatError::ArraySizeMismatch {
            tree,
            field,
            expected,
            actual,
        })
    }
}

fn stage_tree(builder: &mut ModelBuilder, tree_idx: usize, tree: &XgbTree) -> Result<(), FormatError> {
    let n = tree.tree_param.num_nodes;
    check_len(tree_idx, "left_children", tree.left_children.len(), n)?;
    check_len(tree_idx, "right_children", tree.right_children.len(), n)?;
    check_len(tree_idx, "split_indices", tree.split_indices.len(), n)?;
    check_len(tree_idx, "split_conditions", tree.split_conditions.len(), n)?;
    check_len(tree_idx, "default_left", tree.default_left.len(), n)?;
    if tree.split_type.iter().any(|&t| t != 0) {
        return Err(FormatError::Unsupported {
            tree: tree_idx,
            what: "categorical splits",
        });
    }

    let staged = builder.create_tree(TreePosition::Append)?;
    for key in 0..n {
        builder.create_node(staged, key as NodeKey)?;
    }

    for i in 0..n {
        let key = i as NodeKey;
        let left = tree.left_children[i];
        if left == -1 {
            builder.set_leaf_node(staged, key, tree.split_conditions[i])?;
            continue;
        }
        let feature = u32::try_from(tree.split_indices[i]).map_err(|_| FormatError::InvalidValue {
            field: "split_indices",
            message: format!("tree {tree_idx} node {i}: {}", tree.split_indices[i]),
        })?;
        let split = Split::new(
            feature,
            Operator::Lt,
            tree.split_conditions[i],
            tree.default_left[i].is_set(),
        );
        builder.set_test_node(staged, key, split, left, tree.right_children[i])?;
    }

    if n > 0 {
        builder.set_root_node(staged, 0)?;
    }
    Ok(())
}

/// Loader for XGBoost JSON models (`xgboost_json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct XgboostJsonLoader;

impl ModelLoader for XgboostJsonLoader {
    fn format_name(&self) -> &'static str {
        "xgboost_json"
    }

    fn load(&self, reader: &mut dyn Read) -> Result<Model, FormatError> {
        XgbModel::from_reader(reader)?.to_model()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BuildError, ValidationError};

    fn document(trees: &str) -> String {
        format!(
            r#"{{
                "learner": {{
                    "learner_model_param": {{ "num_feature": "2", "num_class": "0" }},
                    "gradient_booster": {{
                        "name": "gbtree",
                        "model": {{ "trees": [{trees}] }}
                    }}
                }},
                "version": [2, 0, 3]
            }}"#
        )
    }

    const TREE: &str = r#"{
        "tree_param": { "num_nodes": "5" },
        "left_children": [1, -1, 3, -1, -1],
        "right_children": [2, -1, 4, -1, -1],
        "split_indices": [0, 0, 1, 0, 0],
        "split_conditions": [0.5, -0.25, 1.5, 0.75, 1.25],
        "default_left": [1, 0, 0, 0, 0]
    }"#;

    #[test]
    fn loads_gbtree() {
        let model = XgboostJsonLoader
            .load(&mut document(TREE).as_bytes())
            .unwrap();
        assert_eq!(model.num_features(), 2);
        let tree = model.tree(0).unwrap();
        assert_eq!(tree.n_nodes(), 5);

        let root = tree.split(0).unwrap().unwrap();
        assert_eq!(root.op, Operator::Lt);
        assert!(root.default_left);
        assert_eq!(tree.leaf_value(1).unwrap(), Some(-0.25));
        assert_eq!(tree.split(2).unwrap().unwrap().feature, 1);

        assert_eq!(tree.traverse_to_leaf(&[0.1, 0.0]), 1);
        assert_eq!(tree.traverse_to_leaf(&[0.9, 1.0]), 3);
        assert_eq!(tree.traverse_to_leaf(&[f64::NAN, 9.0]), 1);
    }

    #[test]
    fn dangling_child_surfaces_as_build_error() {
        let bad = TREE.replace("[2, -1, 4, -1, -1]", "[2, -1, 9, -1, -1]");
        let err = XgboostJsonLoader
            .load(&mut document(&bad).as_bytes())
            .unwrap_err();
        match err {
            FormatError::Build(BuildError::ValidationFailed { tree: 0, error }) => {
                assert_eq!(
                    error,
                    ValidationError::DanglingChild {
                        parent: 2,
                        side: "right",
                        child: 9
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn length_mismatch_is_reported() {
        let bad = TREE.replace("[0.5, -0.25, 1.5, 0.75, 1.25]", "[0.5]");
        let err = XgboostJsonLoader
            .load(&mut document(&bad).as_bytes())
            .unwrap_err();
        assert!(matches!(
            err,
            FormatError::ArraySizeMismatch {
                field: "split_conditions",
                expected: 5,
                actual: 1,
                ..
            }
        ));
    }

    #[test]
    fn categorical_is_unsupported() {
        let cat = TREE.replace(
            r#""default_left": [1, 0, 0, 0, 0]"#,
            r#""default_left": [true, false, false, false, false], "split_type": [1, 0, 0, 0, 0]"#,
        );
        let err = XgboostJsonLoader
            .load(&mut document(&cat).as_bytes())
            .unwrap_err();
        assert!(matches!(err, FormatError::Unsupported { tree: 0, .. }));
    }

    #[test]
    fn gblinear_has_no_trees() {
        let json = r#"{"learner": {
            "learner_model_param": {"num_feature": "3"},
            "gradient_booster": {"name": "gblinear", "model": {"weights": [0.1]}}
        }}"#;
        let err = XgboostJsonLoader.load(&mut json.as_bytes()).unwrap_err();
        assert!(matches!(err, FormatError::InvalidValue { field: "gradient_booster", .. }));
    }
}
