//! LightGBM text model loader.
//!
//! Parses LightGBM's text model format (`.txt` files saved via `save_model()`),
//! a line-based format of `key=value` pairs split into a header and one
//! `Tree=N` section per tree.
//!
//! Node mapping into the builder:
//! - internal node `i` becomes key `i`
//! - leaf `j` (referenced as child `-(j + 1)`, i.e. `!j`) becomes key `num_internal + j`
//! - a split sends `value <= threshold` left, i.e. [`Operator::Le`]

use std::collections::HashMap;
use std::io::Read;
use std::iter::Peekable;
use std::str::{FromStr, Lines};

use log::{debug, warn};

use crate::builder::{ModelBuilder, NodeKey, TreePosition};
use crate::repr::{Model, Operator, Split};

use super::{FormatError, ModelLoader};

// =============================================================================
// Decision type bitfield
// =============================================================================

/// Parsed `decision_type` entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecisionType {
    pub is_categorical: bool,
    pub default_left: bool,
    /// Bits 2-3: 0 = none, 1 = zero-as-missing, 2 = NaN.
    pub missing_type: u8,
}

impl DecisionType {
    pub fn from_i8(value: i8) -> Self {
        let v = value as u8;
        DecisionType {
            is_categorical: (v & 1) != 0,
            default_left: (v & 2) != 0,
            missing_type: (v >> 2) & 3,
        }
    }
}

// =============================================================================
// Parsed structure
// =============================================================================

/// Model-level `key=value` pairs before the first tree.
#[derive(Debug, Clone, Default)]
pub struct LgbHeader {
    /// Format version string, e.g. `v4`.
    pub version: String,
    /// Number of classes (1 for regression and binary models).
    pub num_class: usize,
    /// Largest feature index used by any split.
    pub max_feature_idx: usize,
}

/// One `Tree=N` section.
#[derive(Debug, Clone, Default)]
pub struct LgbTree {
    /// Number of leaves; internal nodes number `num_leaves - 1`.
    pub num_leaves: usize,
    /// Number of categorical splits in the tree.
    pub num_cat: usize,
    /// Whether leaves carry linear models instead of constants.
    pub is_linear: bool,
    /// Feature index per internal node.
    pub split_feature: Vec<i32>,
    /// Threshold per internal node.
    pub threshold: Vec<f64>,
    /// Packed [`DecisionType`] per internal node.
    pub decision_type: Vec<i8>,
    /// Left child per internal node; negative values encode leaves as `!leaf`.
    pub left_child: Vec<i32>,
    /// Right child per internal node, encoded like `left_child`.
    pub right_child: Vec<i32>,
    /// Output value per leaf.
    pub leaf_value: Vec<f64>,
}

/// A parsed LightGBM text model.
#[derive(Debug, Clone)]
pub struct LgbModel {
    pub header: LgbHeader,
    /// Tree sections in file order.
    pub trees: Vec<LgbTree>,
}

impl LgbModel {
    pub fn from_string(content: &str) -> Result<Self, FormatError> {
        let mut lines = content.lines().peekable();
        let header = parse_header(&mut lines)?;

        let mut trees = Vec::new();
        while let Some(line) = lines.next() {
            if line.starts_with("Tree=") {
                trees.push(parse_tree(trees.len(), &mut lines)?);
            } else if line == "end of trees" {
                break;
            }
        }

        Ok(LgbModel { header, trees })
    }

    pub fn num_features(&self) -> usize {
        self.header.max_feature_idx + 1
    }

    /// Translate into a [`Model`].
    pub fn to_model(&self) -> Result<Model, FormatError> {
        let num_features = u32::try_from(self.num_features()).map_err(|_| FormatError::InvalidValue {
            field: "max_feature_idx",
            message: self.header.max_feature_idx.to_string(),
        })?;
        if self.header.num_class > 1 {
            debug!(
                "lightgbm model has {} classes; trees are kept in file order",
                self.header.num_class
            );
        }

        let mut builder = ModelBuilder::new(num_features);
        for (tree_idx, tree) in self.trees.iter().enumerate() {
            stage_tree(&mut builder, tree_idx, tree)?;
        }
        Ok(builder.commit_model()?)
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

fn collect_pairs(lines: &mut Peekable<Lines<'_>>) -> HashMap<String, String> {
    let mut kv = HashMap::new();
    while let Some(line) = lines.peek() {
        if line.starts_with("Tree=") || line.starts_with("end of trees") {
            break;
        }
        if line.is_empty() {
            lines.next();
            if !kv.is_empty() {
                break;
            }
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            kv.insert(key.trim().to_string(), value.trim().to_string());
        }
        lines.next();
    }
    kv
}

fn parse_header(lines: &mut Peekable<Lines<'_>>) -> Result<LgbHeader, FormatError> {
    // model type line, e.g. "tree"
    if lines.peek().is_some_and(|line| !line.contains('=')) {
        lines.next();
    }
    let kv = collect_pairs(lines);

    let version = kv.get("version").cloned().unwrap_or_default();
    let num_class = parse_scalar(&kv, "num_class")?.unwrap_or(1);
    let max_feature_idx =
        parse_scalar(&kv, "max_feature_idx")?.ok_or(FormatError::MissingField("max_feature_idx"))?;

    Ok(LgbHeader {
        version,
        num_class,
        max_feature_idx,
    })
}

fn parse_tree(tree_idx: usize, lines: &mut Peekable<Lines<'_>>) -> Result<LgbTree, FormatError> {
    let kv = collect_pairs(lines);

    let num_leaves: usize = parse_scalar(&kv, "num_leaves")?.ok_or(FormatError::MissingField("num_leaves"))?;
    let num_cat = parse_scalar(&kv, "num_cat")?.unwrap_or(0);
    let is_linear = parse_scalar::<i32>(&kv, "is_linear")?.is_some_and(|v| v != 0);

    let mut tree = LgbTree {
        num_leaves,
        num_cat,
        is_linear,
        ..LgbTree::default()
    };

    if num_leaves <= 1 {
        tree.leaf_value = parse_array(&kv, "leaf_value")?.unwrap_or_else(|| vec![0.0]);
        check_len(tree_idx, "leaf_value", &tree.leaf_value, 1)?;
        return Ok(tree);
    }

    let num_splits = num_leaves - 1;
    tree.split_feature = required_array(&kv, "split_feature")?;
    check_len(tree_idx, "split_feature", &tree.split_feature, num_splits)?;
    tree.threshold = required_array(&kv, "threshold")?;
    check_len(tree_idx, "threshold", &tree.threshold, num_splits)?;
    tree.decision_type = parse_array(&kv, "decision_type")?.unwrap_or_else(|| vec![0; num_splits]);
    check_len(tree_idx, "decision_type", &tree.decision_type, num_splits)?;
    tree.left_child = required_array(&kv, "left_child")?;
    check_len(tree_idx, "left_child", &tree.left_child, num_splits)?;
    tree.right_child = required_array(&kv, "right_child")?;
    check_len(tree_idx, "right_child", &tree.right_child, num_splits)?;
    tree.leaf_value = required_array(&kv, "leaf_value")?;
    check_len(tree_idx, "leaf_value", &tree.leaf_value, num_leaves)?;

    Ok(tree)
}

fn parse_scalar<T: FromStr>(kv: &HashMap<String, String>, field: &'static str) -> Result<Option<T>, FormatError> {
    kv.get(field)
        .map(|v| {
            v.parse().map_err(|_| FormatError::InvalidValue {
                field,
                message: format!("cannot parse {v:?}"),
            })
        })
        .transpose()
}

fn parse_array<T: FromStr>(kv: &HashMap<String, String>, field: &'static str) -> Result<Option<Vec<T>>, FormatError> {
    kv.get(field)
        .map(|s| {
            s.split_whitespace()
                .map(|v| {
                    v.parse().map_err(|_| FormatError::InvalidValue {
                        field,
                        message: format!("cannot parse element {v:?}"),
                    })
                })
                .collect()
        })
        .transpose()
}

fn required_array<T: FromStr>(kv: &HashMap<String, String>, field: &'static str) -> Result<Vec<T>, FormatError> {
    parse_array(kv, field)?.ok_or(FormatError::MissingField(field))
}

fn check_len<T>(tree: usize, field: &'static str, arr: &[T], expected: usize) -> Result<(), FormatError> {
    if arr.len() != expected {
        return Err(FormatError::ArraySizeMismatch {
            tree,
            field,
            expected,
            actual: arr.len(),
        });
    }
    Ok(())
}

// =============================================================================
// Conversion
// =============================================================================

fn stage_tree(builder: &mut ModelBuilder, tree_idx: usize, tree: &LgbTree) -> Result<(), FormatError> {
    if tree.is_linear {
        return Err(FormatError::Unsupported {
            tree: tree_idx,
            what: "linear leaves",
        });
    }

    if tree.num_cat > 0 {
        return Err(FormatError::Unsupported {
            tree: tree_idx,
            what: "categorical splits",
        });
    }

    let staged = builder.create_tree(TreePosition::Append)?;

    if tree.num_leaves <= 1 {
        let value = tree.leaf_value.first().copied().unwrap_or(0.0);
        builder.create_node(staged, 0)?;
        builder.set_leaf_node(staged, 0, value)?;
        builder.set_root_node(staged, 0)?;
        return Ok(());
    }

    let num_internal = tree.num_leaves - 1;
    let n_nodes = NodeKey::try_from(num_internal + tree.num_leaves).map_err(|_| FormatError::InvalidValue {
        field: "num_leaves",
        message: format!("tree {tree_idx}: {} leaves", tree.num_leaves),
    })?;
    // n_nodes fits in a NodeKey, so both ranges below do too
    let key_of = |field: &'static str, node: usize, child: i32| -> Result<NodeKey, FormatError> {
        let key = if child < 0 {
            let leaf = !child as usize;
            (leaf < tree.num_leaves).then(|| (num_internal + leaf) as NodeKey)
        } else {
            ((child as usize) < num_internal).then_some(child)
        };
        key.ok_or_else(|| FormatError::InvalidValue {
            field,
            message: format!("tree {tree_idx} node {node}: child {child} out of range"),
        })
    };

    for key in 0..n_nodes {
        builder.create_node(staged, key)?;
    }

    let mut zero_missing = false;
    for i in 0..num_internal {
        let decision = DecisionType::from_i8(tree.decision_type[i]);
        if decision.is_categorical {
            return Err(FormatError::Unsupported {
                tree: tree_idx,
                what: "categorical splits",
            });
        }
        zero_missing |= decision.missing_type == 1;

        let feature = u32::try_from(tree.split_feature[i]).map_err(|_| FormatError::InvalidValue {
            field: "split_feature",
            message: format!("tree {tree_idx} node {i}: {}", tree.split_feature[i]),
        })?;
        let split = Split::new(feature, Operator::Le, tree.threshold[i], decision.default_left);
        builder.set_test_node(
            staged,
            i as NodeKey,
            split,
            key_of("left_child", i, tree.left_child[i])?,
            key_of("right_child", i, tree.right_child[i])?,
        )?;
    }
    for (j, &value) in tree.leaf_value.iter().enumerate() {
        builder.set_leaf_node(staged, (num_internal + j) as NodeKey, value)?;
    }
    builder.set_root_node(staged, 0)?;

    if zero_missing {
        warn!("tree {tree_idx}: zero-as-missing splits are loaded as plain numeric splits");
    }
    Ok(())
}

/// Loader for LightGBM text models (`lightgbm`).
#[derive(Debug, Clone, Copy, Default)]
pub struct LightGbmLoader;

impl ModelLoader for LightGbmLoader {
    fn format_name(&self) -> &'static str {
        "lightgbm"
    }

    fn load(&self, reader: &mut dyn Read) -> Result<Model, FormatError> {
        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        let parsed = LgbModel::from_string(&content)?;
        debug!(
            "parsed lightgbm model {}: {} trees",
            parsed.header.version,
            parsed.trees.len()
        );
        parsed.to_model()
    }
}
