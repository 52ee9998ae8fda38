//! Human-readable dump of a model, one breadth-first listing per tree.
//!
//! ```text
//! Tree #0
//!   0: split_index=0, threshold=0.5, op=<, cleft=1, cright=2, cdefault=1
//!   1: leaf_value=-1, parent=0
//!   2: leaf_value=1, parent=0
//! Tree #0 has 2 leaves total
//! ```

use std::fmt;

use crate::repr::{Model, NodeKind, Tree};

/// [`fmt::Display`] adapter that writes the dump of a model.
#[derive(Debug, Clone, Copy)]
pub struct Dump<'a>(pub &'a Model);

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, tree) in self.0.trees().enumerate() {
            write_tree(f, idx, tree)?;
        }
        Ok(())
    }
}

fn write_tree(f: &mut fmt::Formatter<'_>, idx: usize, tree: &Tree) -> fmt::Result {
    writeln!(f, "Tree #{idx}")?;
    let mut n_leaves = 0;
    for node in tree.bfs() {
        write!(f, "  {}: ", node.id())?;
        match node.kind() {
            NodeKind::Test { split, left, right } => {
                let default = if split.default_left { left } else { right };
                write!(
                    f,
                    "split_index={}, threshold={}, op={}, cleft={left}, cright={right}, cdefault={default}",
                    split.feature, split.threshold, split.op
                )?;
            }
            NodeKind::Leaf { value } => {
                n_leaves += 1;
                write!(f, "leaf_value={value}")?;
            }
        }
        if let Some(parent) = node.parent() {
            write!(f, ", parent={parent}")?;
        }
        writeln!(f)?;
    }
    writeln!(f, "Tree #{idx} has {n_leaves} leaves total")?;
    writeln!(f)
}

/// One-line size summary logged ahead of the dump: the number of trees.
pub fn summary(model: &Model) -> String {
    format!("model size = {}", model.n_trees())
}

/// Render the dump of `model` as a string.
pub fn render(model: &Model) -> String {
    Dump(model).to_string()
}
