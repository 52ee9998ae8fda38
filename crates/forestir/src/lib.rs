//! forestir: an in-memory representation of decision-tree ensembles.
//!
//! A [`Model`] is an ordered list of binary [`Tree`]s sharing a feature space.
//! Finalized trees are immutable and position-addressed: the root is at
//! position 0 and positions follow breadth-first order.
//!
//! # Key Types
//!
//! - [`Model`] / [`Tree`] / [`Node`](repr::Node) - Finalized, read-only ensemble
//! - [`ModelBuilder`] - Keyed staging area with all-or-nothing commit
//! - [`LoaderRegistry`] - Name-based lookup of format loaders
//!
//! # Building a model
//!
//! Create trees and nodes under arbitrary integer keys, wire them up in any
//! order, then call [`ModelBuilder::commit_model`]. See the [`builder`]
//! module for an example.
//!
//! # Loading models
//!
//! [`LoaderRegistry::with_defaults`] knows the crate's native JSON format as
//! well as XGBoost JSON and LightGBM text models. See the [`compat`] module.

// Re-export approx traits for users who want to compare models
pub use approx;

pub mod builder;
pub mod cli;
pub mod compat;
pub mod dump;
pub mod repr;
pub mod testing;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use builder::{BuildError, ModelBuilder, NodeKey, TreePosition, ValidationError};
pub use compat::{FormatError, LoadError, LoaderRegistry, ModelLoader};
pub use repr::{AccessError, Model, NodeId, Operator, Split, Tree};
