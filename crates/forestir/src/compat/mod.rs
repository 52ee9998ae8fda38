//! External format loaders.
//!
//! This module provides loaders that read models saved by external
//! frameworks (XGBoost, LightGBM) or by this crate, and produce a [`Model`].
//! Loaders are looked up by name through a [`LoaderRegistry`].
//!
//! Foreign formats are translated through the
//! [`ModelBuilder`](crate::builder::ModelBuilder), so structural problems in
//! the source surface as [`FormatError::Build`].

use std::io::Read;

use crate::builder::BuildError;
use crate::repr::Model;

pub mod lightgbm;
pub mod native;
pub mod registry;
pub mod xgboost;

pub use lightgbm::LightGbmLoader;
pub use native::NativeJsonLoader;
pub use registry::{LoadError, LoaderRegistry};
pub use xgboost::XgboostJsonLoader;

/// A stream could not be interpreted as a model of the loader's format.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
    #[error("array size mismatch for {field} in tree {tree}: expected {expected}, got {actual}")]
    ArraySizeMismatch {
        tree: usize,
        field: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unsupported feature in tree {tree}: {what}")]
    Unsupported { tree: usize, what: &'static str },
    #[error("invalid tree structure: {0}")]
    Build(#[from] BuildError),
}

/// Something that turns a byte stream of one external format into a [`Model`].
pub trait ModelLoader: Send + Sync {
    /// Registry name of the format handled by this loader.
    fn format_name(&self) -> &'static str;

    /// Read and translate a complete model.
    fn load(&self, reader: &mut dyn Read) -> Result<Model, FormatError>;
}
