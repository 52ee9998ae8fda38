//! Name-based lookup of model loaders.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::repr::Model;

use super::{FormatError, LightGbmLoader, ModelLoader, NativeJsonLoader, XgboostJsonLoader};

/// Failure to load a model through the registry.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("unknown model format {name:?} (available: {available})")]
    UnknownFormat { name: String, available: String },
    #[error("cannot open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot load {format} model: {source}")]
    Format {
        format: &'static str,
        #[source]
        source: FormatError,
    },
}

/// Maps format names to loaders.
pub struct LoaderRegistry {
    loaders: HashMap<&'static str, Box<dyn ModelLoader>>,
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for LoaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderRegistry")
            .field("formats", &self.formats())
            .finish()
    }
}

impl LoaderRegistry {
    /// Registry with no loaders.
    pub fn empty() -> Self {
        Self {
            loaders: HashMap::new(),
        }
    }

    /// Registry with every loader shipped by this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(NativeJsonLoader);
        registry.register(XgboostJsonLoader);
        registry.register(LightGbmLoader);
        registry
    }

    /// Add a loader, replacing any loader registered under the same name.
    pub fn register<L: ModelLoader + 'static>(&mut self, loader: L) {
        self.loaders.insert(loader.format_name(), Box::new(loader));
    }

    /// Registered format names, sorted.
    pub fn formats(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.loaders.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn get(&self, name: &str) -> Result<&dyn ModelLoader, LoadError> {
        self.loaders
            .get(name)
            .map(|loader| loader.as_ref())
            .ok_or_else(|| LoadError::UnknownFormat {
                name: name.to_string(),
                available: self.formats().join(", "),
            })
    }

    /// Load a model of format `name` from `reader`.
    pub fn load(&self, name: &str, reader: &mut dyn Read) -> Result<Model, LoadError> {
        let loader = self.get(name)?;
        let model = loader.load(reader).map_err(|source| LoadError::Format {
            format: loader.format_name(),
            source,
        })?;
        debug!(
            "loaded {} model: {} trees, {} nodes, {} features",
            loader.format_name(),
            model.n_trees(),
            model.n_nodes(),
            model.num_features()
        );
        Ok(model)
    }

    /// Load a model of format `name` from a file.
    pub fn load_path(&self, name: &str, path: impl AsRef<Path>) -> Result<Model, LoadError> {
        let path = path.as_ref();
        // resolve the loader before touching the filesystem
        self.get(name)?;
        let file = File::open(path).map_err(|source| LoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        self.load(name, &mut BufReader::new(file))
    }
}
