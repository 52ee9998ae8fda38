//! Native JSON storage format for forestir models.
//!
//! ```text
//! {
//!   "format_version": 1,
//!   "model": { "num_features": N, "trees": [ { "is_leaf": [...], ... } ] }
//! }
//! ```
//!
//! Trees are stored as parallel arrays without parent links. Loading
//! re-derives the parent links and runs full structural validation.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::repr::Model;

use super::{FormatError, ModelLoader};

/// Current format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
struct DocumentRef<'a> {
    format_version: u32,
    model: &'a Model,
}

#[derive(Deserialize)]
struct Header {
    format_version: u32,
}

#[derive(Deserialize)]
struct Document {
    model: Model,
}

/// Write `model` as a native JSON document.
pub fn to_writer<W: Write>(writer: W, model: &Model) -> Result<(), FormatError> {
    let doc = DocumentRef {
        format_version: FORMAT_VERSION,
        model,
    };
    serde_json::to_writer(writer, &doc)?;
    Ok(())
}

/// Serialize `model` to a native JSON string.
pub fn to_string(model: &Model) -> Result<String, FormatError> {
    let mut buf = Vec::new();
    to_writer(&mut buf, model)?;
    String::from_utf8(buf).map_err(|e| FormatError::InvalidValue {
        field: "document",
        message: e.to_string(),
    })
}

/// Parse a native JSON document.
pub fn from_slice(bytes: &[u8]) -> Result<Model, FormatError> {
    // Check the version before the body so old documents get a clear error.
    let header: Header = serde_json::from_slice(bytes)?;
    if header.format_version != FORMAT_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: header.format_version,
            expected: FORMAT_VERSION,
        });
    }
    let doc: Document = serde_json::from_slice(bytes)?;
    Ok(doc.model)
}

/// Loader for the native JSON format (`native_json`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeJsonLoader;

impl ModelLoader for NativeJsonLoader {
    fn format_name(&self) -> &'static str {
        "native_json"
    }

    fn load(&self, reader: &mut dyn Read) -> Result<Model, FormatError> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        from_slice(&bytes)
    }
}
