//! core::metadata::schema
//!
//! The project metadata document.
//!
//! # Parsing rules
//!
//! - The file must be a JSON object; anything else is a parse error.
//! - A missing namespace is not an error: the project was not produced by the
//!   configured generator (or not yet), and callers decide what that means.
//! - `baseName` is required inside the namespace.
//! - `generatorVersion` is optional. The [`VERSION_PLACEHOLDER`] value counts
//!   as absent, since placeholder-mode output carries no real version.
//! - Every other key is a feature flag and round-trips verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::types::{SemanticVersion, TypeError};

/// Stable stand-in for version strings in placeholder mode.
pub const VERSION_PLACEHOLDER: &str = "VERSION";

/// Errors from metadata operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse metadata: {0}")]
    ParseError(String),

    #[error("metadata root must be a JSON object")]
    NotAnObject,

    #[error("metadata version is invalid")]
    InvalidVersion(#[from] TypeError),

    #[error("failed to read metadata file '{path}'")]
    ReadError {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write metadata file '{path}'")]
    WriteError {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

/// The generator's entry inside the metadata document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectMetadata {
    /// Project name used in the initial scaffold commit message.
    pub base_name: String,

    /// Version of the generator that last wrote the project.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator_version: Option<String>,

    /// Feature flags and any other generator options.
    #[serde(flatten)]
    pub flags: Map<String, Value>,
}

impl ProjectMetadata {
    /// Metadata for a project that has no recorded generator version yet.
    pub fn new(base_name: impl Into<String>) -> Self {
        Self {
            base_name: base_name.into(),
            generator_version: None,
            flags: Map::new(),
        }
    }

    /// Builder-style flag setter.
    pub fn with_flag(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.flags.insert(key.into(), value.into());
        self
    }

    /// Read a boolean flag; absent or non-boolean is `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.flags.get(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// The recorded generator version.
    ///
    /// Returns `Ok(None)` when no version is recorded or the recorded value is
    /// the placeholder.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::InvalidVersion`] when a version is recorded but
    /// does not parse.
    pub fn version(&self) -> Result<Option<SemanticVersion>, MetadataError> {
        match self.generator_version.as_deref() {
            None => Ok(None),
            Some(v) if v.trim().is_empty() || v == VERSION_PLACEHOLDER => Ok(None),
            Some(v) => Ok(Some(SemanticVersion::parse(v)?)),
        }
    }
}

/// Parse the metadata document and extract the entry for `namespace`.
///
/// # Errors
///
/// - [`MetadataError::ParseError`] on malformed JSON or a malformed entry
/// - [`MetadataError::NotAnObject`] when the root is not an object
pub fn parse_document(json: &str, namespace: &str) -> Result<Option<ProjectMetadata>, MetadataError> {
    let root: Value =
        serde_json::from_str(json).map_err(|e| MetadataError::ParseError(e.to_string()))?;
    let Value::Object(mut root) = root else {
        return Err(MetadataError::NotAnObject);
    };

    match root.remove(namespace) {
        None => Ok(None),
        Some(entry) => serde_json::from_value(entry)
            .map(Some)
            .map_err(|e| MetadataError::ParseError(format!("{namespace}: {e}"))),
    }
}

/// Render the document with `metadata` stored under `namespace`.
///
/// When `existing` holds a previous document, its other namespaces are kept in
/// their original order. Output is pretty-printed with a trailing newline so
/// repeated renders are byte-identical.
///
/// # Errors
///
/// Returns an error if `existing` is malformed.
pub fn render_document(
    existing: Option<&str>,
    namespace: &str,
    metadata: &ProjectMetadata,
) -> Result<String, MetadataError> {
    let mut root = match existing {
        Some(json) => match serde_json::from_str::<Value>(json)
            .map_err(|e| MetadataError::ParseError(e.to_string()))?
        {
            Value::Object(map) => map,
            _ => return Err(MetadataError::NotAnObject),
        },
        None => Map::new(),
    };

    let entry =
        serde_json::to_value(metadata).map_err(|e| MetadataError::ParseError(e.to_string()))?;
    root.insert(namespace.to_string(), entry);

    let mut out = serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|e| MetadataError::ParseError(e.to_string()))?;
    out.push('\n');
    Ok(out)
}
