//! core::metadata::store
//!
//! Metadata file access within a working tree.
//!
//! The store is bound to an explicit project root. It never consults the
//! process working directory.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::schema::{parse_document, render_document, MetadataError, ProjectMetadata};

/// Reads and writes the generator's metadata entry at a project root.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    root: PathBuf,
    file_name: String,
    namespace: String,
}

impl MetadataStore {
    /// Create a store for `file_name` under `root`, interpreting `namespace`.
    pub fn new(root: &Path, file_name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            root: root.to_path_buf(),
            file_name: file_name.into(),
            namespace: namespace.into(),
        }
    }

    /// Absolute path of the metadata file.
    pub fn path(&self) -> PathBuf {
        self.root.join(&self.file_name)
    }

    /// File name relative to the project root.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Raw file contents, or `None` if the file does not exist.
    pub fn read_raw(&self) -> Result<Option<String>, MetadataError> {
        let path = self.path();
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(MetadataError::ReadError { path, source }),
        }
    }

    /// The generator entry, or `None` if the file or namespace is absent.
    pub fn read(&self) -> Result<Option<ProjectMetadata>, MetadataError> {
        match self.read_raw()? {
            Some(contents) => parse_document(&contents, &self.namespace),
            None => Ok(None),
        }
    }

    /// Write the generator entry, keeping other namespaces in the file.
    pub fn write(&self, metadata: &ProjectMetadata) -> Result<(), MetadataError> {
        let existing = self.read_raw()?;
        let contents = render_document(existing.as_deref(), &self.namespace, metadata)?;
        self.write_raw(contents.as_bytes())
    }

    /// Replace the file contents verbatim.
    ///
    /// Writes to a sibling temp file and renames it into place.
    pub fn write_raw(&self, contents: &[u8]) -> Result<(), MetadataError> {
        let path = self.path();
        let write_err = |source| MetadataError::WriteError {
            path: path.clone(),
            source,
        };

        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(contents).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;
        fs::rename(&temp_path, &path).map_err(write_err)?;
        Ok(())
    }
}
