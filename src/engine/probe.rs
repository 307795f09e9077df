//! engine::probe
//!
//! Source and target version resolution.
//!
//! The source version is whatever the project's metadata says generated it.
//! A project with no recorded version (missing file, missing entry, missing
//! field or the placeholder) has an unknown source; that is not an error, it
//! sends the upgrade down the first-upgrade path with an `unknown` label.

use crate::core::metadata::{MetadataError, MetadataStore};
use crate::core::types::{SemanticVersion, TargetVersion};

use super::regen::{RegenError, Regenerator};

/// Reads the generator version a project was produced with.
#[derive(Debug, Clone)]
pub struct VersionProbe {
    store: MetadataStore,
}

impl VersionProbe {
    /// Create a probe over a metadata store.
    pub fn new(store: MetadataStore) -> Self {
        Self { store }
    }

    /// The recorded source version, or `None` when nothing is recorded.
    ///
    /// # Errors
    ///
    /// Malformed metadata or a malformed version string.
    pub fn resolve_source_version(&self) -> Result<Option<SemanticVersion>, MetadataError> {
        match self.store.read()? {
            Some(metadata) => metadata.version(),
            None => Ok(None),
        }
    }

    /// Pin the requested target to a concrete version.
    ///
    /// `latest` resolves to the version the regenerator reports as installed.
    pub fn resolve_target_version(
        &self,
        target: &TargetVersion,
        regenerator: &dyn Regenerator,
    ) -> Result<SemanticVersion, RegenError> {
        match target {
            TargetVersion::Exact(version) => Ok(version.clone()),
            TargetVersion::Latest => regenerator.installed_version(),
        }
    }
}
