//! engine::session
//!
//! Options for one upgrade and the session derived from repository state.

use crate::core::generator::version_label;
use crate::core::types::{BranchName, SemanticVersion, TargetVersion};

/// What the operator asked for.
#[derive(Debug, Clone, Default)]
pub struct UpgradeOptions {
    /// Version to upgrade to.
    pub target: TargetVersion,
    /// Stash uncommitted changes instead of refusing to run.
    pub force: bool,
    /// Suppress generator output and the upgrade report.
    pub silent: bool,
    /// Record `VERSION` instead of real versions.
    pub use_version_placeholders: bool,
}

/// Everything one run needs to know, resolved up front.
///
/// Never persisted: a later run derives its own session from the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeSession {
    /// Version recorded in the project metadata, if any.
    pub source_version: Option<SemanticVersion>,
    /// Concrete version being generated.
    pub target_version: SemanticVersion,
    /// Branch checked out when the run started.
    pub base_branch: BranchName,
    /// The generator's dedicated upgrade branch.
    pub upgrade_branch: BranchName,
    /// Whether versions are hidden behind the placeholder.
    pub use_version_placeholders: bool,
}

impl UpgradeSession {
    /// Source version as written into commit messages.
    pub fn source_label(&self) -> String {
        version_label(self.source_version.as_ref(), self.use_version_placeholders)
    }

    /// Target version as written into commit messages.
    pub fn target_label(&self) -> String {
        version_label(Some(&self.target_version), self.use_version_placeholders)
    }
}
