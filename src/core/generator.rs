//! core::generator
//!
//! Identity of the code generator a project was scaffolded with, and the
//! history contract derived from it.
//!
//! # Commit message contract
//!
//! These strings are consumed by downstream tooling and must not change:
//!
//! - `Initial version of <baseName> generated by <package>@<version>`
//! - `Generated with <display_name> <version>`
//! - `Merge branch '<upgrade branch>'`
//!
//! # Upgrade branch
//!
//! The dedicated upgrade branch is `<short name>_upgrade`, where the short
//! name is the package name without its `generator-` prefix. It is derived,
//! not configured, so every upgrade of a project finds the same lineage.
//!
//! # Example
//!
//! ```
//! use scaffold_upgrade::core::generator::Generator;
//!
//! let generator = Generator::default();
//! assert_eq!(generator.upgrade_branch().unwrap().as_str(), "jhipster_upgrade");
//! assert_eq!(generator.generation_message("8.1.0"), "Generated with JHipster 8.1.0");
//! ```

use crate::core::metadata::VERSION_PLACEHOLDER;
use crate::core::types::{BranchName, SemanticVersion, TypeError};

/// Label used when the source version could not be determined.
pub const UNKNOWN_VERSION: &str = "unknown";

/// Prefix identifying the initial scaffold commit.
pub const INITIAL_SCAFFOLD_PREFIX: &str = "Initial version of ";

/// Generator identity and invocation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generator {
    /// Name in generation commit messages (`JHipster`).
    pub display_name: String,
    /// Package name and metadata namespace (`generator-jhipster`).
    pub package: String,
    /// Executable spawned for regeneration.
    pub program: String,
    /// Regeneration arguments (`{package}` / `{version}` tokens allowed).
    pub args: Vec<String>,
    /// Arguments that print the installed version.
    pub version_args: Vec<String>,
    /// Metadata file name at the project root.
    pub metadata_file: String,
    /// Root entries that survive clearing generator output.
    pub preserve: Vec<String>,
}

impl Default for Generator {
    fn default() -> Self {
        let strings = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            display_name: "JHipster".to_string(),
            package: "generator-jhipster".to_string(),
            program: "npx".to_string(),
            args: strings(&[
                "--yes",
                "{package}@{version}",
                "--force",
                "--skip-install",
                "--skip-git",
                "--skip-checks",
                "--no-insight",
            ]),
            version_args: strings(&["--yes", "{package}@latest", "--version"]),
            metadata_file: ".yo-rc.json".to_string(),
            preserve: strings(&[".jhipster", "node_modules"]),
        }
    }
}

impl Generator {
    /// Arguments used when the operator points at a specific executable.
    /// That executable is whatever version it is, so nothing is pinned.
    pub fn executable_args() -> Vec<String> {
        ["--force", "--skip-install", "--skip-git", "--skip-checks", "--no-insight"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// Package name without the conventional `generator-` prefix.
    pub fn short_name(&self) -> &str {
        self.package
            .strip_prefix("generator-")
            .unwrap_or(&self.package)
    }

    /// The dedicated upgrade branch for this generator.
    ///
    /// # Errors
    ///
    /// Fails if the package name cannot form a valid branch name.
    pub fn upgrade_branch(&self) -> Result<BranchName, TypeError> {
        BranchName::new(format!("{}_upgrade", self.short_name()))
    }

    /// Message of the commit that recorded the first scaffold.
    pub fn initial_scaffold_message(&self, base_name: &str, version: &str) -> String {
        format!(
            "{INITIAL_SCAFFOLD_PREFIX}{base_name} generated by {}@{version}",
            self.package
        )
    }

    /// Message of a commit on the upgrade branch.
    pub fn generation_message(&self, version: &str) -> String {
        format!("Generated with {} {version}", self.display_name)
    }

    /// Message of a merge of the upgrade branch.
    pub fn merge_message(branch: &BranchName) -> String {
        format!("Merge branch '{branch}'")
    }

    /// Substitute `{package}` and `{version}` in an argument template.
    ///
    /// An unknown version resolves to `latest`.
    pub fn expand_args(&self, template: &[String], version: Option<&SemanticVersion>) -> Vec<String> {
        let version = version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "latest".to_string());
        template
            .iter()
            .map(|arg| {
                arg.replace("{package}", &self.package)
                    .replace("{version}", &version)
            })
            .collect()
    }
}

/// How a version appears in commit messages.
///
/// Placeholder mode hides the real version so history is reproducible across
/// generator releases.
pub fn version_label(version: Option<&SemanticVersion>, placeholders: bool) -> String {
    match (placeholders, version) {
        (true, _) => VERSION_PLACEHOLDER.to_string(),
        (false, Some(v)) => v.to_string(),
        (false, None) => UNKNOWN_VERSION.to_string(),
    }
}
