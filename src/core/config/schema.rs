//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$SCAFFOLD_UPGRADE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/scaffold-upgrade/config.toml`
//! 3. `~/.scaffold-upgrade/config.toml`
//!
//! # Repo Config
//!
//! Located at `<git_dir>/scaffold-upgrade/config.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing: names must be non-empty and
//! paths must stay at the project root.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// silent = false
///
/// [generator]
/// display_name = "JHipster"
/// package = "generator-jhipster"
/// program = "npx"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Suppress the upgrade report by default
    pub silent: Option<bool>,

    /// Generator invocation defaults
    pub generator: Option<GeneratorConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(generator) = &self.generator {
            generator.validate()?;
        }
        Ok(())
    }
}

/// Repository configuration.
///
/// # Example
///
/// ```toml
/// metadata_file = ".yo-rc.json"
/// preserve = [".jhipster", "node_modules"]
///
/// [generator]
/// program = "./node_modules/.bin/jhipster"
/// args = ["--force", "--skip-install", "--skip-git"]
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    /// Metadata file name at the project root
    pub metadata_file: Option<String>,

    /// Root entries kept when clearing generator output
    pub preserve: Option<Vec<String>>,

    /// Generator overrides for this repository
    pub generator: Option<GeneratorConfig>,
}

impl RepoConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(file) = &self.metadata_file {
            validate_root_entry("metadata_file", file)?;
        }
        if let Some(preserve) = &self.preserve {
            for entry in preserve {
                validate_root_entry("preserve", entry)?;
            }
        }
        if let Some(generator) = &self.generator {
            generator.validate()?;
        }
        Ok(())
    }
}

/// How to identify and invoke the generator.
///
/// `args` and `version_args` may contain `{package}` and `{version}` tokens.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Human-readable name used in generation commit messages
    pub display_name: Option<String>,

    /// Package name; also the metadata namespace
    pub package: Option<String>,

    /// Executable to spawn
    pub program: Option<String>,

    /// Arguments for a regeneration run
    pub args: Option<Vec<String>>,

    /// Arguments that make the program print its version
    pub version_args: Option<Vec<String>>,
}

impl GeneratorConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if a name is blank or the package
    /// does not yield a usable branch name.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("generator.display_name", &self.display_name),
            ("generator.package", &self.package),
            ("generator.program", &self.program),
        ] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(ConfigError::InvalidValue(format!("{key} cannot be empty")));
            }
        }

        if let Some(package) = &self.package {
            let generator = crate::core::generator::Generator {
                package: package.clone(),
                ..Default::default()
            };
            generator.upgrade_branch().map_err(|e| {
                ConfigError::InvalidValue(format!("generator.package '{package}': {e}"))
            })?;
        }

        Ok(())
    }
}

fn validate_root_entry(key: &str, entry: &str) -> Result<(), ConfigError> {
    let invalid = entry.is_empty()
        || entry == "."
        || entry == ".."
        || entry == ".git"
        || entry.contains('/')
        || entry.contains('\\');
    if invalid {
        return Err(ConfigError::InvalidValue(format!(
            "{key} entry '{entry}' must be a plain name at the project root"
        )));
    }
    Ok(())
}
