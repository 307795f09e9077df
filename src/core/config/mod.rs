//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Two configuration scopes:
//! - **Global**: User-level settings
//! - **Repo**: Repository-level overrides
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values (see [`Generator::default`])
//! 2. Global config file
//! 3. Repo config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$SCAFFOLD_UPGRADE_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/scaffold-upgrade/config.toml`
//! 3. `~/.scaffold-upgrade/config.toml`
//!
//! # Repo Config Location
//!
//! `<git_dir>/scaffold-upgrade/config.toml`. It lives inside the git
//! directory so it never shows up as an uncommitted change and never ends up
//! on the upgrade branch.
//!
//! # Example
//!
//! ```no_run
//! use scaffold_upgrade::core::config::Config;
//! use std::path::Path;
//!
//! let config = Config::load(Some(Path::new("/path/to/repo/.git"))).unwrap();
//! let generator = config.generator();
//! println!("upgrading with {}", generator.display_name);
//! ```

pub mod schema;

pub use schema::{GeneratorConfig, GlobalConfig, RepoConfig};

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::generator::Generator;

/// Environment variable naming an explicit global config file.
pub const CONFIG_ENV: &str = "SCAFFOLD_UPGRADE_CONFIG";

/// Directory name used under config homes and the git directory.
const CONFIG_DIR: &str = "scaffold-upgrade";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}'")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Merged configuration from all sources.
///
/// Accessors apply precedence: repo config overrides global config, which
/// overrides built-in defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Repository configuration (if in a repo)
    pub repo: Option<RepoConfig>,
    global_path: Option<PathBuf>,
    repo_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `git_dir` is provided, also loads repo-specific config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or fail
    /// validation. Missing config files are not an error.
    pub fn load(git_dir: Option<&Path>) -> Result<Self, ConfigError> {
        let (global, global_path) = Self::load_global()?;

        let (repo, repo_path) = match git_dir {
            Some(dir) => {
                let path = Self::repo_config_path(dir);
                if path.exists() {
                    (Some(read_toml::<RepoConfig>(&path)?), Some(path))
                } else {
                    (None, None)
                }
            }
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref r) = repo {
            r.validate()?;
        }

        Ok(Config {
            global,
            repo,
            global_path,
            repo_path,
        })
    }

    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        let mut candidates = Vec::new();
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            candidates.push(PathBuf::from(path));
        }
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            candidates.push(PathBuf::from(xdg_home).join(CONFIG_DIR).join("config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(format!(".{CONFIG_DIR}")).join("config.toml"));
        }

        for path in candidates {
            if path.exists() {
                let config = read_toml::<GlobalConfig>(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    /// Canonical repo config path for a git directory.
    pub fn repo_config_path(git_dir: &Path) -> PathBuf {
        git_dir.join(CONFIG_DIR).join("config.toml")
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// The generator descriptor with all overrides applied.
    pub fn generator(&self) -> Generator {
        let mut generator = Generator::default();

        let layers = [
            self.global.generator.as_ref(),
            self.repo.as_ref().and_then(|r| r.generator.as_ref()),
        ];
        for layer in layers.into_iter().flatten() {
            if let Some(v) = &layer.display_name {
                generator.display_name = v.clone();
            }
            if let Some(v) = &layer.package {
                generator.package = v.clone();
            }
            if let Some(v) = &layer.program {
                generator.program = v.clone();
            }
            if let Some(v) = &layer.args {
                generator.args = v.clone();
            }
            if let Some(v) = &layer.version_args {
                generator.version_args = v.clone();
            }
        }

        if let Some(repo) = &self.repo {
            if let Some(file) = &repo.metadata_file {
                generator.metadata_file = file.clone();
            }
            if let Some(preserve) = &repo.preserve {
                generator.preserve = preserve.clone();
            }
        }

        generator
    }

    /// Whether the upgrade report is suppressed by default.
    ///
    /// Defaults to `false` if not configured.
    pub fn silent(&self) -> bool {
        self.global.silent.unwrap_or(false)
    }

    /// Path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Path to the loaded repo config file.
    pub fn repo_config_loaded_from(&self) -> Option<&Path> {
        self.repo_path.as_deref()
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
