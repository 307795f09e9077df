//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::core::types::TargetVersion;

/// scaffold-upgrade - Upgrade a generated project to a newer generator version
#[derive(Parser, Debug)]
#[command(name = "scaffold-upgrade")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if scaffold-upgrade was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Regenerate the project at a newer generator version and merge it in
    #[command(
        name = "upgrade",
        long_about = "Regenerate the project at a newer generator version and merge it in.\n\n\
            The generator output is kept on a dedicated upgrade branch. Each upgrade \
            regenerates the project there from scratch, commits it, and merges the \
            branch into the current branch. Changes made by hand since the last \
            upgrade are kept; where they overlap with generator changes, the merge \
            stops with ordinary conflicts for you to resolve.",
        after_help = "\
EXIT STATUS:
    0   upgrade merged cleanly
    1   upgrade merged with conflicts left to resolve
    2   the upgrade failed

EXAMPLES:
    # Upgrade to whatever generator version is installed
    scaffold-upgrade upgrade

    # Upgrade to a specific version
    scaffold-upgrade upgrade --target-version 8.1.0

    # Use a locally built generator
    scaffold-upgrade upgrade --regenerate-executable ./generator/cli.js"
    )]
    Upgrade(UpgradeArgs),

    /// Show the recorded generator version and upgrade branch state
    Status,

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
INSTALLATION:
    # Bash
    scaffold-upgrade completion bash > ~/.local/share/bash-completion/completions/scaffold-upgrade

    # Zsh
    scaffold-upgrade completion zsh > ~/.zfunc/_scaffold-upgrade

    # Fish
    scaffold-upgrade completion fish > ~/.config/fish/completions/scaffold-upgrade.fish

    # PowerShell
    scaffold-upgrade completion powershell >> $PROFILE"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options of the `upgrade` command.
#[derive(Args, Debug, Clone)]
pub struct UpgradeArgs {
    /// Generator version to upgrade to (semver or `latest`)
    #[arg(long, value_name = "VERSION", default_value = "latest")]
    pub target_version: TargetVersion,

    /// Stash uncommitted changes, upgrade, then reapply them
    #[arg(long)]
    pub force: bool,

    /// Hide generator output and the upgrade summary
    #[arg(long)]
    pub silent: bool,

    /// Generator executable to run instead of the configured program
    #[arg(long, value_name = "PATH")]
    pub regenerate_executable: Option<PathBuf>,

    /// Record `VERSION` instead of real generator versions
    #[arg(long)]
    pub use_version_placeholders: bool,
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
