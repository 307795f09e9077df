//! ui::report
//!
//! Rendering of upgrade outcomes.
//!
//! # Exit codes
//!
//! | Outcome    | Code |
//! |------------|------|
//! | clean      | 0    |
//! | conflicted | 1    |
//! | error      | 2    |
//!
//! Clean and conflicted outcomes print to stdout. Failures print to stderr
//! with the `error:` prefix, whatever the verbosity.

use crate::engine::{FailureContext, UpgradeError, UpgradeReport};
use crate::git::MergeOutcome;

use super::output::{self, format_list, Verbosity};

/// Exit code of a clean upgrade.
pub const EXIT_CLEAN: u8 = 0;
/// Exit code when the merge stopped with conflicts.
pub const EXIT_CONFLICT: u8 = 1;
/// Exit code of a failed run.
pub const EXIT_ERROR: u8 = 2;

/// Exit code for a merge outcome.
pub fn exit_code(outcome: &MergeOutcome) -> u8 {
    match outcome {
        MergeOutcome::Clean { .. } => EXIT_CLEAN,
        MergeOutcome::Conflicted { .. } => EXIT_CONFLICT,
    }
}

/// Summary of a run that reached the merge.
pub fn render_outcome(report: &UpgradeReport) -> String {
    let session = &report.session;
    let mut lines = Vec::new();

    match &report.outcome {
        MergeOutcome::Clean {
            merge_commit: Some(oid),
        } => {
            lines.push(format!(
                "Upgraded '{}' from {} to {}.",
                session.base_branch,
                session.source_label(),
                session.target_label()
            ));
            lines.push(format!("  merge commit: {}", oid.short(7)));
        }
        MergeOutcome::Clean { merge_commit: None } => {
            lines.push(format!(
                "'{}' already contains '{}'; nothing to merge.",
                session.base_branch, session.upgrade_branch
            ));
        }
        MergeOutcome::Conflicted { paths } => {
            lines.push(format!(
                "Upgrade to {} merged into '{}' with conflicts in {} file(s):",
                session.target_label(),
                session.base_branch,
                paths.len()
            ));
            lines.push(format_list(paths, "  "));
            lines.push(String::new());
            lines.push("Next steps:".to_string());
            lines.push("  1. resolve the conflict markers in the files above".to_string());
            lines.push("  2. git add <files>".to_string());
            lines.push("  3. git commit".to_string());
        }
    }

    lines.push(format!(
        "  generated commit: {} on '{}'",
        report.generation_commit.short(7),
        session.upgrade_branch
    ));
    if report.bootstrapped {
        lines.push(format!(
            "  created '{}' with the {} baseline",
            session.upgrade_branch,
            session.source_label()
        ));
    }
    if let Some(stash) = &report.stashed_changes {
        if report.outcome.is_conflicted() {
            lines.push(format!(
                "  your uncommitted changes are in stash {}; run 'git stash pop' after committing the merge",
                stash.short(7)
            ));
        } else {
            lines.push(format!(
                "  your uncommitted changes collide with the upgrade and stay in stash {}",
                stash.short(7)
            ));
        }
    }

    lines.join("\n")
}

/// Description of a failed run, with the steps back to a stable state.
pub fn render_failure(error: &UpgradeError, context: &FailureContext) -> String {
    let mut lines = Vec::new();
    match context.phase {
        Some(phase) => lines.push(format!("upgrade failed during {phase}: {error}")),
        None => lines.push(format!("upgrade failed: {error}")),
    }

    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        lines.push(format!("  caused by: {cause}"));
        source = std::error::Error::source(cause);
    }

    if matches!(error, UpgradeError::DirtyWorkingTree { .. }) {
        lines.push("  no changes were made".to_string());
        return lines.join("\n");
    }

    if let Some(point) = &context.last_stable {
        lines.push(format!(
            "  last stable point: '{}' at {}",
            point.branch,
            point.commit.short(7)
        ));
        if let Some(branch) = context.checked_out.as_ref().filter(|b| **b != point.branch) {
            lines.push(format!("  HEAD was left on '{branch}'"));
            lines.push(format!("  to go back: git checkout -f {}", point.branch));
        }
    }
    if let Some(stash) = &context.stashed_changes {
        lines.push(format!(
            "  your uncommitted changes are in stash {}; restore them with: git stash pop",
            stash.short(7)
        ));
    }

    lines.join("\n")
}

/// Prints upgrade results and maps them to exit codes.
#[derive(Debug, Clone, Copy)]
pub struct ConflictReporter {
    verbosity: Verbosity,
}

impl ConflictReporter {
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Print the outcome; returns the exit code.
    pub fn report(&self, report: &UpgradeReport) -> u8 {
        output::print(render_outcome(report), self.verbosity);
        exit_code(&report.outcome)
    }

    /// Print a failure; returns the exit code.
    pub fn report_failure(&self, error: &UpgradeError, context: &FailureContext) -> u8 {
        output::error(render_failure(error, context));
        EXIT_ERROR
    }
}
