//! engine::orchestrator
//!
//! The upgrade protocol.
//!
//! # Phases
//!
//! ```text
//! Init -> Resolving -> Checkpointing -> Regenerating -> Merging -> Reporting -> Done
//!                                                                           \-> Failed
//! ```
//!
//! - **Init**: refuse in-progress operations, detached or unborn HEAD, running
//!   on the upgrade branch, and (unless forced) any uncommitted change. A
//!   forced run stashes those changes and restores them after a clean merge.
//! - **Resolving**: read the source version, pin the target. On the first
//!   upgrade, build the upgrade branch: an orphan branch holding the pure
//!   generator output at the source version, block-merged into the base
//!   branch with the base tree unchanged.
//! - **Checkpointing**: check out the upgrade branch, remove its tracked
//!   files, bring over the base branch's metadata.
//! - **Regenerating**: generate at the target version and commit everything
//!   except the files that were ignored when the run started.
//! - **Merging**: merge the upgrade branch into the base branch, no
//!   fast-forward. Conflicts are left in place for the developer.
//!
//! # History
//!
//! After the first upgrade of a freshly scaffolded project, `git log` on the
//! base branch reads:
//!
//! ```text
//! Merge branch 'jhipster_upgrade'
//! Generated with JHipster 8.1.0
//! Merge branch 'jhipster_upgrade'
//! Generated with JHipster 7.9.3
//! Initial version of shop generated by generator-jhipster@7.9.3
//! ```
//!
//! Every later upgrade appends one generation commit and one merge. The
//! upgrade branch is only ever extended.

use std::fmt;
use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::core::generator::{Generator, INITIAL_SCAFFOLD_PREFIX};
use crate::core::metadata::{MetadataError, MetadataStore};
use crate::core::types::{BranchName, Oid, SemanticVersion, TypeError};
use crate::git::{Git, GitError, MergeOutcome};
use crate::ui::output::{self, Verbosity};

use super::probe::VersionProbe;
use super::regen::{GenerationRequest, RegenError, Regenerator};
use super::session::{UpgradeOptions, UpgradeSession};

const STASH_MESSAGE: &str = "scaffold-upgrade: uncommitted changes";

/// Where a run is in the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Resolving,
    Checkpointing,
    Regenerating,
    Merging,
    Reporting,
    Done,
    Failed,
}

impl Phase {
    /// Lowercase name for messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Init => "init",
            Phase::Resolving => "resolving",
            Phase::Checkpointing => "checkpointing",
            Phase::Regenerating => "regenerating",
            Phase::Merging => "merging",
            Phase::Reporting => "reporting",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that abort an upgrade.
///
/// A merge conflict is not among them: it is a normal
/// [`MergeOutcome::Conflicted`] result.
#[derive(Debug, Error)]
pub enum UpgradeError {
    /// Uncommitted changes and no `force`. Nothing was touched.
    #[error("working tree has uncommitted changes ({status}); commit or stash them first, or pass --force")]
    DirtyWorkingTree { status: String },

    /// A repository operation failed.
    #[error("{operation} failed")]
    RepositoryOperation {
        operation: String,
        #[source]
        source: GitError,
    },

    /// The run was started from the upgrade branch itself.
    #[error("currently on the upgrade branch '{branch}'; check out the project branch first")]
    OnUpgradeBranch { branch: String },

    /// HEAD does not point at a branch.
    #[error("HEAD is detached; check out the project branch first")]
    DetachedHead,

    /// The current branch has no commits.
    #[error("the current branch has no commits yet")]
    UnbornHead,

    /// HEAD is still on the upgrade branch a failed first upgrade created
    /// but never committed to.
    #[error("HEAD is on the upgrade branch '{branch}', which has no commits yet (an earlier first upgrade stopped part way); run 'git checkout -f <project branch>' and retry")]
    InterruptedBootstrap { branch: String },

    /// A merge, rebase or similar is already underway.
    #[error("a {operation} is in progress; finish or abort it first")]
    OperationInProgress { operation: String },

    /// The generator's upgrade branch name is not a valid ref.
    #[error("invalid upgrade branch")]
    InvalidBranch(#[from] TypeError),

    /// The generator failed.
    #[error("regeneration failed")]
    Regeneration(#[from] RegenError),

    /// Project metadata is unreadable or malformed.
    #[error("project metadata is unusable")]
    Metadata(#[from] MetadataError),

    /// Generator output could not be cleared from the working tree.
    #[error("failed to clear '{path}'")]
    Workspace {
        path: std::path::PathBuf,
        source: std::io::Error,
    },
}

impl UpgradeError {
    /// Whether this is a failure of (or a refusal by) the repository layer.
    pub fn is_repository_operation(&self) -> bool {
        matches!(
            self,
            UpgradeError::RepositoryOperation { .. }
                | UpgradeError::OnUpgradeBranch { .. }
                | UpgradeError::DetachedHead
                | UpgradeError::UnbornHead
                | UpgradeError::InterruptedBootstrap { .. }
                | UpgradeError::OperationInProgress { .. }
        )
    }
}

trait RepoOp<T> {
    fn during(self, operation: &str) -> Result<T, UpgradeError>;
}

impl<T> RepoOp<T> for Result<T, GitError> {
    fn during(self, operation: &str) -> Result<T, UpgradeError> {
        self.map_err(|source| UpgradeError::RepositoryOperation {
            operation: operation.to_string(),
            source,
        })
    }
}

/// A branch and commit the developer can safely return to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StablePoint {
    pub branch: BranchName,
    pub commit: Oid,
}

/// Result of a run that reached the merge.
#[derive(Debug, Clone)]
pub struct UpgradeReport {
    /// The resolved session.
    pub session: UpgradeSession,
    /// Whether this run created the upgrade branch.
    pub bootstrapped: bool,
    /// Commit holding the target-version output.
    pub generation_commit: Oid,
    /// How the merge went.
    pub outcome: MergeOutcome,
    /// Stash entry still holding the changes a forced run set aside. `None`
    /// when there were none or they were reapplied after the merge.
    pub stashed_changes: Option<Oid>,
}

/// What a failed run leaves behind, for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureContext {
    /// Phase the run stopped in.
    pub phase: Option<Phase>,
    /// Last point on the base branch known to be consistent.
    pub last_stable: Option<StablePoint>,
    /// Branch HEAD was on when the run stopped.
    pub checked_out: Option<BranchName>,
    /// Stash entry holding the developer's uncommitted changes.
    pub stashed_changes: Option<Oid>,
}

/// Runs the upgrade protocol against one repository.
pub struct UpgradeOrchestrator<'a> {
    git: &'a Git,
    generator: &'a Generator,
    regenerator: &'a dyn Regenerator,
    verbosity: Verbosity,
    phase: Phase,
    failed_in: Option<Phase>,
    last_stable: Option<StablePoint>,
    checked_out: Option<BranchName>,
    stash: Option<Oid>,
    ignored: Vec<String>,
}

impl<'a> UpgradeOrchestrator<'a> {
    /// Create an orchestrator. Nothing is read until [`run`](Self::run).
    pub fn new(git: &'a Git, generator: &'a Generator, regenerator: &'a dyn Regenerator) -> Self {
        Self {
            git,
            generator,
            regenerator,
            verbosity: Verbosity::Quiet,
            phase: Phase::Init,
            failed_in: None,
            last_stable: None,
            checked_out: None,
            stash: None,
            ignored: Vec::new(),
        }
    }

    /// Set how chatty progress output is.
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Phase a failed run stopped in.
    pub fn failed_in(&self) -> Option<Phase> {
        self.failed_in
    }

    /// The last point on the base branch known to be consistent.
    pub fn last_stable(&self) -> Option<&StablePoint> {
        self.last_stable.as_ref()
    }

    /// Branch HEAD was left on by a failed run.
    pub fn checked_out(&self) -> Option<&BranchName> {
        self.checked_out.as_ref()
    }

    /// Everything a failure report needs.
    pub fn failure_context(&self) -> FailureContext {
        FailureContext {
            phase: self.failed_in,
            last_stable: self.last_stable.clone(),
            checked_out: self.checked_out.clone(),
            stashed_changes: self.stash.clone(),
        }
    }

    /// Run the whole protocol.
    ///
    /// # Errors
    ///
    /// Any [`UpgradeError`]. On error the repository is left exactly as the
    /// failing step left it; [`failed_in`](Self::failed_in) and
    /// [`last_stable`](Self::last_stable) describe where.
    pub fn run(&mut self, options: &UpgradeOptions) -> Result<UpgradeReport, UpgradeError> {
        match self.execute(options) {
            Ok(report) => {
                self.phase = Phase::Done;
                Ok(report)
            }
            Err(err) => {
                output::debug(
                    format!("upgrade failed during {}: {}", self.phase, err),
                    self.verbosity,
                );
                self.failed_in = Some(self.phase);
                self.phase = Phase::Failed;
                self.checked_out = self.git.head_branch().ok().flatten();
                Err(err)
            }
        }
    }

    fn enter(&mut self, phase: Phase) {
        output::debug(format!("phase: {phase}"), self.verbosity);
        self.phase = phase;
    }

    fn mark_stable(&mut self, branch: &BranchName, commit: Oid) {
        self.last_stable = Some(StablePoint {
            branch: branch.clone(),
            commit,
        });
    }

    fn execute(&mut self, options: &UpgradeOptions) -> Result<UpgradeReport, UpgradeError> {
        self.enter(Phase::Init);
        let base_branch = self.check_preconditions(options)?;
        let work_dir = self
            .git
            .work_dir()
            .during("locate working directory")?
            .to_path_buf();
        let store = MetadataStore::new(
            &work_dir,
            self.generator.metadata_file.as_str(),
            self.generator.package.as_str(),
        );

        self.enter(Phase::Resolving);
        let session = self.resolve(options, &store, base_branch)?;
        output::debug(
            format!(
                "upgrading '{}' from {} to {} via '{}'",
                session.base_branch,
                session.source_label(),
                session.target_label(),
                session.upgrade_branch
            ),
            self.verbosity,
        );

        let bootstrapped = !self.git.branch_exists(&session.upgrade_branch);
        if bootstrapped {
            self.bootstrap(&session, options, &work_dir, &store)?;
        }

        self.enter(Phase::Checkpointing);
        self.git
            .checkout(&session.upgrade_branch)
            .during("check out upgrade branch")?;
        self.clear_generated_files(&work_dir)?;
        self.copy_metadata_from(&session.base_branch, &store)?;

        self.enter(Phase::Regenerating);
        self.regenerate(Some(&session.target_version), options, &work_dir)?;
        let generation_commit = self
            .git
            .commit_all_except(
                &self.generator.generation_message(&session.target_label()),
                &self.ignored,
            )
            .during("commit regenerated project")?;
        output::debug(
            format!("generated {}", generation_commit.short(7)),
            self.verbosity,
        );

        self.enter(Phase::Merging);
        self.git
            .checkout(&session.base_branch)
            .during("check out base branch")?;
        let outcome = self
            .git
            .merge_no_ff(
                &session.upgrade_branch,
                &Generator::merge_message(&session.upgrade_branch),
            )
            .during("merge upgrade branch")?;
        if let MergeOutcome::Clean { merge_commit } = &outcome {
            if let Some(oid) = merge_commit {
                self.mark_stable(&session.base_branch, oid.clone());
            }
            self.restore_stashed_changes()?;
        }

        self.enter(Phase::Reporting);
        Ok(UpgradeReport {
            session,
            bootstrapped,
            generation_commit,
            outcome,
            stashed_changes: self.stash.clone(),
        })
    }

    fn check_preconditions(&mut self, options: &UpgradeOptions) -> Result<BranchName, UpgradeError> {
        let state = self.git.state();
        if state.is_in_progress() {
            return Err(UpgradeError::OperationInProgress {
                operation: state.to_string(),
            });
        }
        let upgrade_branch = self.generator.upgrade_branch()?;
        if self.git.is_head_unborn() {
            let head = self.git.head_branch().during("read HEAD")?;
            if head.as_ref() == Some(&upgrade_branch) {
                return Err(UpgradeError::InterruptedBootstrap {
                    branch: upgrade_branch.to_string(),
                });
            }
            return Err(UpgradeError::UnbornHead);
        }

        let base_branch = self
            .git
            .current_branch()
            .during("read current branch")?
            .ok_or(UpgradeError::DetachedHead)?;
        if base_branch == upgrade_branch {
            return Err(UpgradeError::OnUpgradeBranch {
                branch: upgrade_branch.to_string(),
            });
        }

        let status = self
            .git
            .worktree_status(true)
            .during("inspect working tree")?;
        if status.has_any_changes() {
            if !options.force {
                return Err(UpgradeError::DirtyWorkingTree {
                    status: status.describe(),
                });
            }
            self.stash = self
                .git
                .stash_changes(STASH_MESSAGE)
                .during("stash uncommitted changes")?;
            output::warn(
                format!(
                    "stashed uncommitted changes ({}); they are reapplied after a clean merge",
                    status.describe()
                ),
                self.verbosity,
            );
        }

        self.ignored = self.git.ignored_paths().during("list ignored files")?;
        let head = self.git.head_oid().during("read HEAD")?;
        self.mark_stable(&base_branch, head);
        Ok(base_branch)
    }

    fn resolve(
        &mut self,
        options: &UpgradeOptions,
        store: &MetadataStore,
        base_branch: BranchName,
    ) -> Result<UpgradeSession, UpgradeError> {
        let probe = VersionProbe::new(store.clone());
        let source_version = probe.resolve_source_version()?;
        let target_version = probe.resolve_target_version(&options.target, self.regenerator)?;

        Ok(UpgradeSession {
            source_version,
            target_version,
            base_branch,
            upgrade_branch: self.generator.upgrade_branch()?,
            use_version_placeholders: options.use_version_placeholders,
        })
    }

    /// Create the upgrade branch with the generator baseline and make that
    /// baseline an ancestor of the base branch without changing its tree.
    fn bootstrap(
        &mut self,
        session: &UpgradeSession,
        options: &UpgradeOptions,
        work_dir: &Path,
        store: &MetadataStore,
    ) -> Result<(), UpgradeError> {
        let start = self.find_initial_scaffold(&session.base_branch)?;
        match &start {
            Some(oid) => output::debug(
                format!("baseline starts from initial scaffold {}", oid.short(7)),
                self.verbosity,
            ),
            None => output::debug("no initial scaffold commit; baseline starts from HEAD", self.verbosity),
        }

        self.git
            .create_orphan_branch(&session.upgrade_branch, start.as_ref())
            .during("create upgrade branch")?;
        self.clear_generated_files(work_dir)?;
        self.copy_metadata_from(&session.base_branch, store)?;

        self.regenerate(session.source_version.as_ref(), options, work_dir)?;
        let baseline = self
            .git
            .commit_all_except(
                &self.generator.generation_message(&session.source_label()),
                &self.ignored,
            )
            .during("commit generator baseline")?;
        output::debug(format!("baseline {}", baseline.short(7)), self.verbosity);

        self.git
            .checkout(&session.base_branch)
            .during("check out base branch")?;
        let merge = self
            .git
            .merge_ours(
                &session.upgrade_branch,
                &Generator::merge_message(&session.upgrade_branch),
            )
            .during("record baseline merge")?;
        self.mark_stable(&session.base_branch, merge);
        Ok(())
    }

    /// Oldest first-parent commit on `branch` that recorded the initial scaffold.
    fn find_initial_scaffold(&self, branch: &BranchName) -> Result<Option<Oid>, UpgradeError> {
        let history = self
            .git
            .first_parent_history(branch)
            .during("walk base branch history")?;
        Ok(history
            .iter()
            .rev()
            .find(|commit| commit.summary.starts_with(INITIAL_SCAFFOLD_PREFIX))
            .map(|commit| commit.oid.clone()))
    }

    fn clear_generated_files(&self, work_dir: &Path) -> Result<(), UpgradeError> {
        let mut keep: Vec<&str> = vec![".git", self.generator.metadata_file.as_str()];
        keep.extend(self.generator.preserve.iter().map(String::as_str));
        let tracked = self.git.tracked_paths().during("list tracked files")?;
        clear_generated_files(work_dir, &tracked, &keep)
    }

    fn restore_stashed_changes(&mut self) -> Result<(), UpgradeError> {
        if self.stash.is_none() {
            return Ok(());
        }
        if self.git.restore_stash().during("reapply stashed changes")? {
            self.stash = None;
        } else {
            output::warn(
                "stashed changes collide with the upgrade; they stay in the stash",
                self.verbosity,
            );
        }
        Ok(())
    }

    fn copy_metadata_from(&self, branch: &BranchName, store: &MetadataStore) -> Result<(), UpgradeError> {
        let contents = self
            .git
            .read_file_at(branch, store.file_name())
            .during("read metadata from base branch")?;
        match contents {
            Some(bytes) => store.write_raw(&bytes)?,
            None => output::warn(
                format!(
                    "'{}' not found on '{}'; regenerating without it",
                    store.file_name(),
                    branch
                ),
                self.verbosity,
            ),
        }
        Ok(())
    }

    fn regenerate(
        &self,
        version: Option<&SemanticVersion>,
        options: &UpgradeOptions,
        work_dir: &Path,
    ) -> Result<(), UpgradeError> {
        output::debug(
            format!(
                "running {} at {}",
                self.generator.display_name,
                version.map_or_else(|| "installed version".to_string(), |v| v.to_string())
            ),
            self.verbosity,
        );
        let request = GenerationRequest {
            version,
            work_dir,
            metadata_file: &self.generator.metadata_file,
            use_version_placeholders: options.use_version_placeholders,
            silent: options.silent,
        };
        self.regenerator.generate(&request)?;
        Ok(())
    }
}

/// Remove the `tracked` paths from `work_dir`, except those whose first
/// component is in `keep`, then any directories that became empty.
///
/// Untracked and ignored files are never touched. Symlinks are removed, not
/// followed.
pub fn clear_generated_files(
    work_dir: &Path,
    tracked: &[String],
    keep: &[&str],
) -> Result<(), UpgradeError> {
    let workspace_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| UpgradeError::Workspace { path, source }
    };

    for relative in tracked {
        let first = relative.split('/').next().unwrap_or_default();
        if keep.contains(&first) {
            continue;
        }

        let path = work_dir.join(relative);
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(workspace_err(&path)(e)),
        };
        if metadata.is_dir() {
            fs::remove_dir_all(&path).map_err(workspace_err(&path))?;
        } else {
            fs::remove_file(&path).map_err(workspace_err(&path))?;
        }

        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir == work_dir || fs::remove_dir(dir).is_err() {
                break;
            }
            parent = dir.parent();
        }
    }
    Ok(())
}
