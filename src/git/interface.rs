//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all repository operations.
//! Upper layers receive structured results ([`MergeOutcome`], [`CommitInfo`],
//! [`WorktreeStatus`]) and typed failures ([`GitError`]); they never parse
//! git output or conflict markers.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Not inside a Git repository
//! - [`GitError::RefNotFound`]: Requested ref does not exist
//! - [`GitError::BranchExists`]: Branch creation target already exists
//! - [`GitError::MissingIdentity`]: No `user.name` / `user.email` to sign commits
//!
//! # Commit timestamps
//!
//! Every commit written through this interface is dated strictly after the
//! newest commit the handle has observed (branch tips at open time, parents,
//! and its own earlier commits). Several commits made within one wall-clock
//! second therefore still sort in creation order under `git log`.
//!
//! # Example
//!
//! ```ignore
//! use scaffold_upgrade::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! let branch = git.current_branch()?.expect("on a branch");
//! println!("on {} at {}", branch, git.head_oid()?.short(7));
//! ```

use std::cell::Cell;
use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use thiserror::Error;

use crate::core::types::{BranchName, Oid, TypeError};

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not inside a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Branch to create already exists.
    #[error("branch already exists: {branch}")]
    BranchExists {
        /// The existing branch
        branch: String,
    },

    /// Object not found in repository.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// Invalid branch or ref name.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// No committer identity configured.
    #[error("cannot create commits without an identity (set user.name and user.email): {message}")]
    MissingIdentity {
        /// The underlying error message
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound | git2::ErrorCode::UnbornBranch => {
                if context.starts_with("refs/") || context == "HEAD" {
                    GitError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    GitError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::Exists => GitError::BranchExists {
                branch: context.to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: context.to_string(),
            },
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::InvalidOid {
                oid: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => GitError::InvalidOid { oid: msg },
            other => GitError::InvalidRefName {
                message: other.to_string(),
            },
        }
    }
}

/// Information about a Git repository.
#[derive(Debug, Clone)]
pub struct RepoInfo {
    /// Path to .git directory
    pub git_dir: PathBuf,
    /// Path to working directory
    pub work_dir: PathBuf,
}

/// State of in-progress Git operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitState {
    /// No operation in progress.
    Clean,
    /// Rebase in progress.
    Rebase,
    /// Merge in progress.
    Merge,
    /// Cherry-pick in progress.
    CherryPick,
    /// Revert in progress.
    Revert,
    /// Bisect in progress.
    Bisect,
    /// Apply mailbox in progress.
    ApplyMailbox,
}

impl GitState {
    /// Check if any operation is in progress.
    ///
    /// # Example
    ///
    /// ```
    /// use scaffold_upgrade::git::GitState;
    ///
    /// assert!(!GitState::Clean.is_in_progress());
    /// assert!(GitState::Merge.is_in_progress());
    /// ```
    pub fn is_in_progress(&self) -> bool {
        !matches!(self, GitState::Clean)
    }

    /// Get a human-readable description of the state.
    pub fn description(&self) -> &'static str {
        match self {
            GitState::Clean => "clean",
            GitState::Rebase => "rebase",
            GitState::Merge => "merge",
            GitState::CherryPick => "cherry-pick",
            GitState::Revert => "revert",
            GitState::Bisect => "bisect",
            GitState::ApplyMailbox => "apply-mailbox",
        }
    }
}

impl std::fmt::Display for GitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files (if requested)
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// No staged, unstaged or conflicted entries. Untracked files are ignored.
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }

    /// Anything at all that a commit-everything would pick up.
    pub fn has_any_changes(&self) -> bool {
        !self.is_clean() || self.untracked > 0
    }

    /// One-line description for error messages.
    pub fn describe(&self) -> String {
        let mut parts = Vec::new();
        if self.staged > 0 {
            parts.push(format!("{} staged", self.staged));
        }
        if self.unstaged > 0 {
            parts.push(format!("{} modified", self.unstaged));
        }
        if self.untracked > 0 {
            parts.push(format!("{} untracked", self.untracked));
        }
        if self.has_conflicts {
            parts.push("unresolved conflicts".to_string());
        }
        if parts.is_empty() {
            "clean".to_string()
        } else {
            parts.join(", ")
        }
    }
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitInfo {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Parent OIDs, first parent first
    pub parents: Vec<Oid>,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Commit timestamp
    pub time: chrono::DateTime<chrono::Utc>,
}

/// Result of merging a branch into the current branch.
///
/// Conflicts are read from the index and reported here, so callers never
/// inspect conflict markers on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The merge committed without conflicts. `merge_commit` is `None` when
    /// the branch was already fully merged and nothing was recorded.
    Clean {
        /// The new merge commit
        merge_commit: Option<Oid>,
    },
    /// The merge stopped with conflicts. The working tree holds conflict
    /// markers and the repository is in the merge state.
    Conflicted {
        /// Conflicting paths, sorted
        paths: Vec<String>,
    },
}

impl MergeOutcome {
    /// Whether the merge needs manual resolution.
    pub fn is_conflicted(&self) -> bool {
        matches!(self, MergeOutcome::Conflicted { .. })
    }
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. All repository
/// reads and writes flow through this interface. No other module should
/// import `git2` directly.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
    /// Newest commit time (seconds) observed or written by this handle
    clock_floor: Cell<i64>,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening and Info
    // =========================================================================

    /// Open a repository at the given path.
    ///
    /// Uses `git2::Repository::discover`, so `path` can be any directory
    /// within the repository.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if no repository is found
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::discover(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        let git = Self {
            repo,
            clock_floor: Cell::new(0),
        };
        git.clock_floor.set(git.newest_branch_time()?);
        Ok(git)
    }

    /// Get repository information (git_dir and work_dir paths).
    pub fn info(&self) -> Result<RepoInfo, GitError> {
        Ok(RepoInfo {
            git_dir: self.repo.path().to_path_buf(),
            work_dir: self.work_dir()?.to_path_buf(),
        })
    }

    /// Get direct access to the .git directory path.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    /// The working directory root.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    // =========================================================================
    // State Detection
    // =========================================================================

    /// Get the current Git state (rebase, merge, etc.).
    pub fn state(&self) -> GitState {
        match self.repo.state() {
            git2::RepositoryState::Clean => GitState::Clean,
            git2::RepositoryState::Rebase
            | git2::RepositoryState::RebaseInteractive
            | git2::RepositoryState::RebaseMerge
            | git2::RepositoryState::ApplyMailboxOrRebase => GitState::Rebase,
            git2::RepositoryState::Merge => GitState::Merge,
            git2::RepositoryState::CherryPick | git2::RepositoryState::CherryPickSequence => {
                GitState::CherryPick
            }
            git2::RepositoryState::Revert | git2::RepositoryState::RevertSequence => {
                GitState::Revert
            }
            git2::RepositoryState::Bisect => GitState::Bisect,
            git2::RepositoryState::ApplyMailbox => GitState::ApplyMailbox,
        }
    }

    /// Paths with unresolved conflicts in the index, sorted.
    pub fn conflicted_paths(&self) -> Result<Vec<String>, GitError> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        Self::collect_conflicts(&index)
    }

    fn collect_conflicts(index: &git2::Index) -> Result<Vec<String>, GitError> {
        let mut paths = Vec::new();
        for conflict in index.conflicts()? {
            let conflict = conflict?;
            let entry = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref());
            if let Some(entry) = entry {
                paths.push(String::from_utf8_lossy(&entry.path).into_owned());
            }
        }
        paths.sort();
        paths.dedup();
        Ok(paths)
    }

    // =========================================================================
    // Working Tree Status
    // =========================================================================

    /// Get working tree status summary.
    ///
    /// If `include_untracked` is false, untracked files are not counted.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .recurse_untracked_dirs(include_untracked)
            .include_ignored(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }

            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }

            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }

            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    /// Whether anything (staged, unstaged, untracked, conflicted) is pending.
    pub fn has_uncommitted_changes(&self) -> Result<bool, GitError> {
        Ok(self.worktree_status(true)?.has_any_changes())
    }

    /// Paths recorded in the index, sorted, relative to the working directory.
    ///
    /// Conflict stages are skipped; only merged entries are listed.
    pub fn tracked_paths(&self) -> Result<Vec<String>, GitError> {
        let mut index = self.repo.index()?;
        index.read(false)?;
        let mut paths: Vec<String> = index
            .iter()
            .filter(|entry| (entry.flags >> 12) & 0x3 == 0)
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned())
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Ignored files and directories in the working tree, sorted.
    ///
    /// An ignored directory is listed once, with a trailing `/`, rather than
    /// file by file.
    pub fn ignored_paths(&self) -> Result<Vec<String>, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(true)
            .include_ignored(true)
            .recurse_ignored_dirs(false);

        let statuses = self.repo.statuses(Some(&mut opts))?;
        let mut paths: Vec<String> = statuses
            .iter()
            .filter(|entry| entry.status().is_ignored())
            .filter_map(|entry| entry.path().map(str::to_string))
            .collect();
        paths.sort();
        Ok(paths)
    }

    // =========================================================================
    // Refs and Branches
    // =========================================================================

    /// Resolve a ref or branch name to a commit OID.
    pub fn resolve_ref(&self, refname: &str) -> Result<Oid, GitError> {
        let object = self
            .repo
            .revparse_single(refname)
            .map_err(|e| GitError::from_git2(e, refname))?;
        let commit = object
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, refname))?;
        Ok(Oid::new(commit.id().to_string())?)
    }

    /// Get HEAD commit OID.
    ///
    /// # Errors
    ///
    /// - [`GitError::RefNotFound`] if HEAD is unborn
    pub fn head_oid(&self) -> Result<Oid, GitError> {
        let commit = self.head_commit()?;
        Ok(Oid::new(commit.id().to_string())?)
    }

    fn head_commit(&self) -> Result<git2::Commit<'_>, GitError> {
        self.repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, "HEAD"))
    }

    /// Whether HEAD points at a branch with no commits yet.
    pub fn is_head_unborn(&self) -> bool {
        matches!(
            self.repo.head(),
            Err(ref e) if e.code() == git2::ErrorCode::UnbornBranch
        )
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None)
    }

    /// The branch HEAD points at, including a branch with no commits yet.
    ///
    /// Returns `None` if HEAD is detached.
    pub fn head_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = self
            .repo
            .find_reference("HEAD")
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;
        match head.symbolic_target().and_then(|t| t.strip_prefix("refs/heads/")) {
            Some(name) => Ok(Some(BranchName::new(name)?)),
            None => Ok(None),
        }
    }

    /// Check if a local branch exists.
    pub fn branch_exists(&self, branch: &BranchName) -> bool {
        self.repo.find_reference(&branch.refname()).is_ok()
    }

    /// Tip of a local branch, or `None` if it does not exist.
    pub fn branch_tip(&self, branch: &BranchName) -> Result<Option<Oid>, GitError> {
        match self.repo.find_reference(&branch.refname()) {
            Ok(reference) => {
                let commit = reference
                    .peel_to_commit()
                    .map_err(|e| GitError::from_git2(e, &branch.refname()))?;
                Ok(Some(Oid::new(commit.id().to_string())?))
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, &branch.refname())),
        }
    }

    /// Create a branch pointing at `from_ref` without checking it out.
    ///
    /// # Errors
    ///
    /// - [`GitError::BranchExists`] if the branch already exists
    pub fn create_branch(&self, name: &BranchName, from_ref: &str) -> Result<Oid, GitError> {
        if self.branch_exists(name) {
            return Err(GitError::BranchExists {
                branch: name.to_string(),
            });
        }
        let oid = self.resolve_ref(from_ref)?;
        let commit = self.find_commit(&oid)?;
        self.repo
            .branch(name.as_str(), &commit, false)
            .map_err(|e| GitError::from_git2(e, name.as_str()))?;
        Ok(oid)
    }

    /// Point HEAD at a new branch that has no history.
    ///
    /// With `start`, the index and working tree are first moved to that
    /// commit's tree; otherwise they keep their current contents. The next
    /// commit becomes the branch's root commit.
    ///
    /// # Errors
    ///
    /// - [`GitError::BranchExists`] if the branch already exists
    pub fn create_orphan_branch(&self, name: &BranchName, start: Option<&Oid>) -> Result<(), GitError> {
        if self.branch_exists(name) {
            return Err(GitError::BranchExists {
                branch: name.to_string(),
            });
        }

        if let Some(oid) = start {
            let commit = self.find_commit(oid)?;
            let mut opts = CheckoutBuilder::new();
            opts.safe();
            self.repo
                .checkout_tree(commit.as_object(), Some(&mut opts))
                .map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        }

        self.repo
            .set_head(&name.refname())
            .map_err(|e| GitError::from_git2(e, &name.refname()))?;
        Ok(())
    }

    /// Switch the working tree, index and HEAD to a local branch.
    ///
    /// Uses a safe checkout: local modifications that would be overwritten
    /// make the checkout fail instead of being discarded.
    pub fn checkout(&self, branch: &BranchName) -> Result<(), GitError> {
        let refname = branch.refname();
        let reference = self
            .repo
            .find_reference(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        let commit = reference
            .peel_to_commit()
            .map_err(|e| GitError::from_git2(e, &refname))?;

        let mut opts = CheckoutBuilder::new();
        opts.safe();
        self.repo
            .checkout_tree(commit.as_object(), Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, &refname))?;
        self.repo
            .set_head(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        Ok(())
    }

    // =========================================================================
    // Commits and Merges
    // =========================================================================

    /// Stage every change in the working tree (additions, modifications and
    /// deletions; ignored files excluded) and commit on HEAD.
    ///
    /// A commit is written even if nothing changed. On an unborn branch the
    /// commit has no parents.
    pub fn commit_all(&self, message: &str) -> Result<Oid, GitError> {
        self.commit_all_except(message, &[])
    }

    /// Like [`commit_all`](Self::commit_all), but leaves `excluded` out of
    /// the commit. An entry ending in `/` excludes everything below it.
    pub fn commit_all_except(&self, message: &str, excluded: &[String]) -> Result<Oid, GitError> {
        let mut skip = |path: &Path, _: &[u8]| -> i32 {
            if is_excluded(&path.to_string_lossy(), excluded) {
                1
            } else {
                0
            }
        };

        let mut index = self.repo.index()?;
        index.read(false)?;
        index.add_all(
            ["*"].iter(),
            git2::IndexAddOption::DEFAULT,
            Some(&mut skip as &mut git2::IndexMatchedPath<'_>),
        )?;
        index.update_all(["*"].iter(), Some(&mut skip as &mut git2::IndexMatchedPath<'_>))?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let parents = if self.is_head_unborn() {
            Vec::new()
        } else {
            vec![self.head_commit()?]
        };
        self.write_commit(message, &tree, &parents)
    }

    /// Record a merge of `branch` that keeps the current tree unchanged
    /// (the `ours` strategy).
    ///
    /// Afterwards `branch` is an ancestor of HEAD while no file changes.
    pub fn merge_ours(&self, branch: &BranchName, message: &str) -> Result<Oid, GitError> {
        let head = self.head_commit()?;
        let theirs = self.branch_commit(branch)?;
        let tree = head.tree()?;
        self.write_commit(message, &tree, &[head, theirs])
    }

    /// Merge `branch` into the current branch, always creating a merge
    /// commit when there is something to merge.
    ///
    /// On conflicts nothing is committed: the index keeps the conflict
    /// entries, the working tree keeps diff3-free conflict markers, and
    /// `MERGE_HEAD`/`MERGE_MSG` are left for `git commit` to finish.
    pub fn merge_no_ff(&self, branch: &BranchName, message: &str) -> Result<MergeOutcome, GitError> {
        let head = self.head_commit()?;
        let refname = branch.refname();
        let reference = self
            .repo
            .find_reference(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;
        let annotated = self.repo.reference_to_annotated_commit(&reference)?;

        let (analysis, _) = self.repo.merge_analysis(&[&annotated])?;
        if analysis.is_up_to_date() {
            return Ok(MergeOutcome::Clean { merge_commit: None });
        }

        let mut merge_opts = git2::MergeOptions::new();
        let mut checkout = CheckoutBuilder::new();
        checkout.safe().allow_conflicts(true).conflict_style_merge(true);
        self.repo
            .merge(&[&annotated], Some(&mut merge_opts), Some(&mut checkout))
            .map_err(|e| GitError::from_git2(e, &refname))?;

        let mut index = self.repo.index()?;
        index.read(false)?;

        if index.has_conflicts() {
            let paths = Self::collect_conflicts(&index)?;
            let merge_msg = self.repo.path().join("MERGE_MSG");
            std::fs::write(&merge_msg, format!("{message}\n")).map_err(|e| {
                GitError::AccessError {
                    message: format!("{}: {}", merge_msg.display(), e),
                }
            })?;
            return Ok(MergeOutcome::Conflicted { paths });
        }

        let tree = self.repo.find_tree(index.write_tree()?)?;
        let theirs = self.repo.find_commit(annotated.id())?;
        let oid = self.write_commit(message, &tree, &[head, theirs])?;
        self.repo.cleanup_state()?;

        Ok(MergeOutcome::Clean {
            merge_commit: Some(oid),
        })
    }

    fn branch_commit(&self, branch: &BranchName) -> Result<git2::Commit<'_>, GitError> {
        let refname = branch.refname();
        self.repo
            .find_reference(&refname)
            .and_then(|r| r.peel_to_commit())
            .map_err(|e| GitError::from_git2(e, &refname))
    }

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, GitError> {
        let git_oid =
            git2::Oid::from_str(oid.as_str()).map_err(|e| GitError::from_git2(e, oid.as_str()))?;
        self.repo
            .find_commit(git_oid)
            .map_err(|e| GitError::from_git2(e, oid.as_str()))
    }

    fn write_commit(
        &self,
        message: &str,
        tree: &git2::Tree<'_>,
        parents: &[git2::Commit<'_>],
    ) -> Result<Oid, GitError> {
        let identity = self
            .repo
            .signature()
            .map_err(|e| GitError::MissingIdentity {
                message: e.message().to_string(),
            })?;

        let floor = parents
            .iter()
            .map(|p| p.time().seconds())
            .chain(std::iter::once(self.clock_floor.get()))
            .max()
            .unwrap_or(0);
        let now = chrono::Utc::now().timestamp();
        let seconds = if now > floor { now } else { floor + 1 };
        let time = git2::Time::new(seconds, identity.when().offset_minutes());

        let name = identity.name().unwrap_or_default();
        let email = identity.email().unwrap_or_default();
        let signature =
            git2::Signature::new(name, email, &time).map_err(|e| GitError::MissingIdentity {
                message: e.message().to_string(),
            })?;

        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        let oid = self
            .repo
            .commit(
                Some("HEAD"),
                &signature,
                &signature,
                message,
                tree,
                &parent_refs,
            )
            .map_err(|e| GitError::from_git2(e, "HEAD"))?;

        self.clock_floor.set(seconds);
        Ok(Oid::new(oid.to_string())?)
    }

    fn newest_branch_time(&self) -> Result<i64, GitError> {
        let mut newest = 0;
        for branch in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = branch?;
            if let Ok(commit) = branch.get().peel_to_commit() {
                newest = newest.max(commit.time().seconds());
            }
        }
        Ok(newest)
    }

    // =========================================================================
    // Stash
    // =========================================================================

    /// Move uncommitted changes, untracked files included, into a new stash
    /// entry and leave the working tree clean.
    ///
    /// Returns `None` when there was nothing to stash.
    pub fn stash_changes(&self, message: &str) -> Result<Option<Oid>, GitError> {
        let stasher = self
            .repo
            .signature()
            .map_err(|e| GitError::MissingIdentity {
                message: e.message().to_string(),
            })?;
        let mut repo = self.reopen()?;
        match repo.stash_save(
            &stasher,
            message,
            Some(git2::StashFlags::INCLUDE_UNTRACKED),
        ) {
            Ok(oid) => Ok(Some(Oid::new(oid.to_string())?)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, "refs/stash")),
        }
    }

    /// Reapply the newest stash entry and drop it.
    ///
    /// Returns `false`, leaving the entry and the working tree untouched,
    /// when the stashed changes collide with the working tree.
    pub fn restore_stash(&self) -> Result<bool, GitError> {
        let mut repo = self.reopen()?;
        match repo.stash_pop(0, None) {
            Ok(()) => Ok(true),
            Err(e)
                if matches!(
                    e.code(),
                    git2::ErrorCode::Conflict
                        | git2::ErrorCode::MergeConflict
                        | git2::ErrorCode::Exists
                ) =>
            {
                Ok(false)
            }
            Err(e) => Err(GitError::from_git2(e, "refs/stash")),
        }
    }

    /// A second handle on the same repository, for git2 calls that need
    /// `&mut Repository`.
    fn reopen(&self) -> Result<git2::Repository, GitError> {
        git2::Repository::open(self.repo.path()).map_err(|e| GitError::AccessError {
            message: format!("{}: {}", self.repo.path().display(), e.message()),
        })
    }

    // =========================================================================
    // History
    // =========================================================================

    /// Get information about a commit.
    pub fn commit_info(&self, oid: &Oid) -> Result<CommitInfo, GitError> {
        let commit = self.find_commit(oid)?;
        Self::to_commit_info(&commit)
    }

    fn to_commit_info(commit: &git2::Commit<'_>) -> Result<CommitInfo, GitError> {
        let author = commit.author();
        let time =
            chrono::DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default();

        let mut parents = Vec::new();
        for id in commit.parent_ids() {
            parents.push(Oid::new(id.to_string())?);
        }

        Ok(CommitInfo {
            oid: Oid::new(commit.id().to_string())?,
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            parents,
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            time,
        })
    }

    /// Commits along the first-parent chain of `branch`, newest first.
    pub fn first_parent_history(&self, branch: &BranchName) -> Result<Vec<CommitInfo>, GitError> {
        let tip = self.branch_commit(branch)?;
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip.id())?;
        revwalk.simplify_first_parent()?;

        let mut history = Vec::new();
        for id in revwalk {
            let commit = self.repo.find_commit(id?)?;
            history.push(Self::to_commit_info(&commit)?);
        }
        Ok(history)
    }

    /// Number of commits reachable from HEAD (`git rev-list --count HEAD`).
    pub fn rev_count(&self) -> Result<usize, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        let mut count = 0;
        for id in revwalk {
            id?;
            count += 1;
        }
        Ok(count)
    }

    /// Render every commit reachable from HEAD with a `git log --pretty`
    /// style format, newest first by commit date.
    ///
    /// Supported placeholders: `%H`, `%h`, `%s`, `%an`, `%ae`, `%P`, `%n`,
    /// `%%`. Anything else is copied through.
    pub fn log(&self, format: &str) -> Result<Vec<String>, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.set_sorting(git2::Sort::TIME)?;
        revwalk.push_head()?;

        let mut lines = Vec::new();
        for id in revwalk {
            let commit = self.repo.find_commit(id?)?;
            lines.push(format_commit(&Self::to_commit_info(&commit)?, format));
        }
        Ok(lines)
    }

    // =========================================================================
    // Tree Reads
    // =========================================================================

    /// Contents of `path` in the tree at the tip of `branch`, or `None` if
    /// the file is not in that tree.
    pub fn read_file_at(&self, branch: &BranchName, path: &str) -> Result<Option<Vec<u8>>, GitError> {
        let tree = self.branch_commit(branch)?.tree()?;
        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(GitError::from_git2(e, path)),
        };
        let object = entry.to_object(&self.repo)?;
        match object.as_blob() {
            Some(blob) => Ok(Some(blob.content().to_vec())),
            None => Ok(None),
        }
    }
}

/// Whether `path` is one of `excluded` or lies below an excluded directory.
fn is_excluded(path: &str, excluded: &[String]) -> bool {
    excluded.iter().any(|entry| match entry.strip_suffix('/') {
        Some(dir) => path == dir || path.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/')),
        None => path == entry,
    })
}

/// Expand a `--pretty=format:` string for one commit.
fn format_commit(info: &CommitInfo, format: &str) -> String {
    let mut out = String::with_capacity(format.len() + info.summary.len());
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('H') => out.push_str(info.oid.as_str()),
            Some('h') => out.push_str(info.oid.short(7)),
            Some('s') => out.push_str(&info.summary),
            Some('P') => {
                let parents: Vec<&str> = info.parents.iter().map(|p| p.as_str()).collect();
                out.push_str(&parents.join(" "));
            }
            Some('n') => out.push('\n'),
            Some('%') => out.push('%'),
            Some('a') => match chars.peek() {
                Some('n') => {
                    chars.next();
                    out.push_str(&info.author_name);
                }
                Some('e') => {
                    chars.next();
                    out.push_str(&info.author_email);
                }
                _ => out.push_str("%a"),
            },
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }

    out
}
