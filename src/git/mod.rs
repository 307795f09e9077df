//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. All repository reads and writes
//! flow through this interface. No other module should import `git2`.
//!
//! We use the `git2` crate exclusively (no shelling out to the git CLI).
//!
//! # Responsibilities
//!
//! - Repository discovery and opening
//! - Branch creation, orphan branches and checkout
//! - Commits, `ours` merges and no-fast-forward merges
//! - Status, conflict and state detection
//! - History queries (`log`, first-parent walks, tree reads)
//!
//! # Invariants
//!
//! - History is only appended to; nothing here rewrites or resets refs
//! - Merge conflicts come back as [`MergeOutcome::Conflicted`], read from the index
//! - All operations return strong types (Oid, BranchName)
//!
//! # Example
//!
//! ```ignore
//! use scaffold_upgrade::git::{Git, MergeOutcome};
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("."))?;
//! match git.merge_no_ff(&upgrade_branch, "Merge branch 'jhipster_upgrade'")? {
//!     MergeOutcome::Clean { .. } => println!("merged"),
//!     MergeOutcome::Conflicted { paths } => println!("{} conflicts", paths.len()),
//! }
//! ```

mod interface;

pub use interface::{
    CommitInfo, Git, GitError, GitState, MergeOutcome, RepoInfo, WorktreeStatus,
};
