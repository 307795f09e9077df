//! Integration tests for the Git interface.
//!
//! These tests use real git repositories created via tempfile to verify
//! that the Git interface works correctly with actual git operations.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;

use scaffold_upgrade::core::types::{BranchName, Oid};
use scaffold_upgrade::git::{Git, GitError, GitState, MergeOutcome};

/// Test fixture that creates a real git repository.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository with an initial commit on main.
    fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");

        run_git(dir.path(), &["init", "-b", "main"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["config", "user.name", "Test User"]);
        run_git(dir.path(), &["config", "commit.gpgsign", "false"]);

        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);

        Self { dir }
    }

    /// Get the path to the repository.
    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Open a Git interface to this repository.
    fn git(&self) -> Git {
        Git::open(self.path()).expect("failed to open test repo")
    }

    /// Write a file relative to the repository root.
    fn write(&self, path: &str, content: &str) {
        let full = self.path().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full, content).unwrap();
    }

    /// Create a file and commit it with the git CLI.
    fn commit_file(&self, path: &str, content: &str, message: &str) {
        self.write(path, content);
        run_git(self.path(), &["add", path]);
        run_git(self.path(), &["commit", "-m", message]);
    }

    /// Run git and return trimmed stdout.
    fn git_output(&self, args: &[&str]) -> String {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.path())
            .output()
            .expect("git command failed");
        String::from_utf8(output.stdout).unwrap().trim().to_string()
    }
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

// =============================================================================
// Repository Opening Tests
// =============================================================================

#[test]
fn open_valid_repository() {
    let repo = TestRepo::new();
    assert!(Git::open(repo.path()).is_ok());
}

#[test]
fn open_from_subdirectory() {
    let repo = TestRepo::new();
    let subdir = repo.path().join("subdir");
    std::fs::create_dir(&subdir).unwrap();

    assert!(Git::open(&subdir).is_ok());
}

#[test]
fn open_non_repository_fails() {
    let dir = TempDir::new().unwrap();
    let git = Git::open(dir.path());
    assert!(matches!(git, Err(GitError::NotARepo { .. })));
}

#[test]
fn repo_info() {
    let repo = TestRepo::new();
    let info = repo.git().info().unwrap();

    assert!(info.git_dir.ends_with(".git"));
    // Use canonicalize to handle macOS /var -> /private/var symlink
    let expected = repo.path().canonicalize().unwrap();
    assert_eq!(info.work_dir.canonicalize().unwrap(), expected);
}

// =============================================================================
// Refs and Branches
// =============================================================================

#[test]
fn head_oid_matches_git() {
    let repo = TestRepo::new();
    let oid = repo.git().head_oid().unwrap();
    assert_eq!(oid.as_str(), repo.git_output(&["rev-parse", "HEAD"]));
}

#[test]
fn resolve_ref_not_found() {
    let repo = TestRepo::new();
    let result = repo.git().resolve_ref("refs/heads/nonexistent");
    assert!(matches!(result, Err(GitError::RefNotFound { .. })));
}

#[test]
fn current_branch_and_detached_head() {
    let repo = TestRepo::new();
    assert_eq!(repo.git().current_branch().unwrap(), Some(branch("main")));

    run_git(repo.path(), &["checkout", "--detach"]);
    assert_eq!(repo.git().current_branch().unwrap(), None);
}

#[test]
fn create_branch_and_refuse_duplicate() {
    let repo = TestRepo::new();
    let git = repo.git();

    let oid = git.create_branch(&branch("feature"), "HEAD").unwrap();
    assert!(git.branch_exists(&branch("feature")));
    assert_eq!(git.branch_tip(&branch("feature")).unwrap(), Some(oid));
    assert_eq!(git.branch_tip(&branch("missing")).unwrap(), None);

    let again = git.create_branch(&branch("feature"), "HEAD");
    assert!(matches!(again, Err(GitError::BranchExists { .. })));
}

#[test]
fn checkout_switches_tree_and_head() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["branch", "other"]);
    repo.commit_file("main-only.txt", "main\n", "Main change");

    let git = repo.git();
    git.checkout(&branch("other")).unwrap();

    assert_eq!(git.current_branch().unwrap(), Some(branch("other")));
    assert!(!repo.path().join("main-only.txt").exists());

    git.checkout(&branch("main")).unwrap();
    assert!(repo.path().join("main-only.txt").exists());
}

// =============================================================================
// State and Status
// =============================================================================

#[test]
fn clean_repository_state() {
    let repo = TestRepo::new();
    let git = repo.git();
    assert_eq!(git.state(), GitState::Clean);
    assert!(!git.has_uncommitted_changes().unwrap());
}

#[test]
fn untracked_files_count_as_changes() {
    let repo = TestRepo::new();
    repo.write("notes.txt", "scratch\n");

    let git = repo.git();
    let status = git.worktree_status(true).unwrap();
    assert_eq!(status.untracked, 1);
    assert!(git.has_uncommitted_changes().unwrap());
    assert!(git.worktree_status(false).unwrap().is_clean());
}

#[test]
fn modified_and_staged_files_detected() {
    let repo = TestRepo::new();
    repo.write("README.md", "# Changed\n");
    repo.write("staged.txt", "staged\n");
    run_git(repo.path(), &["add", "staged.txt"]);

    let status = repo.git().worktree_status(false).unwrap();
    assert_eq!(status.unstaged, 1);
    assert_eq!(status.staged, 1);
}

#[test]
fn ignored_files_are_not_changes() {
    let repo = TestRepo::new();
    repo.commit_file(".gitignore", "node_modules\n", "Ignore deps");
    repo.write("node_modules/pkg/index.js", "");

    assert!(!repo.git().has_uncommitted_changes().unwrap());
}

#[test]
fn tracked_and_ignored_paths() {
    let repo = TestRepo::new();
    repo.commit_file(".gitignore", ".env\ntarget\n", "Ignore local files");
    repo.commit_file("src/lib.rs", "", "Add lib");
    repo.write(".env", "TOKEN=1\n");
    repo.write("target/debug/app", "");
    repo.write("notes.txt", "scratch\n");

    let git = repo.git();
    assert_eq!(
        git.tracked_paths().unwrap(),
        vec![".gitignore", "README.md", "src/lib.rs"]
    );
    assert_eq!(git.ignored_paths().unwrap(), vec![".env", "target/"]);
}

#[test]
fn head_branch_names_unborn_branch() {
    let repo = TestRepo::new();
    let git = repo.git();
    assert_eq!(git.head_branch().unwrap(), Some(branch("main")));

    git.create_orphan_branch(&branch("upgrade"), None).unwrap();
    assert!(git.is_head_unborn());
    assert_eq!(git.current_branch().unwrap(), None);
    assert_eq!(git.head_branch().unwrap(), Some(branch("upgrade")));

    run_git(repo.path(), &["checkout", "-f", "main"]);
    run_git(repo.path(), &["checkout", "--detach"]);
    assert_eq!(repo.git().head_branch().unwrap(), None);
}

// =============================================================================
// Commits
// =============================================================================

#[test]
fn commit_all_stages_additions_modifications_and_deletions() {
    let repo = TestRepo::new();
    repo.commit_file("old.txt", "old\n", "Add old");

    std::fs::remove_file(repo.path().join("old.txt")).unwrap();
    repo.write("README.md", "# Rewritten\n");
    repo.write("src/new.txt", "new\n");

    let git = repo.git();
    let oid = git.commit_all("Regenerate").unwrap();

    assert_eq!(git.head_oid().unwrap(), oid);
    assert!(!git.has_uncommitted_changes().unwrap());
    assert_eq!(
        repo.git_output(&["ls-tree", "-r", "--name-only", "HEAD"]),
        "README.md\nsrc/new.txt"
    );
}

#[test]
fn commit_all_except_leaves_excluded_paths_untracked() {
    let repo = TestRepo::new();
    repo.write(".env", "TOKEN=1\n");
    repo.write("target/debug/app", "");
    repo.write("src/main.rs", "fn main() {}\n");

    let git = repo.git();
    git.commit_all_except("Generated", &[".env".to_string(), "target/".to_string()])
        .unwrap();

    assert_eq!(
        repo.git_output(&["ls-tree", "-r", "--name-only", "HEAD"]),
        "README.md\nsrc/main.rs"
    );
    assert!(repo.path().join(".env").exists());
    assert_eq!(
        repo.git_output(&["status", "--porcelain"]),
        "?? .env\n?? target/"
    );
}

#[test]
fn commit_all_allows_empty_commits() {
    let repo = TestRepo::new();
    let git = repo.git();
    let before = git.head_oid().unwrap();

    let oid = git.commit_all("Nothing changed").unwrap();

    let info = git.commit_info(&oid).unwrap();
    assert_eq!(info.parents, vec![before.clone()]);
    assert_eq!(
        repo.git_output(&["rev-parse", "HEAD^{tree}"]),
        repo.git_output(&["rev-parse", &format!("{}^{{tree}}", before)])
    );
}

#[test]
fn commits_get_strictly_increasing_timestamps() {
    let repo = TestRepo::new();
    let git = repo.git();

    let first = git.commit_all("one").unwrap();
    let second = git.commit_all("two").unwrap();
    let third = git.commit_all("three").unwrap();

    let t1 = git.commit_info(&first).unwrap().time;
    let t2 = git.commit_info(&second).unwrap().time;
    let t3 = git.commit_info(&third).unwrap().time;
    assert!(t1 < t2 && t2 < t3);

    assert_eq!(
        repo.git_output(&["log", "--pretty=format:%s"]),
        "three\ntwo\none\nInitial commit"
    );
}

#[test]
fn orphan_branch_root_commit_from_start_tree() {
    let repo = TestRepo::new();
    let start = repo.git().head_oid().unwrap();
    repo.commit_file("later.txt", "later\n", "Later change");

    let git = repo.git();
    git.create_orphan_branch(&branch("upgrade"), Some(&start))
        .unwrap();
    assert!(git.is_head_unborn());
    assert!(!repo.path().join("later.txt").exists());

    repo.write("generated.txt", "generated\n");
    let root = git.commit_all("Generated").unwrap();

    let info = git.commit_info(&root).unwrap();
    assert!(info.parents.is_empty());
    assert_eq!(git.current_branch().unwrap(), Some(branch("upgrade")));
    assert_eq!(
        repo.git_output(&["ls-tree", "-r", "--name-only", "upgrade"]),
        "README.md\ngenerated.txt"
    );
}

#[test]
fn orphan_branch_refuses_existing_name() {
    let repo = TestRepo::new();
    let result = repo.git().create_orphan_branch(&branch("main"), None);
    assert!(matches!(result, Err(GitError::BranchExists { .. })));
}

// =============================================================================
// Stash
// =============================================================================

#[test]
fn stash_sets_aside_and_restores_changes() {
    let repo = TestRepo::new();
    repo.write("README.md", "# Edited\n");
    repo.write("notes.txt", "scratch\n");

    let git = repo.git();
    let stash = git.stash_changes("before upgrade").unwrap().unwrap();
    assert!(!git.has_uncommitted_changes().unwrap());
    assert!(!repo.path().join("notes.txt").exists());
    assert_eq!(repo.git_output(&["rev-parse", "stash@{0}"]), stash.as_str());

    assert!(git.restore_stash().unwrap());
    assert_eq!(
        std::fs::read_to_string(repo.path().join("README.md")).unwrap(),
        "# Edited\n"
    );
    assert!(repo.path().join("notes.txt").exists());
    assert_eq!(repo.git_output(&["stash", "list"]), "");
}

#[test]
fn stash_with_nothing_to_save() {
    let repo = TestRepo::new();
    assert_eq!(repo.git().stash_changes("nothing").unwrap(), None);
}

#[test]
fn colliding_stash_is_kept() {
    let repo = TestRepo::new();
    repo.write("README.md", "# Mine\n");
    let git = repo.git();
    git.stash_changes("before upgrade").unwrap().unwrap();

    repo.write("README.md", "# Theirs\n");
    assert!(!git.restore_stash().unwrap());
    assert_eq!(
        std::fs::read_to_string(repo.path().join("README.md")).unwrap(),
        "# Theirs\n"
    );
    assert_eq!(repo.git_output(&["stash", "list"]).lines().count(), 1);
}

// =============================================================================
// Merges
// =============================================================================

#[test]
fn merge_ours_keeps_tree_and_records_ancestry() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["checkout", "-b", "side"]);
    repo.commit_file("side.txt", "side\n", "Side work");
    run_git(repo.path(), &["checkout", "main"]);

    let git = repo.git();
    let head_before = git.head_oid().unwrap();
    let tree_before = repo.git_output(&["rev-parse", "HEAD^{tree}"]);

    let merge = git.merge_ours(&branch("side"), "Merge branch 'side'").unwrap();

    let info = git.commit_info(&merge).unwrap();
    assert_eq!(info.parents.len(), 2);
    assert_eq!(info.parents[0], head_before);
    assert_eq!(info.summary, "Merge branch 'side'");
    assert_eq!(repo.git_output(&["rev-parse", "HEAD^{tree}"]), tree_before);
    assert!(!repo.path().join("side.txt").exists());
    assert!(!git.has_uncommitted_changes().unwrap());
}

#[test]
fn merge_no_ff_clean_creates_merge_commit() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["checkout", "-b", "side"]);
    repo.commit_file("side.txt", "side\n", "Side work");
    run_git(repo.path(), &["checkout", "main"]);

    let git = repo.git();
    let head_before = git.head_oid().unwrap();
    let outcome = git.merge_no_ff(&branch("side"), "Merge branch 'side'").unwrap();

    let merge = match outcome {
        MergeOutcome::Clean {
            merge_commit: Some(oid),
        } => oid,
        other => panic!("expected clean merge, got {other:?}"),
    };
    let info = git.commit_info(&merge).unwrap();
    assert_eq!(info.parents[0], head_before);
    assert_eq!(info.parents[1], git.branch_tip(&branch("side")).unwrap().unwrap());
    assert!(repo.path().join("side.txt").exists());
    assert_eq!(git.state(), GitState::Clean);
}

#[test]
fn merge_no_ff_already_merged_is_noop() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["branch", "side"]);

    let git = repo.git();
    let head_before = git.head_oid().unwrap();
    let outcome = git.merge_no_ff(&branch("side"), "Merge branch 'side'").unwrap();

    assert_eq!(outcome, MergeOutcome::Clean { merge_commit: None });
    assert_eq!(git.head_oid().unwrap(), head_before);
}

#[test]
fn merge_no_ff_conflict_leaves_markers_and_state() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["checkout", "-b", "side"]);
    repo.commit_file("README.md", "# Side\n", "Side edit");
    repo.commit_file("side-only.txt", "side\n", "Side file");
    run_git(repo.path(), &["checkout", "main"]);
    repo.commit_file("README.md", "# Main\n", "Main edit");

    let git = repo.git();
    let head_before = git.head_oid().unwrap();
    let outcome = git.merge_no_ff(&branch("side"), "Merge branch 'side'").unwrap();

    assert_eq!(
        outcome,
        MergeOutcome::Conflicted {
            paths: vec!["README.md".to_string()]
        }
    );
    assert_eq!(git.head_oid().unwrap(), head_before);
    assert_eq!(git.state(), GitState::Merge);
    assert_eq!(git.conflicted_paths().unwrap(), vec!["README.md".to_string()]);

    let readme = std::fs::read_to_string(repo.path().join("README.md")).unwrap();
    assert!(readme.contains("<<<<<<<"));
    assert!(readme.contains(">>>>>>>"));
    assert!(repo.path().join("side-only.txt").exists());
    assert_eq!(
        repo.git_output(&["diff", "--name-only", "--diff-filter=U"]),
        "README.md"
    );

    // The developer can finish the merge with plain git.
    repo.write("README.md", "# Resolved\n");
    run_git(repo.path(), &["add", "README.md"]);
    run_git(repo.path(), &["commit", "--no-edit"]);
    assert_eq!(
        repo.git_output(&["log", "-1", "--pretty=format:%s"]),
        "Merge branch 'side'"
    );
}

// =============================================================================
// History
// =============================================================================

#[test]
fn log_matches_git_cli() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "a\n", "Add a");
    repo.commit_file("b.txt", "b\n", "Add b");

    let git = repo.git();
    assert_eq!(
        git.log("%H %s").unwrap().join("\n"),
        repo.git_output(&["log", "--pretty=format:%H %s"])
    );
    assert_eq!(
        git.log("%an <%ae>").unwrap()[0],
        "Test User <test@example.com>"
    );
}

#[test]
fn rev_count_matches_git_cli() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "a\n", "Add a");

    let count = repo.git().rev_count().unwrap();
    assert_eq!(count, 2);
    assert_eq!(
        repo.git_output(&["rev-list", "--count", "HEAD"]),
        count.to_string()
    );
}

#[test]
fn first_parent_history_is_newest_first() {
    let repo = TestRepo::new();
    repo.commit_file("a.txt", "a\n", "Add a");

    let history = repo.git().first_parent_history(&branch("main")).unwrap();
    let summaries: Vec<&str> = history.iter().map(|c| c.summary.as_str()).collect();
    assert_eq!(summaries, vec!["Add a", "Initial commit"]);
}

#[test]
fn read_file_at_branch_tip() {
    let repo = TestRepo::new();
    repo.commit_file("config/app.json", "{}\n", "Add config");
    repo.write("config/app.json", "{ \"dirty\": true }\n");

    let git = repo.git();
    assert_eq!(
        git.read_file_at(&branch("main"), "config/app.json").unwrap(),
        Some(b"{}\n".to_vec())
    );
    assert_eq!(git.read_file_at(&branch("main"), "missing.txt").unwrap(), None);
}

#[test]
fn commit_info_fields() {
    let repo = TestRepo::new();
    let git = repo.git();
    let oid: Oid = git.head_oid().unwrap();

    let info = git.commit_info(&oid).unwrap();
    assert_eq!(info.summary, "Initial commit");
    assert_eq!(info.author_name, "Test User");
    assert_eq!(info.author_email, "test@example.com");
    assert!(info.parents.is_empty());
}
