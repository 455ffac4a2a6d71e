//! Git integration for capturing the state of the changeset under review.

use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};

use crate::error::{GateError, Result};

/// Point-in-time snapshot of the repository state a run operates on.
///
/// Captured once at context construction and never refreshed mid-run, so
/// every check observes the same changeset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsSnapshot {
    /// Name of the checked-out branch.
    pub current_branch: String,

    /// Base reference the diff is computed against.
    pub base_ref: String,

    /// Latest commit message.
    pub commit_message: String,

    /// Paths changed between base and head.
    pub changed_files: Vec<PathBuf>,

    /// Raw unified diff with zero context lines.
    pub diff_text: String,

    /// Whether the run is happening inside a CI environment.
    pub is_ci: bool,

    /// Whether the working tree has uncommitted changes.
    pub has_uncommitted_changes: bool,
}

fn run_git(repo_dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| GateError::Vcs(format!("failed to run git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GateError::Vcs(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Current branch name (`git rev-parse --abbrev-ref HEAD`).
pub fn current_branch(repo_dir: &Path) -> Result<String> {
    let out = run_git(repo_dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let branch = out.trim().to_string();
    if branch.is_empty() {
        return Err(GateError::Vcs(
            "git rev-parse returned an empty branch name".to_string(),
        ));
    }
    Ok(branch)
}

/// Paths changed between `base` and HEAD.
pub fn changed_files(repo_dir: &Path, base: &str) -> Result<Vec<PathBuf>> {
    let out = run_git(repo_dir, &["diff", "--name-only", base, "HEAD"])?;
    Ok(out
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Unified diff between `base` and HEAD with zero context lines.
pub fn unified_diff(repo_dir: &Path, base: &str) -> Result<String> {
    run_git(repo_dir, &["diff", "--unified=0", base, "HEAD"])
}

/// Latest commit message (subject and body).
pub fn last_commit_message(repo_dir: &Path) -> Result<String> {
    let out = run_git(repo_dir, &["log", "-1", "--format=%B"])?;
    Ok(out.trim().to_string())
}

/// Whether the working tree differs from HEAD.
pub fn has_uncommitted_changes(repo_dir: &Path) -> Result<bool> {
    let out = run_git(repo_dir, &["status", "--porcelain"])?;
    Ok(!out.trim().is_empty())
}

impl VcsSnapshot {
    /// Capture all repository state for the run in one pass.
    pub fn capture(repo_dir: &Path, base_ref: &str, is_ci: bool) -> Result<Self> {
        Ok(Self {
            current_branch: current_branch(repo_dir)?,
            base_ref: base_ref.to_string(),
            commit_message: last_commit_message(repo_dir)?,
            changed_files: changed_files(repo_dir, base_ref)?,
            diff_text: unified_diff(repo_dir, base_ref)?,
            is_ci,
            has_uncommitted_changes: has_uncommitted_changes(repo_dir)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command as StdCommand;

    fn git(repo_dir: &Path, args: &[&str]) {
        let output = StdCommand::new("git")
            .args(args)
            .current_dir(repo_dir)
            .output()
            .unwrap();
        assert!(
            output.status.success(),
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    fn make_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "-b", "main"]);
        git(dir.path(), &["config", "user.name", "test-user"]);
        git(dir.path(), &["config", "user.email", "test@example.com"]);
        git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[test]
    fn current_branch_returns_main() {
        let repo = make_repo();
        assert_eq!(current_branch(repo.path()).unwrap(), "main");
    }

    #[test]
    fn changed_files_lists_committed_change() {
        let repo = make_repo();
        std::fs::write(repo.path().join("src.rs"), "fn main() {}\n").unwrap();
        git(repo.path(), &["add", "."]);
        git(repo.path(), &["commit", "-m", "add src"]);
        let files = changed_files(repo.path(), "HEAD~1").unwrap();
        assert_eq!(files, vec![PathBuf::from("src.rs")]);
    }

    #[test]
    fn unified_diff_uses_zero_context() {
        let repo = make_repo();
        std::fs::write(repo.path().join("a.txt"), "one\ntwo\nthree\n").unwrap();
        git(repo.path(), &["add", "."]);
        git(repo.path(), &["commit", "-m", "add a"]);
        std::fs::write(repo.path().join("a.txt"), "one\nTWO\nthree\n").unwrap();
        git(repo.path(), &["add", "."]);
        git(repo.path(), &["commit", "-m", "edit a"]);
        let diff = unified_diff(repo.path(), "HEAD~1").unwrap();
        assert!(diff.contains("@@ -2 +2 @@") || diff.contains("@@ -2,1 +2,1 @@"));
        // Zero context: unchanged lines must not appear as context.
        assert!(!diff.contains("\n one"));
    }

    #[test]
    fn dirty_tree_detected() {
        let repo = make_repo();
        assert!(!has_uncommitted_changes(repo.path()).unwrap());
        std::fs::write(repo.path().join("wip.txt"), "wip").unwrap();
        assert!(has_uncommitted_changes(repo.path()).unwrap());
    }

    #[test]
    fn capture_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(VcsSnapshot::capture(dir.path(), "main", false).is_err());
    }
}
