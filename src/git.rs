//! Thin wrapper over the `git` executable for repository metadata and
//! incremental diff sets.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Branch and HEAD commit of a repository, embedded in artifact footers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoInfo {
    /// Current branch name; empty on a detached HEAD
    pub branch: String,
    /// Full HEAD commit hash
    pub commit: String,
}

/// Returns true if the root carries git metadata.
#[must_use]
pub fn is_repository(root: &Path) -> bool {
    root.join(".git").is_dir()
}

/// Reads branch and HEAD commit for footer metadata.
///
/// Returns `None` when the root is not a git repository or has no
/// commits yet; metadata embedding is best-effort, unlike the
/// incremental diff which must fail loudly.
#[must_use]
pub fn repo_info(root: &Path) -> Option<RepoInfo> {
    if !is_repository(root) {
        return None;
    }

    let commit = run_git(root, &["rev-parse", "HEAD"]).ok()?;
    let branch = run_git(root, &["branch", "--show-current"]).unwrap_or_default();

    Some(RepoInfo { branch, commit })
}

/// Returns the set of paths that differ between `base_commit` and the
/// current working state.
///
/// # Errors
///
/// Returns [`Error::Git`] if the root is not a repository or the
/// commit is unknown.
pub fn changed_paths(root: &Path, base_commit: &str) -> Result<Vec<String>> {
    if !is_repository(root) {
        return Err(Error::git(format!(
            "'{}' is not a git repository",
            root.display()
        )));
    }

    let output = run_git(root, &["diff", "--name-only", base_commit, "HEAD"])?;

    let paths: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(ToString::to_string)
        .collect();

    debug!(
        "{} paths changed since {} in {}",
        paths.len(),
        base_commit,
        root.display()
    );

    Ok(paths)
}

fn run_git(root: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(root)
        .args(args)
        .output()
        .map_err(|e| Error::git(format!("failed to execute git: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::git(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}


#[cfg(test)]
mod tests {
    use super::test_support::{commit_all, git_available, init_repo};
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_not_a_repository() {
        let temp = assert_fs::TempDir::new().unwrap();
        assert!(!is_repository(temp.path()));
        assert!(repo_info(temp.path()).is_none());
        assert!(changed_paths(temp.path(), "abcdef1").is_err());
    }

    #[test]
    fn test_repo_info_reads_head() {
        if !git_available() {
            return;
        }

        let temp = assert_fs::TempDir::new().unwrap();
        init_repo(temp.path());
        temp.child("a.txt").write_str("a").unwrap();
        let commit = commit_all(temp.path(), "initial");

        let info = repo_info(temp.path()).unwrap();
        assert_eq!(info.commit, commit);
        assert_eq!(commit.len(), 40);
    }

    #[test]
    fn test_changed_paths_between_commits() {
        if !git_available() {
            return;
        }

        let temp = assert_fs::TempDir::new().unwrap();
        init_repo(temp.path());
        temp.child("file1.txt").write_str("one").unwrap();
        temp.child("file2.txt").write_str("two").unwrap();
        let base = commit_all(temp.path(), "initial");

        temp.child("file1.txt").write_str("one changed").unwrap();
        temp.child("file3.txt").write_str("three").unwrap();
        commit_all(temp.path(), "second");

        let mut changed = changed_paths(temp.path(), &base).unwrap();
        changed.sort();
        assert_eq!(changed, vec!["file1.txt", "file3.txt"]);
    }

    #[test]
    fn test_unknown_commit_is_fatal() {
        if !git_available() {
            return;
        }

        let temp = assert_fs::TempDir::new().unwrap();
        init_repo(temp.path());
        temp.child("a.txt").write_str("a").unwrap();
        commit_all(temp.path(), "initial");

        let result = changed_paths(temp.path(), "deadbeefdeadbeefdeadbeefdeadbeefdeadbeef");
        assert!(matches!(result, Err(Error::Git { .. })));
    }
}
