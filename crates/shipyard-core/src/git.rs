//! Git integration for resolving the checkout a pipeline runs against.

use std::path::Path;
use std::process::Command;

use crate::error::{CoreError, Result};

/// The source-control reference currently checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefInfo {
    /// Branch or tag name.
    pub name: String,

    /// Whether `name` is a tag rather than a branch.
    pub is_tag: bool,
}

fn git_output(repo_dir: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .map_err(|e| CoreError::GitError(format!("failed to run git: {e}")))
}

/// Capture the HEAD commit SHA from a git repository.
///
/// Runs `git rev-parse HEAD` in the given directory. Returns an error if the
/// directory is not inside a git repository or if git is not available.
pub fn capture_head_sha(repo_dir: &Path) -> Result<String> {
    let output = git_output(repo_dir, &["rev-parse", "HEAD"])?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(CoreError::GitError(format!(
            "git rev-parse HEAD failed: {stderr}"
        )));
    }

    let sha = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if sha.is_empty() {
        return Err(CoreError::GitError(
            "git rev-parse HEAD returned empty output".to_string(),
        ));
    }

    Ok(sha)
}

/// Resolve the reference HEAD points at.
///
/// A tag pointing exactly at HEAD wins over the branch name, so a tagged
/// release commit checked out on a branch is reported as the tag.
pub fn current_ref(repo_dir: &Path) -> Result<RefInfo> {
    let tag = git_output(repo_dir, &["describe", "--tags", "--exact-match", "HEAD"])?;
    if tag.status.success() {
        let name = String::from_utf8_lossy(&tag.stdout).trim().to_string();
        if !name.is_empty() {
            return Ok(RefInfo { name, is_tag: true });
        }
    }

    let branch = git_output(repo_dir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    if !branch.status.success() {
        let stderr = String::from_utf8_lossy(&branch.stderr);
        return Err(CoreError::GitError(format!(
            "git rev-parse --abbrev-ref HEAD failed: {stderr}"
        )));
    }

    let name = String::from_utf8_lossy(&branch.stdout).trim().to_string();
    if name.is_empty() {
        return Err(CoreError::GitError(
            "git rev-parse --abbrev-ref HEAD returned empty output".to_string(),
        ));
    }

    Ok(RefInfo {
        name,
        is_tag: false,
    })
}

/// Check whether a directory is inside a git work tree.
pub fn is_git_repo(dir: &Path) -> bool {
    Command::new("git")
        .args(["rev-parse", "--is-inside-work-tree"])
        .current_dir(dir)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Parse a textual boolean such as the `SHIPYARD_IS_TAG` value.
///
/// Accepts `1`, `t`, `true`, `0`, `f`, `false` in lower, upper or title case.
pub fn parse_bool(value: &str) -> Result<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(CoreError::ParseError(format!(
            "expected boolean, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::process::Command as StdCommand;

    fn run_git(repo_dir: &Path, args: &[&str]) {
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

    fn make_git_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        run_git(dir.path(), &["init"]);
        run_git(dir.path(), &["config", "user.name", "test-user"]);
        run_git(dir.path(), &["config", "user.email", "test@example.com"]);
        run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);
        dir
    }

    #[test]
    fn test_capture_head_sha_returns_40_hex_chars() {
        let repo = make_git_repo();
        let sha = capture_head_sha(repo.path()).unwrap();
        assert_eq!(sha.len(), 40, "SHA should be 40 hex chars, got: {sha}");
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_capture_head_sha_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(capture_head_sha(dir.path()).is_err());
    }

    #[test]
    fn test_current_ref_reports_branch() {
        let repo = make_git_repo();
        run_git(repo.path(), &["checkout", "-b", "feature/login"]);

        let info = current_ref(repo.path()).unwrap();
        assert_eq!(info.name, "feature/login");
        assert!(!info.is_tag);
    }

    #[test]
    fn test_current_ref_prefers_tag_at_head() {
        let repo = make_git_repo();
        run_git(repo.path(), &["tag", "v1.2.0"]);

        let info = current_ref(repo.path()).unwrap();
        assert_eq!(info.name, "v1.2.0");
        assert!(info.is_tag);
    }

    #[test]
    fn test_current_ref_ignores_tag_on_older_commit() {
        let repo = make_git_repo();
        run_git(repo.path(), &["tag", "v0.1.0"]);
        run_git(repo.path(), &["commit", "--allow-empty", "-m", "second"]);

        let info = current_ref(repo.path()).unwrap();
        assert!(!info.is_tag);
    }

    #[test]
    fn test_current_ref_fails_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(current_ref(dir.path()).is_err());
    }

    #[test]
    fn test_is_git_repo_true_for_repo() {
        let repo = make_git_repo();
        assert!(is_git_repo(repo.path()));
    }

    #[test]
    fn test_is_git_repo_false_for_non_repo() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!is_git_repo(dir.path()));
    }

    #[test]
    fn test_parse_bool_accepts_common_spellings() {
        for v in ["1", "t", "T", "true", "TRUE", "True", " true "] {
            assert!(parse_bool(v).unwrap(), "{v:?} should parse as true");
        }
        for v in ["0", "f", "F", "false", "FALSE", "False"] {
            assert!(!parse_bool(v).unwrap(), "{v:?} should parse as false");
        }
    }

    #[test]
    fn test_parse_bool_rejects_garbage() {
        let err = parse_bool("yes please").unwrap_err();
        assert!(matches!(err, CoreError::ParseError(_)));
        assert!(parse_bool("").is_err());
    }
}
