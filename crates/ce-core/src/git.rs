//! Git queries used to name sessions.
//!
//! Every query degrades to `None` when git is missing or the directory is
//! not a working copy.

use std::path::Path;
use std::process::Command;
use tracing::debug;

fn git_output(dir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|e| debug!("git unavailable: {}", e))
        .ok()?;

    if !output.status.success() {
        debug!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr).trim()
        );
        return None;
    }

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() {
        None
    } else {
        Some(stdout)
    }
}

/// Get the current branch name of a git repository
pub fn current_branch(dir: &Path) -> Option<String> {
    // Detached HEAD reports "HEAD"
    git_output(dir, &["rev-parse", "--abbrev-ref", "HEAD"]).filter(|b| b != "HEAD")
}

/// URL of the `origin` remote
pub fn remote_url(dir: &Path) -> Option<String> {
    git_output(dir, &["remote", "get-url", "origin"])
}

/// Repository name from a remote URL (`git@host:org/repo.git` → `repo`).
pub fn repo_name_from_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let last = trimmed.rsplit(['/', ':']).next()?;
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

/// Project name: the `origin` repository name, else the directory name.
pub fn project_name(dir: &Path) -> String {
    remote_url(dir)
        .as_deref()
        .and_then(repo_name_from_url)
        .or_else(|| {
            dir.file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "project".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_repo_name_from_url() {
        assert_eq!(
            repo_name_from_url("https://github.com/acme/widgets.git").as_deref(),
            Some("widgets")
        );
        assert_eq!(
            repo_name_from_url("git@github.com:acme/widgets.git").as_deref(),
            Some("widgets")
        );
        assert_eq!(
            repo_name_from_url("https://example.com/acme/widgets/").as_deref(),
            Some("widgets")
        );
        assert_eq!(repo_name_from_url("git@host:solo").as_deref(), Some("solo"));
        assert_eq!(repo_name_from_url(""), None);
    }

    #[test]
    fn test_non_repo_has_no_branch() {
        let temp = tempdir().unwrap();
        assert_eq!(current_branch(temp.path()), None);
        assert_eq!(remote_url(temp.path()), None);
    }

    #[test]
    fn test_project_name_falls_back_to_directory() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("my-project");
        std::fs::create_dir(&dir).unwrap();
        assert_eq!(project_name(&dir), "my-project");
    }
}
