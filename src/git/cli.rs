//! Git CLI wrapper for worktree and branch operations.
//!
//! Uses the git CLI directly so worktree bookkeeping matches what the user's
//! own `git` sees.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

/// Low-level git command wrapper
pub struct GitCli;

impl GitCli {
    /// Execute a git command and return stdout
    async fn run_git(args: &[&str], cwd: &Path) -> Result<String> {
        debug!(?args, ?cwd, "Running git command");

        let output = Command::new("git")
            .args(args)
            .current_dir(cwd)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .context("Failed to execute git command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "git {} failed: {}",
                args.first().unwrap_or(&""),
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Get the root of the git repository
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn repo_root(path: &Path) -> Result<String> {
        Self::run_git(&["rev-parse", "--show-toplevel"], path).await
    }

    /// URL of a remote
    #[instrument(skip_all, fields(path = %path.display(), remote))]
    pub async fn remote_url(path: &Path, remote: &str) -> Result<String> {
        Self::run_git(&["remote", "get-url", remote], path).await
    }

    /// Delete a local branch
    #[instrument(skip_all, fields(path = %path.display(), branch, force))]
    pub async fn delete_branch(path: &Path, branch: &str, force: bool) -> Result<()> {
        let flag = if force { "-D" } else { "-d" };
        Self::run_git(&["branch", flag, branch], path).await?;
        Ok(())
    }

    /// Check whether a local branch exists
    #[instrument(skip_all, fields(path = %path.display(), branch))]
    pub async fn branch_exists(path: &Path, branch: &str) -> Result<bool> {
        let refname = format!("refs/heads/{}", branch);
        match Self::run_git(&["show-ref", "--verify", "--quiet", &refname], path).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }

    /// Remove a worktree
    #[instrument(skip_all, fields(repo_path = %repo_path.display(), worktree_path = %worktree_path.display(), force))]
    pub async fn remove_worktree(repo_path: &Path, worktree_path: &Path, force: bool) -> Result<()> {
        let worktree_str = worktree_path.to_string_lossy();

        if force {
            Self::run_git(&["worktree", "remove", "--force", &worktree_str], repo_path).await?;
        } else {
            Self::run_git(&["worktree", "remove", &worktree_str], repo_path).await?;
        }
        Ok(())
    }

    /// List all worktrees
    #[instrument(skip_all, fields(repo_path = %repo_path.display()))]
    pub async fn list_worktrees(repo_path: &Path) -> Result<Vec<WorktreeEntry>> {
        let output = Self::run_git(&["worktree", "list", "--porcelain"], repo_path).await?;
        Ok(parse_worktree_list(&output))
    }
}

/// Entry from `git worktree list --porcelain`
#[derive(Debug, Clone, PartialEq)]
pub struct WorktreeEntry {
    pub path: String,
    /// Full ref, e.g. `refs/heads/feature/PROJ-1`
    pub branch: Option<String>,
    pub head: Option<String>,
    pub bare: bool,
}

impl WorktreeEntry {
    /// Branch name without the `refs/heads/` prefix
    pub fn branch_name(&self) -> Option<&str> {
        self.branch
            .as_deref()
            .map(|b| b.strip_prefix("refs/heads/").unwrap_or(b))
    }
}

fn parse_worktree_list(output: &str) -> Vec<WorktreeEntry> {
    let mut entries = Vec::new();
    let mut current: Option<WorktreeEntry> = None;

    for line in output.lines() {
        if let Some(path) = line.strip_prefix("worktree ") {
            if let Some(entry) = current.take() {
                entries.push(entry);
            }
            current = Some(WorktreeEntry {
                path: path.to_string(),
                branch: None,
                head: None,
                bare: false,
            });
        } else if let Some(head) = line.strip_prefix("HEAD ") {
            if let Some(ref mut entry) = current {
                entry.head = Some(head.to_string());
            }
        } else if let Some(branch) = line.strip_prefix("branch ") {
            if let Some(ref mut entry) = current {
                entry.branch = Some(branch.to_string());
            }
        } else if line == "bare" {
            if let Some(ref mut entry) = current {
                entry.bare = true;
            }
        }
    }

    if let Some(entry) = current {
        entries.push(entry);
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_worktree_list() {
        let output = "worktree /src/app\n\
                      HEAD 1111111\n\
                      branch refs/heads/main\n\
                      \n\
                      worktree /src/app-wt/proj-7\n\
                      HEAD 2222222\n\
                      branch refs/heads/feature/PROJ-7\n\
                      \n\
                      worktree /src/bare\n\
                      bare\n";

        let entries = parse_worktree_list(output);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].branch_name(), Some("main"));
        assert_eq!(entries[1].path, "/src/app-wt/proj-7");
        assert_eq!(entries[1].branch_name(), Some("feature/PROJ-7"));
        assert_eq!(entries[1].head.as_deref(), Some("2222222"));
        assert!(entries[2].bare);
        assert_eq!(entries[2].branch_name(), None);
    }

    #[test]
    fn test_parse_empty_output() {
        assert!(parse_worktree_list("").is_empty());
    }
}
