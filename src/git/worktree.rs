//! Worktree operations used by the merge workflow.
//!
//! Gather locates the worktree checked out on the PR's source branch (it keys
//! the checkpoint file); Closeout removes it and the local branch.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

use crate::git::cli::GitCli;

/// Worktree lookups and cleanup
#[async_trait]
pub trait WorktreeOps: Send + Sync {
    /// Find the worktree that has `branch` checked out
    async fn find_for_branch(&self, branch: &str) -> Result<Option<PathBuf>>;

    /// Remove a linked worktree
    async fn remove(&self, path: &Path) -> Result<()>;

    /// Delete a local branch if it exists
    async fn delete_branch(&self, branch: &str) -> Result<()>;
}

/// `WorktreeOps` backed by the git CLI in one repository
pub struct GitWorktrees {
    repo_path: PathBuf,
}

impl GitWorktrees {
    pub fn new(repo_path: PathBuf) -> Self {
        Self { repo_path }
    }

    /// Open the repository containing `path`
    pub async fn discover(path: &Path) -> Result<Self> {
        let root = GitCli::repo_root(path)
            .await
            .context("Not inside a git repository")?;
        Ok(Self::new(PathBuf::from(root)))
    }
}

#[async_trait]
impl WorktreeOps for GitWorktrees {
    #[instrument(skip(self))]
    async fn find_for_branch(&self, branch: &str) -> Result<Option<PathBuf>> {
        let entries = GitCli::list_worktrees(&self.repo_path).await?;
        Ok(entries
            .into_iter()
            .find(|e| e.branch_name() == Some(branch))
            .map(|e| PathBuf::from(e.path)))
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn remove(&self, path: &Path) -> Result<()> {
        if path == self.repo_path {
            anyhow::bail!("Refusing to remove the main worktree {}", path.display());
        }
        GitCli::remove_worktree(&self.repo_path, path, false)
            .await
            .with_context(|| format!("Failed to remove worktree {}", path.display()))?;
        info!(path = %path.display(), "Removed worktree");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_branch(&self, branch: &str) -> Result<()> {
        if !GitCli::branch_exists(&self.repo_path, branch).await? {
            return Ok(());
        }
        // Squash and rebase merges leave the branch unmerged from git's view
        GitCli::delete_branch(&self.repo_path, branch, true)
            .await
            .with_context(|| format!("Failed to delete branch {}", branch))?;
        info!(%branch, "Deleted local branch");
        Ok(())
    }
}
