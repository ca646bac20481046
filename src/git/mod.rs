//! Git operations module - worktree lookup/cleanup and CLI wrapper.

mod cli;
mod worktree;

pub use cli::{GitCli, WorktreeEntry};
pub use worktree::{GitWorktrees, WorktreeOps};
