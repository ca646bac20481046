//! Per-invocation merge options

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How the host should merge the pull request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMethod {
    Merge,
    #[default]
    Squash,
    Rebase,
}

impl MergeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeMethod::Merge => "merge",
            MergeMethod::Squash => "squash",
            MergeMethod::Rebase => "rebase",
        }
    }
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "merge" => Ok(MergeMethod::Merge),
            "squash" => Ok(MergeMethod::Squash),
            "rebase" => Ok(MergeMethod::Rebase),
            other => Err(format!(
                "unknown merge method '{}' (expected merge, squash, or rebase)",
                other
            )),
        }
    }
}

/// Options for one run. Not stored in the checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOptions {
    /// Treat the PR as approved even without an approving review
    #[serde(default)]
    pub skip_approval: bool,
    /// Disable the issue tracker review gate and ticket transition
    #[serde(default)]
    pub skip_tracker: bool,
    /// Skip the AI debrief
    #[serde(default)]
    pub no_ai: bool,
    #[serde(default)]
    pub merge_method: MergeMethod,
    /// Delete the local source branch after merging
    #[serde(default = "default_true")]
    pub delete_branch: bool,
    /// Remove the worktree after merging
    #[serde(default = "default_true")]
    pub cleanup_worktree: bool,
    /// Worktree to checkpoint into, overriding lookup by branch
    #[serde(default)]
    pub worktree_path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            skip_approval: false,
            skip_tracker: false,
            no_ai: false,
            merge_method: MergeMethod::default(),
            delete_branch: true,
            cleanup_worktree: true,
            worktree_path: None,
        }
    }
}
