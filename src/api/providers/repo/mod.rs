//! Repository Provider trait and implementations
//!
//! The merge workflow reads pull request state, commits, and timeline
//! entries from the hosting service and asks it to perform the merge.

mod github;

pub use github::GitHubProvider;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::workflow::MergeMethod;

/// Pull request snapshot from a repo provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR number
    pub number: u64,
    /// Title of the PR
    pub title: String,
    /// State as reported by the host (e.g. "open", "OPEN", "closed", "merged")
    pub state: String,
    /// Branch the change comes from
    pub source_branch: String,
    /// Branch the change merges into
    pub target_branch: String,
    /// Whether the PR has an approving review and no outstanding change requests
    pub approved: bool,
    /// Whether all required checks have passed
    pub checks_passing: bool,
    /// Whether the PR has already been merged
    #[serde(default)]
    pub merged: bool,
    /// HTML URL for the PR
    #[serde(default)]
    pub url: String,
    /// Author login
    #[serde(default)]
    pub author: Option<String>,
    /// Head commit SHA
    #[serde(default)]
    pub head_sha: String,
}

/// A commit on the PR branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    #[serde(default)]
    pub author: Option<String>,
}

/// A review, comment, or other event on the PR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Event kind (e.g. "comment", "review")
    pub kind: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a successful merge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeResult {
    /// SHA of the resulting merge commit
    pub sha: String,
    pub merged: bool,
    #[serde(default)]
    pub message: String,
}

/// Trait for repository service providers
#[async_trait]
pub trait RepoProvider: Send + Sync {
    /// Get the provider name (e.g., "github")
    fn name(&self) -> &str;

    /// Fetch a pull request by number
    async fn get_pr(&self, number: u64) -> Result<PullRequest, ApiError>;

    /// List commits on a pull request, oldest first
    async fn list_commits(&self, number: u64) -> Result<Vec<CommitInfo>, ApiError>;

    /// List comments and reviews on a pull request, oldest first
    async fn list_timeline(&self, number: u64) -> Result<Vec<TimelineEntry>, ApiError>;

    /// Merge a pull request
    async fn merge_pr(&self, number: u64, method: MergeMethod) -> Result<MergeResult, ApiError>;
}

/// Parse repo string into (owner, repo) tuple
pub fn parse_repo_string(repo_str: &str) -> Option<(&str, &str)> {
    let parts: Vec<&str> = repo_str.split('/').collect();
    if parts.len() == 2 && !parts[0].is_empty() && !parts[1].is_empty() {
        Some((parts[0], parts[1]))
    } else {
        None
    }
}

/// Extract `owner/repo` from a GitHub remote URL (SSH or HTTPS)
pub fn repo_from_remote_url(remote_url: &str) -> Option<String> {
    let re = Regex::new(r"github\.com[:/](?P<owner>[^/]+)/(?P<repo>[^/]+?)(?:\.git)?/?$").ok()?;
    let caps = re.captures(remote_url.trim())?;
    Some(format!("{}/{}", &caps["owner"], &caps["repo"]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_from_remote_url() {
        assert_eq!(
            repo_from_remote_url("git@github.com:acme/widgets.git").as_deref(),
            Some("acme/widgets")
        );
        assert_eq!(
            repo_from_remote_url("https://github.com/acme/widgets").as_deref(),
            Some("acme/widgets")
        );
        assert_eq!(
            repo_from_remote_url("https://github.com/acme/widgets.git\n").as_deref(),
            Some("acme/widgets")
        );
        assert_eq!(repo_from_remote_url("https://gitlab.com/acme/widgets"), None);
    }

    #[test]
    fn test_parse_repo_string() {
        assert_eq!(parse_repo_string("owner/repo"), Some(("owner", "repo")));
        assert_eq!(parse_repo_string("invalid"), None);
        assert_eq!(parse_repo_string("a/b/c"), None);
        assert_eq!(parse_repo_string("/repo"), None);
    }

    #[test]
    fn test_pull_request_deserializes_without_optional_fields() {
        let json = r#"{
            "number": 7,
            "title": "Fix login",
            "state": "open",
            "source_branch": "feature/PROJ-7",
            "target_branch": "main",
            "approved": true,
            "checks_passing": false
        }"#;
        let pr: PullRequest = serde_json::from_str(json).unwrap();
        assert_eq!(pr.number, 7);
        assert!(!pr.merged);
        assert!(pr.author.is_none());
        assert!(pr.url.is_empty());
    }
}
