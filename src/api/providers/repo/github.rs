//! GitHub API provider implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, instrument};

use super::{parse_repo_string, CommitInfo, MergeResult, PullRequest, RepoProvider, TimelineEntry};
use crate::api::error::ApiError;
use crate::api::retry::RetryPolicy;
use crate::workflow::MergeMethod;

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const PROVIDER_NAME: &str = "github";
const TOKEN_ENV: &str = "MERGEFLOW_GITHUB_TOKEN";

/// GitHub API provider bound to a single `owner/repo`
pub struct GitHubProvider {
    token: String,
    owner: String,
    repo: String,
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

// Response types for API deserialization
#[derive(Debug, Deserialize)]
struct PrResponse {
    number: u64,
    state: String,
    title: String,
    html_url: String,
    merged: Option<bool>,
    head: BranchRef,
    base: BranchRef,
    user: Option<UserRef>,
}

#[derive(Debug, Deserialize)]
struct BranchRef {
    #[serde(rename = "ref")]
    name: String,
    sha: String,
}

#[derive(Debug, Deserialize)]
struct UserRef {
    login: String,
}

#[derive(Debug, Deserialize)]
struct ReviewResponse {
    state: String,
    user: Option<UserRef>,
    #[serde(default)]
    body: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommentResponse {
    user: Option<UserRef>,
    body: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct CheckRunsResponse {
    check_runs: Vec<CheckRunResponse>,
}

#[derive(Debug, Deserialize)]
struct CheckRunResponse {
    status: String,
    conclusion: Option<String>,
}

impl CheckRunResponse {
    fn is_passed(&self) -> bool {
        self.status == "completed"
            && self
                .conclusion
                .as_ref()
                .map(|c| c == "success" || c == "skipped" || c == "neutral")
                .unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    sha: String,
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    name: String,
}

#[derive(Debug, Serialize)]
struct MergeRequestBody<'a> {
    merge_method: &'a str,
}

#[derive(Debug, Deserialize)]
struct MergeResponse {
    sha: String,
    merged: bool,
    #[serde(default)]
    message: String,
}

impl GitHubProvider {
    /// Create a new GitHub provider for `repo` ("owner/repo")
    pub fn new(token: impl Into<String>, repo: &str) -> Result<Self, ApiError> {
        let (owner, name) = parse_repo_string(repo).ok_or_else(|| {
            ApiError::http(
                PROVIDER_NAME,
                400,
                format!("Invalid repo format '{}', expected 'owner/repo'", repo),
            )
        })?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("mergeflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self {
            token: token.into(),
            owner: owner.to_string(),
            repo: name.to_string(),
            client,
            base_url: GITHUB_API_BASE.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Create provider from the MERGEFLOW_GITHUB_TOKEN environment variable
    pub fn from_env(repo: &str) -> Result<Self, ApiError> {
        match env::var(TOKEN_ENV) {
            Ok(token) if !token.is_empty() => Self::new(token, repo),
            _ => Err(ApiError::not_configured(PROVIDER_NAME)),
        }
    }

    /// Point the provider at a different API root (GitHub Enterprise)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}{}",
            self.base_url, self.owner, self.repo, path
        )
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
    }

    /// Authenticated GET with retry on transient failures
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.repo_url(path);
        self.retry
            .run(path, || async {
                debug!("GitHub GET: {}", url);
                let response = self
                    .request(reqwest::Method::GET, &url)
                    .send()
                    .await
                    .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

                if !response.status().is_success() {
                    return Err(ApiError::from_response(PROVIDER_NAME, path, response).await);
                }

                response
                    .json()
                    .await
                    .map_err(|e| ApiError::http(PROVIDER_NAME, 0, format!("Parse error: {}", e)))
            })
            .await
    }

    /// Approved when someone approved and nobody's latest review requests changes
    async fn is_approved(&self, number: u64) -> Result<bool, ApiError> {
        let reviews: Vec<ReviewResponse> =
            self.get(&format!("/pulls/{}/reviews", number)).await?;
        Ok(review_approval(&reviews))
    }

    /// All check runs on the head commit passed. No checks counts as passing.
    async fn checks_pass(&self, sha: &str) -> Result<bool, ApiError> {
        let checks: CheckRunsResponse = match self
            .get(&format!("/commits/{}/check-runs", sha))
            .await
        {
            Ok(checks) => checks,
            Err(ApiError::NotFound { .. }) => return Ok(true),
            Err(e) => return Err(e),
        };
        Ok(checks.check_runs.iter().all(CheckRunResponse::is_passed))
    }
}

/// Reduce reviews to the latest decisive state per reviewer
fn review_approval(reviews: &[ReviewResponse]) -> bool {
    let mut latest: Vec<(&str, &str)> = Vec::new();
    for review in reviews {
        if review.state != "APPROVED" && review.state != "CHANGES_REQUESTED" {
            continue;
        }
        let login = review.user.as_ref().map_or("", |u| u.login.as_str());
        match latest.iter_mut().find(|(user, _)| *user == login) {
            Some(entry) => entry.1 = review.state.as_str(),
            None => latest.push((login, review.state.as_str())),
        }
    }

    latest.iter().any(|(_, state)| *state == "APPROVED")
        && !latest.iter().any(|(_, state)| *state == "CHANGES_REQUESTED")
}

#[async_trait]
impl RepoProvider for GitHubProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    #[instrument(skip(self))]
    async fn get_pr(&self, number: u64) -> Result<PullRequest, ApiError> {
        let pr: PrResponse = self.get(&format!("/pulls/{}", number)).await?;
        let approved = self.is_approved(number).await?;
        let checks_passing = self.checks_pass(&pr.head.sha).await?;

        Ok(PullRequest {
            number: pr.number,
            title: pr.title,
            state: pr.state,
            source_branch: pr.head.name,
            target_branch: pr.base.name,
            approved,
            checks_passing,
            merged: pr.merged.unwrap_or(false),
            url: pr.html_url,
            author: pr.user.map(|u| u.login),
            head_sha: pr.head.sha,
        })
    }

    #[instrument(skip(self))]
    async fn list_commits(&self, number: u64) -> Result<Vec<CommitInfo>, ApiError> {
        let commits: Vec<CommitResponse> =
            self.get(&format!("/pulls/{}/commits", number)).await?;

        Ok(commits
            .into_iter()
            .map(|c| CommitInfo {
                sha: c.sha,
                message: c.commit.message,
                author: c.commit.author.map(|a| a.name),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn list_timeline(&self, number: u64) -> Result<Vec<TimelineEntry>, ApiError> {
        let comments: Vec<CommentResponse> =
            self.get(&format!("/issues/{}/comments", number)).await?;
        let reviews: Vec<ReviewResponse> =
            self.get(&format!("/pulls/{}/reviews", number)).await?;

        let mut entries: Vec<TimelineEntry> = comments
            .into_iter()
            .map(|c| TimelineEntry {
                kind: "comment".to_string(),
                author: c.user.map(|u| u.login),
                body: c.body,
                created_at: c.created_at,
            })
            .collect();

        entries.extend(reviews.into_iter().filter_map(|r| {
            Some(TimelineEntry {
                kind: format!("review:{}", r.state.to_lowercase()),
                author: r.user.map(|u| u.login),
                body: r.body.unwrap_or_default(),
                created_at: r.submitted_at?,
            })
        }));

        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    /// Merges are not retried: a lost response may still have merged.
    #[instrument(skip(self))]
    async fn merge_pr(&self, number: u64, method: MergeMethod) -> Result<MergeResult, ApiError> {
        let path = format!("/pulls/{}/merge", number);
        let url = self.repo_url(&path);
        debug!("GitHub PUT: {}", url);

        let response = self
            .request(reqwest::Method::PUT, &url)
            .json(&MergeRequestBody {
                merge_method: method.as_str(),
            })
            .send()
            .await
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        if !response.status().is_success() {
            return Err(ApiError::from_response(PROVIDER_NAME, &path, response).await);
        }

        let merged: MergeResponse = response
            .json()
            .await
            .map_err(|e| ApiError::http(PROVIDER_NAME, 0, format!("Parse error: {}", e)))?;

        Ok(MergeResult {
            sha: merged.sha,
            merged: merged.merged,
            message: merged.message,
        })
    }
}
