//! Jira kanban provider implementation

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{debug, info, instrument};

use super::{ExternalIssue, KanbanProvider};
use crate::api::error::ApiError;
use crate::api::retry::RetryPolicy;

const PROVIDER_NAME: &str = "jira";

/// Jira Cloud API provider
pub struct JiraProvider {
    domain: String,
    email: String,
    api_token: String,
    client: Client,
    retry: RetryPolicy,
}

// Jira API response types
#[derive(Debug, Deserialize)]
struct JiraIssue {
    key: String,
    fields: JiraIssueFields,
}

#[derive(Debug, Deserialize)]
struct JiraIssueFields {
    summary: String,
    status: JiraNamed,
    #[serde(rename = "issuetype")]
    issue_type: Option<JiraNamed>,
    assignee: Option<JiraUser>,
}

#[derive(Debug, Deserialize)]
struct JiraNamed {
    name: String,
}

#[derive(Debug, Deserialize)]
struct JiraUser {
    #[serde(rename = "displayName")]
    display_name: String,
}

#[derive(Debug, Deserialize)]
struct JiraTransitionsResponse {
    transitions: Vec<JiraTransition>,
}

#[derive(Debug, Deserialize)]
struct JiraTransition {
    id: String,
    name: String,
    to: JiraNamed,
}

#[derive(Debug, Serialize)]
struct TransitionRequest {
    transition: TransitionId,
}

#[derive(Debug, Serialize)]
struct TransitionId {
    id: String,
}

impl JiraProvider {
    /// Create a new Jira provider
    pub fn new(domain: String, email: String, api_token: String) -> Self {
        Self {
            domain,
            email,
            api_token,
            client: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create from environment variables
    ///
    /// Required environment variables:
    /// - MERGEFLOW_JIRA_DOMAIN: Your Jira domain (e.g., "your-domain.atlassian.net")
    /// - MERGEFLOW_JIRA_EMAIL: Your Atlassian account email
    /// - MERGEFLOW_JIRA_TOKEN: Your Jira API token
    pub fn from_env() -> Result<Self, ApiError> {
        let domain = env::var("MERGEFLOW_JIRA_DOMAIN").ok();
        let email = env::var("MERGEFLOW_JIRA_EMAIL").ok();
        let token = env::var("MERGEFLOW_JIRA_TOKEN").ok();

        match (domain, email, token) {
            (Some(d), Some(e), Some(t)) if !d.is_empty() && !e.is_empty() && !t.is_empty() => {
                Ok(Self::new(d, e, t))
            }
            _ => Err(ApiError::not_configured(PROVIDER_NAME)),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Get the base URL for API requests
    fn base_url(&self) -> String {
        format!("https://{}/rest/api/3", self.domain)
    }

    fn browse_url(&self, key: &str) -> String {
        format!("https://{}/browse/{}", self.domain, key)
    }

    /// Make an authenticated GET request, retrying transient failures
    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url(), path);

        self.retry
            .run(path, || async {
                debug!("Jira GET: {}", url);
                let response = self
                    .client
                    .get(&url)
                    .basic_auth(&self.email, Some(&self.api_token))
                    .header("Accept", "application/json")
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

    /// Make an authenticated POST request, retrying transient failures
    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = format!("{}{}", self.base_url(), path);

        self.retry
            .run(path, || async {
                debug!("Jira POST: {}", url);
                let response = self
                    .client
                    .post(&url)
                    .basic_auth(&self.email, Some(&self.api_token))
                    .header("Accept", "application/json")
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

                if !response.status().is_success() {
                    return Err(ApiError::from_response(PROVIDER_NAME, path, response).await);
                }
                Ok(())
            })
            .await
    }
}

/// Pick the transition whose name or target status matches, ignoring case
fn find_transition<'a>(transitions: &'a [JiraTransition], status: &str) -> Option<&'a JiraTransition> {
    transitions
        .iter()
        .find(|t| t.to.name.eq_ignore_ascii_case(status))
        .or_else(|| transitions.iter().find(|t| t.name.eq_ignore_ascii_case(status)))
}

#[async_trait]
impl KanbanProvider for JiraProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_available(&self) -> bool {
        !self.domain.is_empty() && !self.email.is_empty() && !self.api_token.is_empty()
    }

    #[instrument(skip(self))]
    async fn fetch_issue(&self, key: &str) -> Result<ExternalIssue, ApiError> {
        let path = format!("/issue/{}?fields=summary,status,issuetype,assignee", key);
        let issue: JiraIssue = self.get(&path).await?;

        Ok(ExternalIssue {
            url: self.browse_url(&issue.key),
            key: issue.key,
            summary: issue.fields.summary,
            status: issue.fields.status.name,
            issue_type: issue.fields.issue_type.map(|t| t.name),
            assignee: issue.fields.assignee.map(|a| a.display_name),
        })
    }

    #[instrument(skip(self))]
    async fn update_issue_status(&self, key: &str, status: &str) -> Result<(), ApiError> {
        let path = format!("/issue/{}/transitions", key);
        let response: JiraTransitionsResponse = self.get(&path).await?;

        let transition = find_transition(&response.transitions, status).ok_or_else(|| {
            ApiError::http(
                PROVIDER_NAME,
                400,
                format!("No transition to '{}' available for {}", status, key),
            )
        })?;

        let request = TransitionRequest {
            transition: TransitionId {
                id: transition.id.clone(),
            },
        };
        self.post(&path, &request).await?;

        info!(%key, %status, "Transitioned Jira issue");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(id: &str, name: &str, to: &str) -> JiraTransition {
        JiraTransition {
            id: id.to_string(),
            name: name.to_string(),
            to: JiraNamed {
                name: to.to_string(),
            },
        }
    }

    #[test]
    fn test_is_available() {
        let provider = JiraProvider::new(
            "test.atlassian.net".to_string(),
            "test@test.com".to_string(),
            "token".to_string(),
        );
        assert!(provider.is_available());

        let provider = JiraProvider::new(String::new(), "a@b.c".to_string(), "t".to_string());
        assert!(!provider.is_available());
    }

    #[test]
    fn test_browse_url() {
        let provider = JiraProvider::new(
            "acme.atlassian.net".to_string(),
            "a@b.c".to_string(),
            "t".to_string(),
        );
        assert_eq!(
            provider.browse_url("PROJ-1"),
            "https://acme.atlassian.net/browse/PROJ-1"
        );
    }

    #[test]
    fn test_find_transition_prefers_target_status() {
        let transitions = vec![
            transition("11", "Start work", "In Progress"),
            transition("31", "Finish", "Done"),
            transition("41", "done", "Closed"),
        ];
        assert_eq!(find_transition(&transitions, "done").unwrap().id, "31");
        assert_eq!(find_transition(&transitions, "Start work").unwrap().id, "11");
        assert!(find_transition(&transitions, "Code Review").is_none());
    }

    #[test]
    fn test_parse_issue_response() {
        let json = r#"{
            "key": "PROJ-9",
            "fields": {
                "summary": "Broken login",
                "status": {"name": "Code Review"},
                "issuetype": {"name": "Bug"},
                "assignee": null
            }
        }"#;
        let issue: JiraIssue = serde_json::from_str(json).unwrap();
        assert_eq!(issue.key, "PROJ-9");
        assert_eq!(issue.fields.status.name, "Code Review");
        assert!(issue.fields.assignee.is_none());
    }
}
