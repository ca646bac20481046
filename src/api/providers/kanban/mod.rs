//! Kanban Provider trait and implementations
//!
//! The merge workflow reads ticket status from the issue tracker to gate
//! readiness and transitions the ticket once the merge lands.

mod jira;
mod router;

pub use jira::JiraProvider;
pub use router::{PrefixRouter, TicketBackend, TicketRouter};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;

/// Issue/work item from a kanban provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalIssue {
    /// Issue key (e.g., "PROJ-123")
    pub key: String,
    /// Summary/title
    pub summary: String,
    /// Current status name (e.g., "To Do", "In Progress")
    pub status: String,
    /// Issue type name (e.g., "Bug", "Story", "Task")
    #[serde(default)]
    pub issue_type: Option<String>,
    /// Assignee display name
    #[serde(default)]
    pub assignee: Option<String>,
    /// Full URL to the issue in the provider's web UI
    #[serde(default)]
    pub url: String,
}

/// Trait for issue trackers consulted by the merge workflow.
///
/// Implementations own their retry behavior: a call returns a terminal error
/// only after transient failures have been retried.
#[async_trait]
pub trait KanbanProvider: Send + Sync {
    /// Get the provider name (e.g., "jira")
    fn name(&self) -> &str;

    /// Whether the provider has credentials and can be called
    fn is_available(&self) -> bool;

    /// Fetch an issue by key
    async fn fetch_issue(&self, key: &str) -> Result<ExternalIssue, ApiError>;

    /// Transition an issue to the named workflow status
    async fn update_issue_status(&self, key: &str, status: &str) -> Result<(), ApiError>;
}
