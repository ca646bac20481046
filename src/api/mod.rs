//! API client modules for external service integrations
//!
//! This module provides:
//! - Provider traits for the repository host, issue tracker, and AI assistant
//! - Error handling shared across providers
//! - A bounded retry policy the HTTP providers apply to transient failures

pub mod error;
pub mod providers;
pub mod retry;

pub use error::ApiError;
pub use providers::{
    AiProvider, AnthropicProvider, CommitInfo, ExternalIssue, GitHubProvider, JiraProvider,
    KanbanProvider, MergeResult, PrefixRouter, PullRequest, RepoProvider, TicketBackend,
    TicketRouter, TimelineEntry,
};
pub use retry::RetryPolicy;
