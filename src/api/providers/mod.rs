//! Provider trait definitions for external service integrations
//!
//! This module defines the trait interfaces for the three provider categories:
//! - AI providers (Anthropic)
//! - Repository providers (GitHub)
//! - Issue tracker providers (Jira) plus ticket routing

pub mod ai;
pub mod kanban;
pub mod repo;

// Re-export commonly used types
pub use ai::{AiProvider, AnthropicProvider};
pub use kanban::{
    ExternalIssue, JiraProvider, KanbanProvider, PrefixRouter, TicketBackend, TicketRouter,
};
pub use repo::{CommitInfo, GitHubProvider, MergeResult, PullRequest, RepoProvider, TimelineEntry};
