//! AI Provider trait and implementations
//!
//! Used by the debrief step to summarize a pull request before it merges.

mod anthropic;

pub use anthropic::AnthropicProvider;

use async_trait::async_trait;

use crate::api::error::ApiError;

/// Trait for AI assistants that answer a single prompt
#[async_trait]
pub trait AiProvider: Send + Sync {
    /// Get the provider name (e.g., "anthropic")
    fn name(&self) -> &str;

    /// Check if the provider is configured (has API key)
    fn is_configured(&self) -> bool;

    /// Send a prompt and return the assistant's text reply
    async fn complete(&self, prompt: &str) -> Result<String, ApiError>;
}
