//! Anthropic API provider implementation

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::instrument;

use super::AiProvider;
use crate::api::error::ApiError;
use crate::api::retry::RetryPolicy;

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";
const PROVIDER_NAME: &str = "anthropic";

/// Anthropic Messages API provider
pub struct AnthropicProvider {
    api_key: String,
    model: String,
    max_tokens: u32,
    client: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with the given API key
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("mergeflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            max_tokens,
            client,
            base_url: ANTHROPIC_API_BASE.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    /// Create provider from MERGEFLOW_ANTHROPIC_API_KEY environment variable
    pub fn from_env(model: &str, max_tokens: u32) -> Result<Option<Self>, ApiError> {
        match env::var("MERGEFLOW_ANTHROPIC_API_KEY") {
            Ok(key) if !key.is_empty() => Ok(Some(Self::new(key, model, max_tokens)?)),
            _ => Ok(None),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Concatenate the text blocks of a reply
fn reply_text(response: MessageResponse) -> String {
    response
        .content
        .into_iter()
        .filter(|block| block.kind == "text")
        .map(|block| block.text)
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl AiProvider for AnthropicProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/messages", self.base_url);
        let request_body = MessageRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response: MessageResponse = self
            .retry
            .run("messages", || async {
                let response = self
                    .client
                    .post(&url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_API_VERSION)
                    .header("content-type", "application/json")
                    .json(&request_body)
                    .send()
                    .await
                    .map_err(|e| ApiError::network(PROVIDER_NAME, e.to_string()))?;

                if !response.status().is_success() {
                    return Err(ApiError::from_response(PROVIDER_NAME, "/v1/messages", response).await);
                }

                response
                    .json()
                    .await
                    .map_err(|e| ApiError::http(PROVIDER_NAME, 0, format!("Parse error: {}", e)))
            })
            .await?;

        Ok(reply_text(response))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let provider = AnthropicProvider::new("test-key", "claude-haiku", 512).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_is_configured() {
        let provider = AnthropicProvider::new("test-key", "claude-haiku", 512).unwrap();
        assert!(provider.is_configured());

        let provider = AnthropicProvider::new("", "claude-haiku", 512).unwrap();
        assert!(!provider.is_configured());
    }

    #[test]
    fn test_reply_text_joins_text_blocks() {
        let json = r#"{"content": [
            {"type": "text", "text": "First"},
            {"type": "tool_use", "id": "x"},
            {"type": "text", "text": "Second"}
        ]}"#;
        let response: MessageResponse = serde_json::from_str(json).unwrap();
        assert_eq!(reply_text(response), "First\nSecond");
    }
}
