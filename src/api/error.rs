//! API error types shared by the repository, tracker, and assistant providers

use std::fmt;
use std::time::Duration;

/// Errors that can occur when interacting with external APIs
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 401 Unauthorized - token invalid or expired
    Unauthorized { provider: String },
    /// 403 Forbidden - token lacks required permissions
    Forbidden { provider: String },
    /// 404 Not Found
    NotFound { provider: String, resource: String },
    /// 429 Rate Limited
    RateLimited {
        provider: String,
        retry_after_secs: Option<u64>,
    },
    /// Network or timeout error
    NetworkError { provider: String, message: String },
    /// Other HTTP errors
    HttpError {
        provider: String,
        status: u16,
        message: String,
    },
    /// Provider not configured (no token in environment)
    NotConfigured { provider: String },
}

impl ApiError {
    /// Check if this is an authentication error (401 or 403)
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            ApiError::Unauthorized { .. } | ApiError::Forbidden { .. }
        )
    }

    /// Whether a retry has a chance of succeeding.
    ///
    /// Rate limits, network failures, and 5xx responses are transient. Auth
    /// failures, missing resources, and other 4xx responses are terminal.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::RateLimited { .. } | ApiError::NetworkError { .. } => true,
            ApiError::HttpError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Get the provider name for this error
    pub fn provider_name(&self) -> &str {
        match self {
            ApiError::Unauthorized { provider }
            | ApiError::Forbidden { provider }
            | ApiError::NotFound { provider, .. }
            | ApiError::RateLimited { provider, .. }
            | ApiError::NetworkError { provider, .. }
            | ApiError::HttpError { provider, .. }
            | ApiError::NotConfigured { provider } => provider,
        }
    }

    /// Server-requested delay before the next attempt, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ApiError::RateLimited {
                retry_after_secs, ..
            } => retry_after_secs.map(Duration::from_secs),
            _ => None,
        }
    }

    pub fn unauthorized(provider: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            provider: provider.into(),
        }
    }

    pub fn forbidden(provider: impl Into<String>) -> Self {
        ApiError::Forbidden {
            provider: provider.into(),
        }
    }

    pub fn not_found(provider: impl Into<String>, resource: impl Into<String>) -> Self {
        ApiError::NotFound {
            provider: provider.into(),
            resource: resource.into(),
        }
    }

    pub fn rate_limited(provider: impl Into<String>, retry_after: Option<u64>) -> Self {
        ApiError::RateLimited {
            provider: provider.into(),
            retry_after_secs: retry_after,
        }
    }

    pub fn network(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ApiError::NetworkError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn http(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        ApiError::HttpError {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn not_configured(provider: impl Into<String>) -> Self {
        ApiError::NotConfigured {
            provider: provider.into(),
        }
    }

    /// Map a non-success HTTP response into an error.
    ///
    /// Reads the `retry-after` header on 429 so the retry policy can honor it.
    pub async fn from_response(provider: &str, resource: &str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        match status {
            401 => ApiError::unauthorized(provider),
            403 => ApiError::forbidden(provider),
            404 => ApiError::not_found(provider, resource),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|s| s.trim().parse().ok());
                ApiError::rate_limited(provider, retry_after)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                ApiError::http(provider, status, body)
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized { provider } => {
                write!(f, "{}: Unauthorized (401) - check your API token", provider)
            }
            ApiError::Forbidden { provider } => {
                write!(
                    f,
                    "{}: Forbidden (403) - insufficient permissions",
                    provider
                )
            }
            ApiError::NotFound { provider, resource } => {
                write!(f, "{}: Not found - {}", provider, resource)
            }
            ApiError::RateLimited {
                provider,
                retry_after_secs,
            } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "{}: Rate limited - retry after {}s", provider, secs)
                } else {
                    write!(f, "{}: Rate limited", provider)
                }
            }
            ApiError::NetworkError { provider, message } => {
                write!(f, "{}: Network error - {}", provider, message)
            }
            ApiError::HttpError {
                provider,
                status,
                message,
            } => {
                write!(f, "{}: HTTP {} - {}", provider, status, message)
            }
            ApiError::NotConfigured { provider } => {
                write!(f, "{}: Not configured (no API token)", provider)
            }
        }
    }
}

impl std::error::Error for ApiError {}
