use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::RetryPolicy;
use crate::workflow::{MergeMethod, MergeOptions};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub merge: MergeConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Write logs to `<state>/logs` instead of stderr
    #[serde(default)]
    pub to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            to_file: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_state_path")]
    pub state: String,
}

fn default_state_path() -> String {
    ".mergeflow/state".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state: default_state_path(),
        }
    }
}

/// Repository host settings. The token comes from `MERGEFLOW_GITHUB_TOKEN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// `owner/repo`; detected from the `origin` remote when unset
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default = "default_github_api_url")]
    pub api_url: String,
}

fn default_github_api_url() -> String {
    "https://api.github.com".to_string()
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            repo: None,
            api_url: default_github_api_url(),
        }
    }
}

/// Issue tracker settings. Jira credentials come from `MERGEFLOW_JIRA_*`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Project keys owned by the tracker; empty means all non-alternate keys
    #[serde(default)]
    pub project_keys: Vec<String>,
    /// Ticket prefixes handled elsewhere and exempt from the review gate
    #[serde(default)]
    pub alternate_prefixes: Vec<String>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project_keys: Vec::new(),
            alternate_prefixes: Vec::new(),
        }
    }
}

/// AI debrief settings. The key comes from `MERGEFLOW_ANTHROPIC_API_KEY`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ai_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_ai_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_ai_model(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Defaults for merge runs. `resume` uses these as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    #[serde(default)]
    pub method: MergeMethod,
    #[serde(default = "default_true")]
    pub delete_branch: bool,
    #[serde(default = "default_true")]
    pub cleanup_worktree: bool,
    #[serde(default)]
    pub skip_approval: bool,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            method: MergeMethod::default(),
            delete_branch: true,
            cleanup_worktree: true,
            skip_approval: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_retries() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".mergeflow").join("config.toml")
    }

    pub fn load(config_path: Option<&str>) -> Result<Self> {
        // Start with embedded defaults so mergeflow works without config files
        let defaults = Config::default();
        let defaults_json =
            serde_json::to_string(&defaults).context("Failed to serialize default config")?;

        let mut builder = config::Config::builder().add_source(config::File::from_str(
            &defaults_json,
            config::FileFormat::Json,
        ));

        let project_config = Self::project_config_path();
        if project_config.exists() {
            builder = builder.add_source(config::File::from(project_config));
        }

        // User config in ~/.config/mergeflow/ (optional global overrides)
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("mergeflow").join("config.toml");
            if user_config.exists() {
                builder = builder.add_source(config::File::from(user_config));
            }
        }

        // Explicit config file (CLI override)
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // MERGEFLOW__MERGE__METHOD=rebase and friends
        builder = builder.add_source(
            config::Environment::with_prefix("MERGEFLOW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to load configuration")?;
        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::project_config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create mergeflow config directory")?;
        }

        let toml_str =
            toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        std::fs::write(&config_path, toml_str).context("Failed to write config file")?;

        Ok(())
    }

    pub fn state_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.paths.state);
        if path.is_absolute() {
            path
        } else {
            std::env::current_dir().unwrap_or_default().join(path)
        }
    }

    pub fn logs_path(&self) -> PathBuf {
        self.state_path().join("logs")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry.max_retries,
            Duration::from_millis(self.retry.base_delay_ms),
            Duration::from_millis(self.retry.max_delay_ms),
        )
    }

    /// Options a run starts from before CLI flags are applied
    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            skip_approval: self.merge.skip_approval,
            skip_tracker: !self.tracker.enabled,
            no_ai: !self.ai.enabled,
            merge_method: self.merge.method,
            delete_branch: self.merge.delete_branch,
            cleanup_worktree: self.merge.cleanup_worktree,
            worktree_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.logging.level, "info");
        assert!(config.tracker.enabled);
        assert_eq!(config.merge.method, MergeMethod::Squash);
        assert_eq!(config.retry.max_retries, 3);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [merge]
            method = "rebase"
            delete_branch = false

            [tracker]
            project_keys = ["PROJ"]
            "#,
        )
        .unwrap();

        assert_eq!(config.merge.method, MergeMethod::Rebase);
        assert!(!config.merge.delete_branch);
        assert!(config.merge.cleanup_worktree);
        assert_eq!(config.tracker.project_keys, vec!["PROJ".to_string()]);
        assert_eq!(config.github.api_url, "https://api.github.com");
    }

    #[test]
    fn test_merge_options_from_config() {
        let mut config = Config::default();
        config.tracker.enabled = false;
        config.ai.enabled = false;
        config.merge.skip_approval = true;
        config.merge.cleanup_worktree = false;

        let options = config.merge_options();
        assert!(options.skip_tracker);
        assert!(options.no_ai);
        assert!(options.skip_approval);
        assert!(!options.cleanup_worktree);
        assert!(options.delete_branch);
        assert_eq!(options.worktree_path, None);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = Config::default();
        config.retry.max_retries = 0;
        let policy = config.retry_policy();
        assert_eq!(policy.max_retries, 0);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_toml_roundtrip_of_defaults() {
        let toml_str = toml::to_string_pretty(&Config::default()).unwrap();
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.paths.state, ".mergeflow/state");
    }
}
