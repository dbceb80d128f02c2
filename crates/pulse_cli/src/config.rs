//! Configuration file support for pulse.
//!
//! Configuration is loaded with the following precedence (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables (prefixed with `PULSE_`, sections split by `__`,
//!    e.g. `PULSE_GITHUB__TOKEN`, `PULSE_SYNC__PAGE_SIZE`)
//! 3. Config file (./pulse.toml, then ~/.config/pulse/config.toml)
//! 4. Built-in defaults
//!
//! Example config file:
//! ```toml
//! [github]
//! token = "gho_..."            # or PULSE_GITHUB__TOKEN / GITHUB_TOKEN
//! app_id = 12345               # GitHub App auth, used with installation_id
//! private_key_path = "/etc/pulse/app.pem"
//! installation_id = 678
//!
//! [sync]
//! days_back = 90
//! threshold = 100
//! wait_for_reset = true
//! max_wait_seconds = 3600
//! max_retries = 3
//! request_timeout_seconds = 30
//! strategy = "graphql"         # or "rest"
//! rest_fallback = false
//! page_size = 50
//! count_query = true
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use directories::ProjectDirs;
use pulse::api::RateLimitPolicy;
use pulse::github::{AppCredentials, DEFAULT_API_URL, DEFAULT_GRAPHQL_URL};
use pulse::retry::RetryConfig;
use pulse::sync::{DEFAULT_PAGE_SIZE, SourceStrategy, SyncOptions};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// GitHub configuration.
    pub github: GitHubConfig,
    /// Default sync options.
    pub sync: SyncConfig,
}

/// GitHub configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// REST API base URL.
    pub api_url: String,
    /// GraphQL endpoint.
    pub graphql_url: String,
    /// OAuth or personal access token.
    pub token: Option<String>,
    /// GitHub App id, for installation tokens.
    pub app_id: Option<u64>,
    /// PEM-encoded GitHub App private key.
    pub private_key_path: Option<PathBuf>,
    /// Installation to sync as. Takes precedence over `token` when the app is configured.
    pub installation_id: Option<u64>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            graphql_url: DEFAULT_GRAPHQL_URL.to_string(),
            token: None,
            app_id: None,
            private_key_path: None,
            installation_id: None,
        }
    }
}

/// Default sync options.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Default lower edge of `pulse prs`, in days.
    pub days_back: u32,
    /// Remaining points below which a call waits for the reset.
    pub threshold: u32,
    /// Wait for the reset instead of failing when the budget is low.
    pub wait_for_reset: bool,
    /// Longest acceptable wait for a reset.
    pub max_wait_seconds: u64,
    /// Attempts per call, including the first one.
    pub max_retries: u32,
    /// Per-request HTTP timeout.
    pub request_timeout_seconds: u64,
    /// Which API serves syncs.
    pub strategy: SourceStrategy,
    /// Re-run a failed GraphQL sync through REST.
    pub rest_fallback: bool,
    /// Pull requests per page.
    pub page_size: u32,
    /// Issue a count query for exact progress totals.
    pub count_query: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let policy = RateLimitPolicy::default();
        Self {
            days_back: 90,
            threshold: policy.threshold,
            wait_for_reset: policy.wait_for_reset,
            max_wait_seconds: policy.max_wait.as_secs(),
            max_retries: pulse::retry::DEFAULT_MAX_ATTEMPTS,
            request_timeout_seconds: 30,
            strategy: SourceStrategy::default(),
            rest_fallback: false,
            page_size: DEFAULT_PAGE_SIZE,
            count_query: true,
        }
    }
}

impl Config {
    /// Load configuration using the config crate's layered approach.
    ///
    /// Sources are loaded in order (later sources override earlier):
    /// 1. Built-in defaults
    /// 2. XDG config file (~/.config/pulse/config.toml)
    /// 3. Local config file (./pulse.toml)
    /// 4. Environment variables with PULSE_ prefix
    pub fn load() -> Self {
        let mut files = Vec::new();
        if let Some(path) = Self::default_config_path() {
            files.push(path);
        }
        files.push(PathBuf::from("pulse.toml"));
        Self::from_files(&files)
    }

    /// Layer the given files (later ones win) and the environment over the defaults.
    ///
    /// Missing files are skipped. A config that fails to parse falls back to the
    /// defaults with a warning.
    pub fn from_files(files: &[PathBuf]) -> Self {
        let mut builder = ConfigBuilder::builder();

        for path in files.iter().filter(|path| path.exists()) {
            tracing::debug!("Loading config from {:?}", path);
            builder = builder.add_source(
                File::from(path.as_path())
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }

        // e.g., PULSE_GITHUB__TOKEN -> github.token
        builder = builder.add_source(
            Environment::with_prefix("PULSE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        match builder.build() {
            Ok(settings) => match settings.try_deserialize::<Config>() {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to deserialize config: {}", e);
                    Config::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to build config: {}", e);
                Config::default()
            }
        }
    }

    /// Get the GitHub token, falling back to the conventional `GITHUB_TOKEN`.
    pub fn github_token(&self) -> Option<String> {
        self.github
            .token
            .clone()
            .filter(|token| !token.is_empty())
            .or_else(|| std::env::var("GITHUB_TOKEN").ok())
            .filter(|token| !token.is_empty())
    }

    /// Load the GitHub App key when both `app_id` and `private_key_path` are set.
    pub fn app_credentials(&self) -> Result<Option<Arc<AppCredentials>>, Box<dyn std::error::Error>> {
        let (Some(app_id), Some(path)) = (self.github.app_id, &self.github.private_key_path) else {
            return Ok(None);
        };
        let pem = read_key(path)?;
        Ok(Some(Arc::new(AppCredentials::from_pem(app_id, &pem)?)))
    }

    pub fn rate_limit_policy(&self) -> RateLimitPolicy {
        RateLimitPolicy {
            threshold: self.sync.threshold,
            wait_for_reset: self.sync.wait_for_reset,
            max_wait: Duration::from_secs(self.sync.max_wait_seconds),
        }
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new(self.sync.max_retries.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.sync.request_timeout_seconds)
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            page_size: self.sync.page_size,
            count_query: self.sync.count_query,
            strategy: self.sync.strategy,
            rest_fallback: self.sync.rest_fallback,
            ..SyncOptions::default()
        }
    }

    /// Get the default config file path.
    pub fn default_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "pulse").map(|dirs| dirs.config_dir().join("config.toml"))
    }
}

fn read_key(path: &Path) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    std::fs::read(path)
        .map_err(|e| format!("Failed to read private key {}: {}", path.display(), e).into())
}
