use hugin_common::query::{DEFAULT_AMOUNT, DEFAULT_LANGUAGE, DEFAULT_RETRIES};
use hugin_common::Strategy;
use serde::{Deserialize, Serialize};

use crate::download::DEFAULT_USER_AGENT;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub query: QueryDefaults,

    #[serde(default)]
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Concurrent fetches per query (capped at 10)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Base delay for exponential retry backoff, 0 disables backoff
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_workers() -> usize {
    4
}
fn default_timeout_secs() -> u64 {
    5
}
fn default_retry_backoff_ms() -> u64 {
    250
}
fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            timeout_secs: default_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
            user_agent: default_user_agent(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Snapshot file for the persistent response cache (`~` is expanded)
    #[serde(default = "default_cache_path")]
    pub path: String,
}

fn default_true() -> bool {
    true
}
fn default_cache_path() -> String {
    "~/.cache/hugin/responses.bin".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_cache_path(),
        }
    }
}

/// Defaults applied to queries built by the CLI.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueryDefaults {
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_amount")]
    pub amount: usize,

    #[serde(default)]
    pub strategy: Strategy,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}
fn default_retries() -> u32 {
    DEFAULT_RETRIES
}
fn default_amount() -> usize {
    DEFAULT_AMOUNT
}

impl Default for QueryDefaults {
    fn default() -> Self {
        Self {
            language: default_language(),
            retries: default_retries(),
            amount: default_amount(),
            strategy: Strategy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub tmdb: TmdbConfig,

    #[serde(default)]
    pub omdb: OmdbConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TmdbConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: String,

    /// Overrides the query language for TMDB requests
    #[serde(default)]
    pub language: Option<String>,
}

impl Default for TmdbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
            language: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OmdbConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub api_key: String,
}

impl Default for OmdbConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: String::new(),
        }
    }
}
