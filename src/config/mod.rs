mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

use crate::download::MAX_WORKERS;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&mut config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./hugin.toml",
        "~/.config/hugin/config.toml",
        "/etc/hugin/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Loading config from {:?}", path);
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration, capping values that are merely too large
pub fn validate_config(config: &mut Config) -> Result<()> {
    if config.session.workers == 0 {
        anyhow::bail!("session.workers must be at least 1");
    }
    if config.session.workers > MAX_WORKERS {
        tracing::warn!(
            "session.workers = {} exceeds the maximum of {}; capping",
            config.session.workers,
            MAX_WORKERS
        );
        config.session.workers = MAX_WORKERS;
    }

    if config.session.timeout_secs == 0 {
        anyhow::bail!("session.timeout_secs must be at least 1");
    }

    if config.query.retries == 0 {
        anyhow::bail!("query.retries must be at least 1");
    }
    if config.query.amount == 0 {
        anyhow::bail!("query.amount must be at least 1");
    }

    if config.cache.enabled && config.cache.path.trim().is_empty() {
        anyhow::bail!("cache.path cannot be empty while the cache is enabled");
    }

    let tmdb = &config.providers.tmdb;
    if tmdb.enabled && tmdb.api_key.is_empty() {
        tracing::warn!("TMDB is enabled but has no API key; its providers will be skipped");
    }
    let omdb = &config.providers.omdb;
    if omdb.enabled && omdb.api_key.is_empty() {
        tracing::warn!("OMDb is enabled but has no API key; its provider will be skipped");
    }

    Ok(())
}
