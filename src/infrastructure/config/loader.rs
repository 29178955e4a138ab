use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project-local configuration directory
pub const CONFIG_DIR: &str = ".signal-memory";

/// Prefix for environment overrides; nested keys are separated by `__`
pub const ENV_PREFIX: &str = "SIGNAL_MEMORY_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Unknown embedding provider: {0}. Must be one of: hashing, openai")]
    UnknownEmbeddingProvider(String),

    #[error("Embedding dimension must be at least 1")]
    InvalidEmbeddingDimension,

    #[error("Invalid {0}: must be at least 1")]
    InvalidLimit(&'static str),

    #[error("Invalid {name}: {value}. Must be within [0, 1]")]
    InvalidRatio { name: &'static str, value: f64 },

    #[error(
        "Invalid windows: baseline_window_days ({baseline}) must exceed recent_window_days ({recent})"
    )]
    InvalidWindows { recent: i64, baseline: i64 },

    #[error("Invalid check_interval_secs: must be at least 1")]
    InvalidCheckInterval,

    #[error("Invalid retention max_age_days: {0}. Must be positive")]
    InvalidRetention(i64),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .signal-memory/config.yaml
    /// 3. .signal-memory/local.yaml (optional local overrides)
    /// 4. Environment variables (`SIGNAL_MEMORY_*`, highest priority)
    pub fn load() -> Result<Config> {
        Self::load_from_dir(CONFIG_DIR)
    }

    /// Same as [`ConfigLoader::load`] with the YAML files read from `dir`
    pub fn load_from_dir(dir: impl AsRef<Path>) -> Result<Config> {
        let dir = dir.as_ref();
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment
    /// overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }
        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }
        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let embedding = &config.embedding;
        if !["hashing", "openai"].contains(&embedding.provider.to_lowercase().as_str()) {
            return Err(ConfigError::UnknownEmbeddingProvider(embedding.provider.clone()));
        }
        if embedding.dimension == 0 {
            return Err(ConfigError::InvalidEmbeddingDimension);
        }
        if embedding.max_batch_size == 0 {
            return Err(ConfigError::InvalidLimit("embedding.max_batch_size"));
        }

        if config.retrieval.search_limit == 0 {
            return Err(ConfigError::InvalidLimit("retrieval.search_limit"));
        }
        if config.retrieval.report_limit == 0 {
            return Err(ConfigError::InvalidLimit("retrieval.report_limit"));
        }

        let improvement = &config.improvement;
        if improvement.check_interval_secs == 0 {
            return Err(ConfigError::InvalidCheckInterval);
        }
        for (name, value) in [
            ("improvement.drop_threshold", improvement.drop_threshold),
            (
                "improvement.high_confidence_threshold",
                improvement.high_confidence_threshold,
            ),
            ("improvement.threshold_step", improvement.threshold_step),
            (
                "improvement.context_adjustment_factor",
                improvement.context_adjustment_factor,
            ),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidRatio { name, value });
            }
        }
        if improvement.recent_window_days < 1
            || improvement.baseline_window_days <= improvement.recent_window_days
        {
            return Err(ConfigError::InvalidWindows {
                recent: improvement.recent_window_days,
                baseline: improvement.baseline_window_days,
            });
        }
        if improvement.reconcile_window_days < 1 {
            return Err(ConfigError::InvalidLimit("improvement.reconcile_window_days"));
        }

        if let Some(days) = config.retention.max_age_days {
            if days <= 0 {
                return Err(ConfigError::InvalidRetention(days));
            }
        }

        Ok(())
    }
}
