use serde::{Deserialize, Serialize};

/// Main configuration structure for the signal memory
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Embedding provider configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Similarity retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Regression detection configuration
    #[serde(default)]
    pub improvement: ImprovementConfig,

    /// Age-based retention
    #[serde(default)]
    pub retention: RetentionConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".signal-memory/signals.db".to_string()
}

const fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EmbeddingConfig {
    /// Provider: openai or hashing
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Base URL of the embeddings API
    #[serde(default = "default_embedding_base_url")]
    pub base_url: String,

    /// Output vector dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,

    /// Texts per request
    #[serde(default = "default_embedding_batch")]
    pub max_batch_size: usize,

    /// Falls back to `OPENAI_API_KEY` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_embedding_provider() -> String {
    "hashing".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

const fn default_embedding_dimension() -> usize {
    384
}

const fn default_embedding_timeout() -> u64 {
    30
}

const fn default_embedding_batch() -> usize {
    100
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            base_url: default_embedding_base_url(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
            max_batch_size: default_embedding_batch(),
            api_key: None,
        }
    }
}

/// Similarity retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetrievalConfig {
    /// Matches used to compute historical context
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Matches reported back on an enhanced decision
    #[serde(default = "default_report_limit")]
    pub report_limit: usize,
}

const fn default_search_limit() -> usize {
    10
}

const fn default_report_limit() -> usize {
    5
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_limit: default_search_limit(),
            report_limit: default_report_limit(),
        }
    }
}

/// Regression detection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImprovementConfig {
    /// Minimum seconds between outcome-triggered evaluations
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Success-rate drop that counts as a regression
    #[serde(default = "default_drop_threshold")]
    pub drop_threshold: f64,

    /// Length of the recent window
    #[serde(default = "default_recent_window")]
    pub recent_window_days: i64,

    /// Length of the baseline window, longer than the recent one
    #[serde(default = "default_baseline_window")]
    pub baseline_window_days: i64,

    /// Failures in the recent window must exceed this count
    #[serde(default = "default_min_failures")]
    pub min_failures: usize,

    /// Average failure confidence above this emits a threshold action
    #[serde(default = "default_high_confidence")]
    pub high_confidence_threshold: f64,

    /// Amount the confidence threshold is raised by
    #[serde(default = "default_threshold_step")]
    pub threshold_step: f64,

    /// Weight applied to historical context after a regression
    #[serde(default = "default_context_factor")]
    pub context_adjustment_factor: f64,

    /// Days after an action before its effect is measured
    #[serde(default = "default_reconcile_window")]
    pub reconcile_window_days: i64,
}

const fn default_check_interval() -> u64 {
    6 * 60 * 60
}

const fn default_drop_threshold() -> f64 {
    0.1
}

const fn default_recent_window() -> i64 {
    7
}

const fn default_baseline_window() -> i64 {
    14
}

const fn default_min_failures() -> usize {
    3
}

const fn default_high_confidence() -> f64 {
    0.7
}

const fn default_threshold_step() -> f64 {
    0.1
}

const fn default_context_factor() -> f64 {
    0.8
}

const fn default_reconcile_window() -> i64 {
    7
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            drop_threshold: default_drop_threshold(),
            recent_window_days: default_recent_window(),
            baseline_window_days: default_baseline_window(),
            min_failures: default_min_failures(),
            high_confidence_threshold: default_high_confidence(),
            threshold_step: default_threshold_step(),
            context_adjustment_factor: default_context_factor(),
            reconcile_window_days: default_reconcile_window(),
        }
    }
}

/// Age-based retention; disabled when `max_age_days` is unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetentionConfig {
    /// Delete signals older than this many days; unset keeps everything
    #[serde(default)]
    pub max_age_days: Option<i64>,
}
