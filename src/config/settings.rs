use serde::Deserialize;

use crate::utils::constants::{
    DEFAULT_MAX_BACKOFF_MS, DEFAULT_MAX_RENEW_FAILURES, DEFAULT_MIN_BACKOFF_MS,
    DEFAULT_RENEW_FRACTION,
};

/// ================================
/// Global service-wide settings
/// ================================
#[derive(Debug, Deserialize, Clone, Default)]
pub struct SettingsConfig {
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_path")]
    pub path: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            path: default_metrics_path(),
            is_enabled: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: "9100".to_owned(),
        }
    }
}

/// ================================
/// Backoff between failed attempts
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct BackoffConfig {
    /// first delay; doubled on every consecutive failure
    #[serde(default = "default_min_backoff_ms")]
    pub min_backoff_ms: u64,
    /// ceiling for the delay
    /// invariant: >= min_backoff_ms
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_backoff_ms: DEFAULT_MIN_BACKOFF_MS,
            max_backoff_ms: DEFAULT_MAX_BACKOFF_MS,
        }
    }
}

/// ================================
/// Renewal scheduling
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct RenewConfig {
    /// share of the remaining lease to wait before renewing, 0 < fraction < 1
    #[serde(default = "default_renew_fraction")]
    pub fraction: f64,
    /// consecutive failed renewals tolerated before giving the lease up
    #[serde(default = "default_max_renew_failures")]
    pub max_failures: u32,
}

impl Default for RenewConfig {
    fn default() -> Self {
        Self {
            fraction: DEFAULT_RENEW_FRACTION,
            max_failures: DEFAULT_MAX_RENEW_FAILURES,
        }
    }
}

/// ================================
/// Logging
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String, // allowed: trace, debug, info, warn, error
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(level: String, format: LogFormat) -> Self {
        Self { level, format }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new("info".to_owned(), LogFormat::Compact)
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Compact,
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_min_backoff_ms() -> u64 {
    DEFAULT_MIN_BACKOFF_MS
}

fn default_max_backoff_ms() -> u64 {
    DEFAULT_MAX_BACKOFF_MS
}

fn default_renew_fraction() -> f64 {
    DEFAULT_RENEW_FRACTION
}

fn default_max_renew_failures() -> u32 {
    DEFAULT_MAX_RENEW_FAILURES
}
