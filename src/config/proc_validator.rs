//! Configuration validation with aggregated errors.
//! - Aggregates all issues into Vec<String>
//! - Validates:
//!   * server address / namespace / timeout
//!   * backoff and renewal invariants
//!   * auth method mount path and method-specific fields
//!   * logging / metrics / server settings

use reqwest::Url;
use tracing::{error, info};

use crate::config::auth::{MethodConfig, ServiceConfig, VaultConfig};
use crate::config::settings::{BackoffConfig, RenewConfig, SettingsConfig};
use crate::observability::metrics::get_metrics;

/// Public entrypoint: returns Ok(()) or Err(Vec<String>) containing all issues.
pub async fn validate_service_config(cfg: &ServiceConfig) -> Result<(), Vec<String>> {
    let mut errors: Vec<String> = Vec::new();

    validate_settings(&cfg.settings, &mut errors);
    validate_vault(&cfg.vault, &mut errors);
    validate_backoff("auto_auth.backoff", &cfg.auto_auth.backoff, &mut errors);
    validate_renew("auto_auth.renew", &cfg.auto_auth.renew, &mut errors);
    validate_method(&cfg.auto_auth.method, &mut errors);

    if errors.is_empty() {
        info!("config valid");
        Ok(())
    } else {
        error!("configuration validation errors ({}):", errors.len());
        for e in &errors {
            error!(" - {}", e);
        }
        get_metrics().await.config_validation_errors.inc();
        Err(errors)
    }
}

/// SETTINGS VALIDATION
fn validate_settings(settings: &SettingsConfig, errors: &mut Vec<String>) {
    if settings.server.host.is_empty() {
        errors.push("settings.server.host must not be empty".to_string());
    }
    if settings.server.port.parse::<u16>().is_err() {
        errors.push(format!(
            "settings.server.port '{}' must be an integer in range 0-65535",
            settings.server.port
        ));
    }

    // metrics endpoint start with '/'
    let metrics = &settings.metrics;
    if !metrics.path.starts_with('/') {
        errors.push(format!(
            "settings.metrics.path '{}' must start with '/'",
            metrics.path
        ));
    }

    if let Some(logging) = &settings.logging {
        let valid = ["trace", "debug", "info", "warn", "error"];
        if !valid.contains(&logging.level.to_lowercase().as_str()) {
            errors.push(format!(
                "settings.logging.level '{}' invalid; allowed: {:?}",
                logging.level, valid
            ));
        }
    }
}

/// VAULT CONNECTION
fn validate_vault(vault: &VaultConfig, errors: &mut Vec<String>) {
    match Url::parse(&vault.address) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(format!(
            "vault.address '{}' must use http or https, got '{}'",
            vault.address,
            url.scheme()
        )),
        Err(e) => errors.push(format!(
            "vault.address '{}' is not a valid URL: {}",
            vault.address, e
        )),
    }

    if vault.timeout_ms == 0 {
        errors.push("vault.timeout_ms must be > 0".to_string());
    }
    if vault.wrap_ttl_seconds == Some(0) {
        errors.push("vault.wrap_ttl_seconds must be > 0 when set".to_string());
    }
}

fn validate_backoff(path: &str, backoff: &BackoffConfig, errors: &mut Vec<String>) {
    if backoff.min_backoff_ms == 0 {
        errors.push(format!("{}.min_backoff_ms must be > 0", path));
    }
    if backoff.max_backoff_ms < backoff.min_backoff_ms {
        errors.push(format!(
            "{}.max_backoff_ms ({}) must be >= min_backoff_ms ({})",
            path, backoff.max_backoff_ms, backoff.min_backoff_ms
        ));
    }
}

fn validate_renew(path: &str, renew: &RenewConfig, errors: &mut Vec<String>) {
    if !(renew.fraction > 0.0 && renew.fraction < 1.0) {
        errors.push(format!(
            "{}.fraction ({}) must be between 0 and 1 (exclusive)",
            path, renew.fraction
        ));
    }
    if renew.max_failures == 0 {
        errors.push(format!("{}.max_failures must be >= 1", path));
    }
}

/// AUTH METHOD
fn validate_method(method: &MethodConfig, errors: &mut Vec<String>) {
    // checked before normalisation: "" and "auth/" would otherwise turn into
    // `auth/` and `auth/auth`
    if let Some(raw) = method.raw_mount_path() {
        let trimmed = raw.trim_matches('/');
        if trimmed.is_empty() || trimmed == "auth" || raw.chars().any(char::is_whitespace) {
            errors.push(format!(
                "auto_auth.method.mount_path '{}' must be a non-empty path without whitespace",
                raw
            ));
        }
    }

    let mut require = |field: &str, value: &str| {
        if value.trim().is_empty() {
            errors.push(format!(
                "auto_auth.method.config.{} is required for method '{}'",
                field,
                method.method_type()
            ));
        }
    };

    match method {
        MethodConfig::Alicloud { config, .. } => {
            require("role", &config.role);
            require("region", &config.region);
            require("access_key", &config.access_key);
            require("access_secret", &config.access_secret);
        }
        MethodConfig::Approle { config, .. } => {
            require("role_id_file_path", &config.role_id_file_path);
            if config.remove_secret_id_file_after_reading && config.secret_id_file_path.is_none() {
                errors.push(
                    "auto_auth.method.config.remove_secret_id_file_after_reading needs secret_id_file_path"
                        .to_string(),
                );
            }
        }
        MethodConfig::Jwt { config, .. } => {
            require("path", &config.path);
            require("role", &config.role);
            if config.watch_interval_ms == Some(0) {
                errors.push(
                    "auto_auth.method.config.watch_interval_ms must be > 0 when set".to_string(),
                );
            }
        }
    }
}
