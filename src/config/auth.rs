use serde::Deserialize;

use crate::config::settings::{BackoffConfig, RenewConfig, SettingsConfig};
use crate::utils::constants::{
    DEFAULT_HTTP_TIMEOUT_MS, METHOD_ALICLOUD, METHOD_APPROLE, METHOD_JWT,
};

/// ================================
/// Full service configuration
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    #[serde(default)]
    pub settings: SettingsConfig,
    pub vault: VaultConfig,
    pub auto_auth: AutoAuthConfig,
}

/// ================================
/// Secrets server connection
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct VaultConfig {
    /// e.g. `https://vault.internal:8200`
    pub address: String,
    /// sent as `X-Vault-Namespace` when present
    pub namespace: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// ask the server to wrap login responses with this TTL
    pub wrap_ttl_seconds: Option<u64>,
}

/// ================================
/// Auto-auth loop
/// ================================
#[derive(Debug, Deserialize, Clone)]
pub struct AutoAuthConfig {
    pub method: MethodConfig,
    #[serde(default)]
    pub backoff: BackoffConfig,
    #[serde(default)]
    pub renew: RenewConfig,
}

/// Auth method selection, keyed by `type`.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MethodConfig {
    Alicloud {
        mount_path: Option<String>,
        config: AliCloudConfig,
    },
    Approle {
        mount_path: Option<String>,
        config: AppRoleConfig,
    },
    Jwt {
        mount_path: Option<String>,
        config: JwtConfig,
    },
}

impl MethodConfig {
    pub fn method_type(&self) -> &'static str {
        match self {
            MethodConfig::Alicloud { .. } => METHOD_ALICLOUD,
            MethodConfig::Approle { .. } => METHOD_APPROLE,
            MethodConfig::Jwt { .. } => METHOD_JWT,
        }
    }

    /// Mount path exactly as configured.
    pub fn raw_mount_path(&self) -> Option<&str> {
        match self {
            MethodConfig::Alicloud { mount_path, .. }
            | MethodConfig::Approle { mount_path, .. }
            | MethodConfig::Jwt { mount_path, .. } => mount_path.as_deref(),
        }
    }

    /// Mount path under which the method is enabled, always `auth/<mount>`.
    /// Falls back to the method type when not configured.
    pub fn mount_path(&self) -> String {
        let raw = self
            .raw_mount_path()
            .unwrap_or(self.method_type())
            .trim_matches('/');
        if raw.starts_with("auth/") {
            raw.to_owned()
        } else {
            format!("auth/{}", raw)
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AliCloudConfig {
    pub role: String,
    pub region: String,
    pub access_key: String,
    pub access_secret: String,
    pub security_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppRoleConfig {
    pub role_id_file_path: String,
    pub secret_id_file_path: Option<String>,
    #[serde(default)]
    pub remove_secret_id_file_after_reading: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// file holding the JWT
    pub path: String,
    pub role: String,
    #[serde(default)]
    pub remove_jwt_after_reading: bool,
    /// poll the file this often and re-authenticate when it changes
    pub watch_interval_ms: Option<u64>,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_HTTP_TIMEOUT_MS
}
