//! Shared constants and invariants

pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MIN_BACKOFF_MS: u64 = 1000;
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_RENEW_FRACTION: f64 = 0.5;
pub const DEFAULT_MAX_RENEW_FAILURES: u32 = 2;

// Vault request headers
pub const HEADER_VAULT_TOKEN: &str = "X-Vault-Token";
pub const HEADER_VAULT_NAMESPACE: &str = "X-Vault-Namespace";
pub const HEADER_VAULT_WRAP_TTL: &str = "X-Vault-Wrap-TTL";

// Supported auth method types
pub const METHOD_ALICLOUD: &str = "alicloud";
pub const METHOD_APPROLE: &str = "approle";
pub const METHOD_JWT: &str = "jwt";
