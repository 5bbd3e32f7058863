use std::collections::HashMap;

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Response envelope shared by login, renew-self and unwrap.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct SecretResponse {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub lease_id: String,
    #[serde(default)]
    pub renewable: bool,
    /// seconds
    #[serde(default)]
    pub lease_duration: u64,
    pub data: Option<Map<String, Value>>,
    pub warnings: Option<Vec<String>>,
    pub wrap_info: Option<WrapInfo>,
    pub auth: Option<SecretAuth>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct SecretAuth {
    pub client_token: String,
    #[serde(default)]
    pub accessor: String,
    pub policies: Option<Vec<String>>,
    pub metadata: Option<HashMap<String, String>>,
    /// seconds
    #[serde(default)]
    pub lease_duration: u64,
    #[serde(default)]
    pub renewable: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WrapInfo {
    pub token: String,
    #[serde(default)]
    pub accessor: String,
    /// seconds
    pub ttl: u64,
    pub creation_time: DateTime<FixedOffset>,
    #[serde(default)]
    pub creation_path: String,
    #[serde(default)]
    pub wrapped_accessor: String,
}

/// Error body returned with non-2xx statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub errors: Vec<String>,
}

impl SecretResponse {
    /// Lease of the token itself, falling back to the response lease when the
    /// auth block carries none.
    pub fn token_lease_seconds(&self) -> u64 {
        self.auth
            .as_ref()
            .map(|auth| auth.lease_duration)
            .filter(|lease| *lease > 0)
            .unwrap_or(self.lease_duration)
    }
}
