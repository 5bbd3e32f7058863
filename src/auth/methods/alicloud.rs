use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use rand::Rng;
use reqwest::Url;
use serde_json::{json, Map};
use tracing::debug;

use crate::auth::{AuthMethod, ClientCapabilities, LoginRequest};
use crate::config::auth::AliCloudConfig;
use crate::error::MethodError;

const STS_API_VERSION: &str = "2015-04-01";

/// Alibaba Cloud RAM login.
///
/// Sends the caller-identity request the server replays against STS to learn
/// who we are. Credentials are static for the lifetime of the process.
#[derive(Debug, Clone)]
pub struct AliCloudMethod {
    mount_path: String,
    config: AliCloudConfig,
}

impl AliCloudMethod {
    pub fn new(mount_path: String, config: AliCloudConfig) -> Self {
        Self { mount_path, config }
    }

    fn identity_request_url(&self) -> Result<Url, MethodError> {
        let nonce: u64 = rand::thread_rng().gen();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("AccessKeyId", self.config.access_key.clone());
        params.insert("Action", "GetCallerIdentity".into());
        params.insert("Format", "JSON".into());
        params.insert("SignatureMethod", "HMAC-SHA1".into());
        params.insert("SignatureNonce", nonce.to_string());
        params.insert("SignatureVersion", "1.0".into());
        params.insert("Timestamp", timestamp);
        params.insert("Version", STS_API_VERSION.into());
        if let Some(security_token) = &self.config.security_token {
            params.insert("SecurityToken", security_token.clone());
        }

        let endpoint = format!("https://sts.{}.aliyuncs.com/", self.config.region);
        Url::parse_with_params(&endpoint, params.iter())
            .map_err(|e| MethodError::Other(format!("invalid STS endpoint '{}': {}", endpoint, e)))
    }
}

#[async_trait]
impl AuthMethod for AliCloudMethod {
    fn name(&self) -> &str {
        "alicloud"
    }

    async fn authenticate(&self, _client: &ClientCapabilities) -> Result<LoginRequest, MethodError> {
        if self.config.access_key.is_empty() {
            return Err(MethodError::EmptyCredential("access_key"));
        }
        if self.config.access_secret.is_empty() {
            return Err(MethodError::EmptyCredential("access_secret"));
        }

        let url = self.identity_request_url()?;
        let headers = json!({
            "Accept": ["application/json"],
            "Host": [url.host_str().unwrap_or_default()],
        });
        debug!(role = %self.config.role, region = %self.config.region, "built alicloud identity request");

        let mut payload = Map::new();
        payload.insert("role".into(), json!(self.config.role));
        payload.insert("identity_request_url".into(), json!(STANDARD.encode(url.as_str())));
        payload.insert(
            "identity_request_headers".into(),
            json!(STANDARD.encode(headers.to_string())),
        );
        Ok(LoginRequest::new(self.mount_path.clone(), payload))
    }
}
