use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use reqwest::{Client, RequestBuilder};
use serde_json::json;
use tracing::debug;

use crate::auth::{ClientCapabilities, LoginRequest};
use crate::client::response::{ErrorResponse, SecretResponse};
use crate::client::AuthApi;
use crate::config::auth::VaultConfig;
use crate::error::AuthError;
use crate::utils::constants::{HEADER_VAULT_NAMESPACE, HEADER_VAULT_TOKEN, HEADER_VAULT_WRAP_TTL};

/// reqwest-backed client for the Vault HTTP API.
#[derive(Debug, Clone)]
pub struct VaultClient {
    http: Client,
    address: String,
    namespace: Option<String>,
    wrap_ttl: Option<Duration>,
}

impl VaultClient {
    pub fn new(config: &VaultConfig) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            address: config.address.trim_end_matches('/').to_owned(),
            namespace: config.namespace.clone(),
            wrap_ttl: config.wrap_ttl_seconds.map(Duration::from_secs),
        })
    }

    pub fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            address: self.address.clone(),
            namespace: self.namespace.clone(),
        }
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let url = format!("{}/v1/{}", self.address, path.trim_start_matches('/'));
        let request = self.http.post(url);
        match &self.namespace {
            Some(namespace) => request.header(HEADER_VAULT_NAMESPACE, namespace),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<SecretResponse, AuthError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(rejection(status, &body));
        }
        serde_json::from_str(&body).map_err(|e| AuthError::Decode(e.to_string()))
    }
}

#[async_trait]
impl AuthApi for VaultClient {
    async fn login(&self, request: &LoginRequest) -> Result<SecretResponse, AuthError> {
        let path = request.login_path();
        debug!(path = %path, "sending login request");

        let mut builder = self
            .post(&path)
            .headers(request.headers.clone())
            .json(&request.payload);
        if let Some(ttl) = self.wrap_ttl {
            builder = builder.header(HEADER_VAULT_WRAP_TTL, ttl.as_secs().to_string());
        }
        self.send(builder).await
    }

    async fn renew_self(
        &self,
        token: &str,
        increment: Option<Duration>,
    ) -> Result<SecretResponse, AuthError> {
        let body = match increment {
            Some(increment) => json!({ "increment": increment.as_secs() }),
            None => json!({}),
        };
        let builder = self
            .post("auth/token/renew-self")
            .header(HEADER_VAULT_TOKEN, token)
            .json(&body);
        self.send(builder).await
    }

    async fn unwrap(&self, wrap_token: &str) -> Result<SecretResponse, AuthError> {
        let builder = self
            .post("sys/wrapping/unwrap")
            .header(HEADER_VAULT_TOKEN, wrap_token);
        self.send(builder).await
    }
}

fn rejection(status: StatusCode, body: &str) -> AuthError {
    let errors = serde_json::from_str::<ErrorResponse>(body)
        .map(|parsed| parsed.errors)
        .unwrap_or_else(|_| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![trimmed.to_owned()]
            }
        });
    AuthError::ServerRejection {
        status: status.as_u16(),
        errors,
    }
}
