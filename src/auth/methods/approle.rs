use std::io::ErrorKind;

use async_trait::async_trait;
use serde_json::{json, Map};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::auth::{read_credential_file, AuthMethod, ClientCapabilities, LoginRequest};
use crate::config::auth::AppRoleConfig;
use crate::error::MethodError;

/// AppRole login from a role-id file and an optional secret-id file.
///
/// With `remove_secret_id_file_after_reading` the secret-id file is deleted
/// once read and the value is kept in memory, so a later re-login works until
/// a new file is dropped in place.
#[derive(Debug)]
pub struct AppRoleMethod {
    mount_path: String,
    config: AppRoleConfig,
    cached_secret_id: Mutex<Option<String>>,
}

impl AppRoleMethod {
    pub fn new(mount_path: String, config: AppRoleConfig) -> Self {
        Self {
            mount_path,
            config,
            cached_secret_id: Mutex::new(None),
        }
    }

    async fn role_id(&self) -> Result<String, MethodError> {
        let path = &self.config.role_id_file_path;
        let role_id = read_credential_file(path)
            .await
            .map_err(|source| MethodError::CredentialFile {
                path: path.clone(),
                source,
            })?;
        if role_id.is_empty() {
            return Err(MethodError::EmptyCredential("role_id"));
        }
        Ok(role_id)
    }

    async fn secret_id(&self, path: &str) -> Result<String, MethodError> {
        let mut cached = self.cached_secret_id.lock().await;

        match read_credential_file(path).await {
            Ok(secret_id) if secret_id.is_empty() => {
                Err(MethodError::EmptyCredential("secret_id"))
            }
            Ok(secret_id) => {
                if self.config.remove_secret_id_file_after_reading {
                    if let Err(e) = tokio::fs::remove_file(path).await {
                        warn!(path = %path, error = %e, "failed to remove secret-id file");
                    } else {
                        info!(path = %path, "secret-id file removed after reading");
                    }
                }
                *cached = Some(secret_id.clone());
                Ok(secret_id)
            }
            Err(e) if e.kind() == ErrorKind::NotFound && cached.is_some() => {
                Ok(cached.clone().unwrap_or_default())
            }
            Err(source) => Err(MethodError::CredentialFile {
                path: path.to_owned(),
                source,
            }),
        }
    }
}

#[async_trait]
impl AuthMethod for AppRoleMethod {
    fn name(&self) -> &str {
        "approle"
    }

    async fn authenticate(&self, _client: &ClientCapabilities) -> Result<LoginRequest, MethodError> {
        let mut payload = Map::new();
        payload.insert("role_id".into(), json!(self.role_id().await?));

        if let Some(path) = &self.config.secret_id_file_path {
            payload.insert("secret_id".into(), json!(self.secret_id(path).await?));
        }
        Ok(LoginRequest::new(self.mount_path.clone(), payload))
    }
}
