//! Auth methods
//!
//! An auth method turns locally available credentials into a login request
//! for the secrets server. The auth loop calls it once per attempt and never
//! concurrently with itself.

use async_trait::async_trait;
use http::HeaderMap;
use serde_json::{Map, Value};
use tokio::sync::watch;

use crate::error::MethodError;

pub mod methods;

pub use methods::build_method;

/// What the server client exposes to auth methods while they build a request.
#[derive(Debug, Clone, Default)]
pub struct ClientCapabilities {
    pub address: String,
    pub namespace: Option<String>,
}

/// A single login attempt: where to post and what to send.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    /// e.g. `auth/alicloud`
    pub mount_path: String,
    pub payload: Map<String, Value>,
    /// extra headers sent along with the login call
    pub headers: HeaderMap,
}

impl LoginRequest {
    pub fn new(mount_path: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            mount_path: mount_path.into(),
            payload,
            headers: HeaderMap::new(),
        }
    }

    pub fn login_path(&self) -> String {
        format!("{}/login", self.mount_path.trim_end_matches('/'))
    }
}

#[async_trait]
pub trait AuthMethod: Send + Sync {
    fn name(&self) -> &str;

    /// Build the login request from the current credentials.
    async fn authenticate(&self, client: &ClientCapabilities) -> Result<LoginRequest, MethodError>;

    /// Generation counter bumped whenever the underlying credentials change
    /// and a fresh login is wanted. Most methods never change and return
    /// `None`.
    fn credentials_changed(&self) -> Option<watch::Receiver<u64>> {
        None
    }

    /// Called after a login built from this method succeeded.
    async fn on_auth_success(&self) {}

    /// Called once when the auth loop stops.
    fn shutdown(&self) {}
}

/// Read a credential file and trim surrounding whitespace.
pub(crate) async fn read_credential_file(path: &str) -> Result<String, std::io::Error> {
    tokio::fs::read_to_string(path)
        .await
        .map(|content| content.trim().to_owned())
}
