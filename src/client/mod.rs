//! Secrets server API used by the auth loop.

use std::time::Duration;

use async_trait::async_trait;

use crate::auth::LoginRequest;
use crate::error::AuthError;

pub mod response;
pub mod vault;

pub use response::{SecretAuth, SecretResponse, WrapInfo};
pub use vault::VaultClient;

/// The three server calls the auth loop needs.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /v1/<mount_path>/login`
    async fn login(&self, request: &LoginRequest) -> Result<SecretResponse, AuthError>;

    /// `POST /v1/auth/token/renew-self`, asking for `increment` more lease.
    async fn renew_self(
        &self,
        token: &str,
        increment: Option<Duration>,
    ) -> Result<SecretResponse, AuthError>;

    /// `POST /v1/sys/wrapping/unwrap` with the wrap token as credential.
    async fn unwrap(&self, wrap_token: &str) -> Result<SecretResponse, AuthError>;
}
