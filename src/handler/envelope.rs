use std::fmt;
use std::time::Duration;

use crate::client::{SecretResponse, WrapInfo};
use crate::error::AuthError;

/// Where an emitted token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenOrigin {
    Login,
    Renewal,
}

impl TokenOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenOrigin::Login => "login",
            TokenOrigin::Renewal => "renewal",
        }
    }
}

/// A usable token plus its lease, as handed to consumers.
#[derive(Clone, PartialEq)]
pub struct TokenEnvelope {
    pub client_token: String,
    pub accessor: String,
    pub renewable: bool,
    pub lease_duration: Duration,
    pub warnings: Vec<String>,
    /// wrapping the login response was delivered through, if any
    pub wrap_info: Option<WrapInfo>,
    pub origin: TokenOrigin,
}

impl TokenEnvelope {
    pub fn from_response(
        response: SecretResponse,
        origin: TokenOrigin,
        wrap_info: Option<WrapInfo>,
    ) -> Result<Self, AuthError> {
        let lease_seconds = response.token_lease_seconds();
        let auth = response
            .auth
            .ok_or_else(|| AuthError::Decode("response carries no auth block".into()))?;
        if auth.client_token.is_empty() {
            return Err(AuthError::Decode("auth block has an empty client_token".into()));
        }

        Ok(Self {
            client_token: auth.client_token,
            accessor: auth.accessor,
            renewable: auth.renewable,
            lease_duration: Duration::from_secs(lease_seconds),
            warnings: response.warnings.unwrap_or_default(),
            wrap_info,
            origin,
        })
    }

    /// Whether the renewer has anything to do with this token.
    pub fn is_renewable(&self) -> bool {
        self.renewable && !self.lease_duration.is_zero()
    }
}

// keep the secret out of logs
impl fmt::Debug for TokenEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenEnvelope")
            .field("client_token", &"<redacted>")
            .field("accessor", &self.accessor)
            .field("renewable", &self.renewable)
            .field("lease_duration", &self.lease_duration)
            .field("warnings", &self.warnings)
            .field("wrapped", &self.wrap_info.is_some())
            .field("origin", &self.origin)
            .finish()
    }
}
