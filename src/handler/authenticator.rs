use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::{AuthMethod, ClientCapabilities};
use crate::client::AuthApi;
use crate::error::AuthError;
use crate::handler::envelope::{TokenEnvelope, TokenOrigin};

/// One login attempt: method payload -> login call -> unwrap if wrapped.
#[derive(Clone)]
pub struct Authenticator {
    api: Arc<dyn AuthApi>,
    capabilities: ClientCapabilities,
}

impl Authenticator {
    pub fn new(api: Arc<dyn AuthApi>, capabilities: ClientCapabilities) -> Self {
        Self { api, capabilities }
    }

    pub async fn authenticate(&self, method: &dyn AuthMethod) -> Result<TokenEnvelope, AuthError> {
        let request = method.authenticate(&self.capabilities).await?;
        debug!(method = method.name(), path = %request.login_path(), "logging in");

        let mut response = self.api.login(&request).await?;

        // a wrapped response only carries the wrap token, even when the
        // server also filled in an auth block
        match response.wrap_info.take() {
            Some(wrap_info) => {
                info!(
                    accessor = %wrap_info.accessor,
                    ttl = wrap_info.ttl,
                    "login response is wrapped, unwrapping"
                );
                let unwrapped = self
                    .api
                    .unwrap(&wrap_info.token)
                    .await
                    .map_err(|e| AuthError::Unwrap(Box::new(e)))?;
                TokenEnvelope::from_response(unwrapped, TokenOrigin::Login, Some(wrap_info))
                    .map_err(|e| AuthError::Unwrap(Box::new(e)))
            }
            None => TokenEnvelope::from_response(response, TokenOrigin::Login, None),
        }
    }
}
