use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{AuthMethod, ClientCapabilities};
use crate::client::AuthApi;
use crate::config::auth::AutoAuthConfig;
use crate::config::settings::RenewConfig;
use crate::handler::authenticator::Authenticator;
use crate::handler::envelope::TokenEnvelope;
use crate::handler::renewer::{RenewalOutcome, Renewer};
use crate::observability::metrics::get_metrics;
use crate::resilience::backoff::Backoff;

/// Pending sends on the output channel before the loop waits for consumers.
const OUTPUT_BUFFER: usize = 1;

#[derive(Debug, Clone)]
pub struct AuthHandlerConfig {
    pub backoff: Backoff,
    pub renew: RenewConfig,
}

impl From<&AutoAuthConfig> for AuthHandlerConfig {
    fn from(cfg: &AutoAuthConfig) -> Self {
        Self {
            backoff: Backoff::from(&cfg.backoff),
            renew: cfg.renew.clone(),
        }
    }
}

/// States of one `run`.
enum RunState {
    Authenticating,
    /// waiting before the next login attempt
    Backoff(Duration),
    Renewing(TokenEnvelope),
    /// a token that cannot be renewed, kept until its re-login point
    Holding(TokenEnvelope),
    Stopped,
}

/// Drives login, renewal and retry, and publishes every fresh token on the
/// output channel.
pub struct AuthHandler {
    authenticator: Authenticator,
    renewer: Renewer,
    backoff: Backoff,
    renew_fraction: f64,
    output: mpsc::Sender<TokenEnvelope>,
}

impl AuthHandler {
    /// Returns the handler and the receiving end of its output channel. The
    /// channel closes when `run` returns.
    pub fn new(
        api: Arc<dyn AuthApi>,
        capabilities: ClientCapabilities,
        config: AuthHandlerConfig,
    ) -> (Self, mpsc::Receiver<TokenEnvelope>) {
        let (output, rx) = mpsc::channel(OUTPUT_BUFFER);
        let renewer = Renewer::new(api.clone(), &config.renew);
        let handler = Self {
            authenticator: Authenticator::new(api, capabilities),
            renewer,
            backoff: config.backoff,
            renew_fraction: config.renew.fraction.clamp(0.01, 0.99),
            output,
        };
        (handler, rx)
    }

    /// Run until `cancel` fires. Does not return while healthy, so callers
    /// spawn it on its own task. Errors are logged and retried, never
    /// returned.
    pub async fn run(self, cancel: CancellationToken, method: Arc<dyn AuthMethod>) {
        info!(method = method.name(), "auth handler started");
        get_metrics().await.up.set(1);

        let mut failures: u32 = 0;
        let mut changed = method.credentials_changed();
        let mut state = RunState::Authenticating;
        loop {
            state = match state {
                RunState::Authenticating => {
                    // the login about to run reads the current credentials
                    mark_credentials_seen(&mut changed);
                    self.authenticate(&cancel, method.as_ref(), &mut failures).await
                }
                RunState::Backoff(delay) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => RunState::Stopped,
                        _ = sleep(delay) => RunState::Authenticating,
                    }
                }
                RunState::Renewing(token) => self.renew(&cancel, &mut changed, token).await,
                RunState::Holding(token) => self.hold(&cancel, &mut changed, token).await,
                RunState::Stopped => break,
            };
        }

        method.shutdown();
        get_metrics().await.up.set(0);
        info!("auth handler stopped");
        // dropping `self` closes the output channel
    }

    async fn authenticate(
        &self,
        cancel: &CancellationToken,
        method: &dyn AuthMethod,
        failures: &mut u32,
    ) -> RunState {
        if cancel.is_cancelled() {
            return RunState::Stopped;
        }
        let metrics = get_metrics().await;
        metrics.login_attempts.inc();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return RunState::Stopped,
            result = self.authenticator.authenticate(method) => result,
        };

        match result {
            Ok(envelope) => {
                *failures = 0;
                for warning in &envelope.warnings {
                    warn!(warning = %warning, "server warning on login");
                }
                info!(
                    accessor = %envelope.accessor,
                    renewable = envelope.renewable,
                    lease_seconds = envelope.lease_duration.as_secs(),
                    "authentication successful"
                );
                method.on_auth_success().await;

                if !self.emit(cancel, envelope.clone()).await {
                    return RunState::Stopped;
                }
                if envelope.is_renewable() {
                    RunState::Renewing(envelope)
                } else {
                    RunState::Holding(envelope)
                }
            }
            Err(e) => {
                let delay = self.backoff.next_delay(*failures);
                *failures = failures.saturating_add(1);
                metrics.login_failures.with_label_values(&[e.reason()]).inc();
                warn!(
                    error = %e,
                    reason = e.reason(),
                    failures = *failures,
                    backoff_ms = delay.as_millis() as u64,
                    "authentication failed, backing off"
                );
                RunState::Backoff(delay)
            }
        }
    }

    async fn renew(
        &self,
        cancel: &CancellationToken,
        changed: &mut Option<watch::Receiver<u64>>,
        token: TokenEnvelope,
    ) -> RunState {
        let metrics = get_metrics().await;
        let mut renewals = self.renewer.renew(token, cancel.child_token());

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RunState::Stopped,
                _ = credentials_changed(changed) => {
                    info!("credentials changed, re-authenticating");
                    metrics.reauthentications.with_label_values(&["credentials_changed"]).inc();
                    return RunState::Authenticating;
                }
                outcome = renewals.next() => match outcome {
                    Some(RenewalOutcome::Renewed(envelope)) => {
                        if !self.emit(cancel, envelope).await {
                            return RunState::Stopped;
                        }
                    }
                    Some(RenewalOutcome::Exhausted(reason)) => {
                        info!(reason = %reason, "lease exhausted, re-authenticating");
                        metrics.reauthentications.with_label_values(&[reason.as_str()]).inc();
                        return RunState::Authenticating;
                    }
                    None => {
                        debug!("renewal sequence ended without outcome");
                        return RunState::Authenticating;
                    }
                },
            }
        }
    }

    async fn hold(
        &self,
        cancel: &CancellationToken,
        changed: &mut Option<watch::Receiver<u64>>,
        token: TokenEnvelope,
    ) -> RunState {
        let metrics = get_metrics().await;
        let hold_for = (!token.lease_duration.is_zero())
            .then(|| token.lease_duration.mul_f64(self.renew_fraction));
        info!(
            accessor = %token.accessor,
            hold_ms = hold_for.map(|d| d.as_millis() as u64),
            "token is not renewable, holding until re-authentication"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => RunState::Stopped,
            _ = credentials_changed(changed) => {
                info!("credentials changed, re-authenticating");
                metrics.reauthentications.with_label_values(&["credentials_changed"]).inc();
                RunState::Authenticating
            }
            _ = sleep_for(hold_for) => {
                metrics.reauthentications.with_label_values(&["not_renewable"]).inc();
                RunState::Authenticating
            }
        }
    }

    /// Send on the output channel. Returns false when cancelled first.
    async fn emit(&self, cancel: &CancellationToken, envelope: TokenEnvelope) -> bool {
        let origin = envelope.origin;
        let lease_seconds = envelope.lease_duration.as_secs() as i64;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => false,
            sent = self.output.send(envelope) => {
                match sent {
                    Ok(()) => {
                        let metrics = get_metrics().await;
                        metrics.tokens_emitted.with_label_values(&[origin.as_str()]).inc();
                        metrics.token_lease_seconds.set(lease_seconds);
                        debug!(origin = origin.as_str(), "token emitted");
                    }
                    Err(_) => debug!("output channel has no receiver, token dropped"),
                }
                true
            }
        }
    }
}

fn mark_credentials_seen(changed: &mut Option<watch::Receiver<u64>>) {
    if let Some(generation) = changed {
        generation.borrow_and_update();
    }
}

/// Resolves on the first credential generation not yet seen by a login.
async fn credentials_changed(changed: &mut Option<watch::Receiver<u64>>) {
    match changed {
        Some(generation) => {
            if generation.changed().await.is_err() {
                // the method dropped its sender: no more changes will come
                std::future::pending::<()>().await;
            }
        }
        None => std::future::pending().await,
    }
}

async fn sleep_for(duration: Option<Duration>) {
    match duration {
        Some(duration) => sleep(duration).await,
        None => std::future::pending().await,
    }
}
