use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::AuthApi;
use crate::config::settings::RenewConfig;
use crate::error::{AuthError, ExhaustReason};
use crate::handler::envelope::{TokenEnvelope, TokenOrigin};
use crate::observability::metrics::get_metrics;

/// One step of a renewal sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum RenewalOutcome {
    /// Lease extended; carries the refreshed envelope.
    Renewed(TokenEnvelope),
    /// Lease is gone. Always the last outcome of a sequence.
    Exhausted(ExhaustReason),
}

/// Keeps a renewable token alive by calling renew-self before it expires.
#[derive(Clone)]
pub struct Renewer {
    api: Arc<dyn AuthApi>,
    fraction: f64,
    max_failures: u32,
}

/// Lazy, finite sequence of renewal outcomes.
///
/// The renewal task stops when the sequence is dropped or its cancellation
/// token (a child of the run's token) fires.
pub struct RenewalStream {
    rx: mpsc::Receiver<RenewalOutcome>,
    cancel: CancellationToken,
}

impl RenewalStream {
    /// `None` once the sequence is over.
    pub async fn next(&mut self) -> Option<RenewalOutcome> {
        self.rx.recv().await
    }
}

impl Drop for RenewalStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Renewer {
    pub fn new(api: Arc<dyn AuthApi>, config: &RenewConfig) -> Self {
        Self {
            api,
            fraction: config.fraction.clamp(0.01, 0.99),
            max_failures: config.max_failures.max(1),
        }
    }

    /// Start renewing `token`. The first attempt happens after `fraction` of
    /// its lease, later ones after `fraction` of whatever lease is left.
    pub fn renew(&self, token: TokenEnvelope, cancel: CancellationToken) -> RenewalStream {
        let (tx, rx) = mpsc::channel(1);
        tokio::spawn(renew_loop(self.clone(), token, tx, cancel.clone()));
        RenewalStream { rx, cancel }
    }

    /// Time to wait before the next renewal, given the lease left.
    pub fn next_attempt_in(&self, remaining: Duration) -> Duration {
        remaining.mul_f64(self.fraction)
    }
}

async fn renew_loop(
    renewer: Renewer,
    token: TokenEnvelope,
    tx: mpsc::Sender<RenewalOutcome>,
    cancel: CancellationToken,
) {
    let metrics = get_metrics().await;
    let mut current = token;
    let mut expires_at = Instant::now() + current.lease_duration;
    let mut failures: u32 = 0;

    let outcome = loop {
        let remaining = expires_at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break ExhaustReason::Expired;
        }

        let wait = renewer.next_attempt_in(remaining);
        debug!(accessor = %current.accessor, ?remaining, ?wait, "next renewal scheduled");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = sleep(wait) => {}
        }
        if Instant::now() >= expires_at {
            break ExhaustReason::Expired;
        }

        metrics.renewals.inc();
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            result = renewer.api.renew_self(&current.client_token, Some(current.lease_duration)) => result,
        };

        match result {
            Ok(response) => {
                let renewed = match TokenEnvelope::from_response(response, TokenOrigin::Renewal, None) {
                    Ok(renewed) => renewed,
                    Err(e) => {
                        metrics.renewal_failures.with_label_values(&[e.reason()]).inc();
                        warn!(error = %e, "renewal response unusable");
                        failures += 1;
                        if failures >= renewer.max_failures {
                            break ExhaustReason::RenewFailures;
                        }
                        continue;
                    }
                };
                if !renewed.is_renewable() {
                    break ExhaustReason::NotRenewable;
                }

                failures = 0;
                expires_at = Instant::now() + renewed.lease_duration;
                info!(
                    accessor = %renewed.accessor,
                    lease_seconds = renewed.lease_duration.as_secs(),
                    "token renewed"
                );
                current = renewed.clone();

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return,
                    sent = tx.send(RenewalOutcome::Renewed(renewed)) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
            Err(e) if is_revocation(&e) => {
                metrics.renewal_failures.with_label_values(&[e.reason()]).inc();
                warn!(error = %e, "renewal refused, token is no longer valid");
                break ExhaustReason::Revoked;
            }
            Err(e) => {
                metrics.renewal_failures.with_label_values(&[e.reason()]).inc();
                failures += 1;
                warn!(
                    error = %e,
                    failures,
                    max_failures = renewer.max_failures,
                    "renewal failed"
                );
                if failures >= renewer.max_failures {
                    break ExhaustReason::RenewFailures;
                }
            }
        }
    };

    info!(reason = %outcome, accessor = %current.accessor, "renewal finished");
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {}
        _ = tx.send(RenewalOutcome::Exhausted(outcome)) => {}
    }
}

/// A 4xx (other than rate limiting) on renew-self means the token itself is
/// no longer accepted; retrying the renewal cannot help.
fn is_revocation(err: &AuthError) -> bool {
    matches!(err.status(), Some(status) if (400..500).contains(&status) && status != 429)
}
