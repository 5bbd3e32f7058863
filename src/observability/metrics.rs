use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Login
    pub login_attempts: IntCounter,
    pub login_failures: IntCounterVec,

    // Renewal
    pub renewals: IntCounter,
    pub renewal_failures: IntCounterVec,
    pub reauthentications: IntCounterVec,

    // Output
    pub tokens_emitted: IntCounterVec,
    pub token_lease_seconds: IntGauge,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("authagent".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Login
            login_attempts: IntCounter::new("login_attempts_total", "Login attempts").unwrap(),
            login_failures: IntCounterVec::new(Opts::new("login_failures_total", "Login failures by reason"), &["reason"]).unwrap(),

            // Renewal
            renewals: IntCounter::new("renewals_total", "Renewal attempts").unwrap(),
            renewal_failures: IntCounterVec::new(Opts::new("renewal_failures_total", "Renewal failures by reason"), &["reason"]).unwrap(),
            reauthentications: IntCounterVec::new(Opts::new("reauthentications_total", "Re-authentications by cause"), &["cause"]).unwrap(),

            // Output
            tokens_emitted: IntCounterVec::new(Opts::new("tokens_emitted_total", "Tokens published to consumers"), &["origin"]).unwrap(),
            token_lease_seconds: IntGauge::new("token_lease_seconds", "Lease of the last published token").unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),
            up: IntGauge::new("up", "1 while the auth loop is running").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.login_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.login_failures.clone())).unwrap();
        reg.register(Box::new(metrics.renewals.clone())).unwrap();
        reg.register(Box::new(metrics.renewal_failures.clone())).unwrap();
        reg.register(Box::new(metrics.reauthentications.clone())).unwrap();
        reg.register(Box::new(metrics.tokens_emitted.clone())).unwrap();
        reg.register(Box::new(metrics.token_lease_seconds.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
