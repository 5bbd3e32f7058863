// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use serde_json::Map;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::auth::{AuthMethod, ClientCapabilities, LoginRequest};
use crate::client::{AuthApi, SecretAuth, SecretResponse, WrapInfo};
use crate::config::auth::AliCloudConfig;
use crate::config::settings::RenewConfig;
use crate::error::{AuthError, MethodError};
use crate::handler::AuthHandlerConfig;
use crate::resilience::backoff::Backoff;

/// Login response used by the upstream alicloud auth test: wrap info and an
/// auth block side by side.
pub const FIXTURE_SECRET: &str = r#"
{
	"lease_id": "foo",
	"renewable": true,
	"lease_duration": 10,
	"data": {
		"key": "value"
	},
	"warnings": [
		"a warning!"
	],
	"wrap_info": {
		"token": "token",
		"accessor": "accessor",
		"ttl": 60,
		"creation_time": "2016-06-07T15:52:10-04:00",
		"wrapped_accessor": "abcd1234"
	},
	"auth": {
		"client_token": "client-token",
		"renewable": true
	}
}"#;

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn alicloud_config() -> AliCloudConfig {
    AliCloudConfig {
        role: "web-workers".into(),
        region: "us-west-1".into(),
        access_key: "some-access-key".into(),
        access_secret: "some-access-secret".into(),
        security_token: None,
    }
}

pub fn handler_config(min_backoff_ms: u64) -> AuthHandlerConfig {
    AuthHandlerConfig {
        backoff: Backoff::new(Duration::from_millis(min_backoff_ms), Duration::from_secs(10)),
        renew: RenewConfig { fraction: 0.5, max_failures: 2 },
    }
}

pub fn auth_response(token: &str, renewable: bool, lease_seconds: u64) -> SecretResponse {
    SecretResponse {
        auth: Some(SecretAuth {
            client_token: token.to_owned(),
            accessor: format!("{}-accessor", token),
            lease_duration: lease_seconds,
            renewable,
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn wrapped_response(wrap_token: &str) -> SecretResponse {
    SecretResponse {
        wrap_info: Some(WrapInfo {
            token: wrap_token.to_owned(),
            accessor: "wrap-accessor".into(),
            ttl: 60,
            creation_time: DateTime::parse_from_rfc3339("2016-06-07T15:52:10-04:00").unwrap(),
            creation_path: "auth/test/login".into(),
            wrapped_accessor: "abcd1234".into(),
        }),
        ..Default::default()
    }
}

/// Scripted server answer.
#[derive(Debug, Clone)]
pub enum Script {
    Ok(SecretResponse),
    Status(u16),
    Transport,
    /// never answers, like a server that accepted the connection and stalled
    Hang,
}

impl Script {
    async fn play(&self) -> Result<SecretResponse, AuthError> {
        match self {
            Script::Ok(response) => Ok(response.clone()),
            Script::Status(status) => Err(AuthError::ServerRejection {
                status: *status,
                errors: vec![format!("scripted {}", status)],
            }),
            Script::Transport => Err(AuthError::Transport("connection refused".into())),
            Script::Hang => std::future::pending().await,
        }
    }
}

#[derive(Default)]
struct Calls {
    logins: usize,
    renewals: Vec<Instant>,
    unwraps: Vec<String>,
}

/// In-memory `AuthApi`: queued answers first, then the default forever.
pub struct ScriptedApi {
    default_login: Script,
    logins: Mutex<VecDeque<Script>>,
    default_renewal: Script,
    renewals: Mutex<VecDeque<Script>>,
    unwrap: Script,
    calls: Mutex<Calls>,
}

impl ScriptedApi {
    pub fn new(default_login: Script) -> Self {
        Self {
            default_login,
            logins: Mutex::new(VecDeque::new()),
            default_renewal: Script::Status(500),
            renewals: Mutex::new(VecDeque::new()),
            unwrap: Script::Status(400),
            calls: Mutex::new(Calls::default()),
        }
    }

    pub fn with_logins(self, scripts: Vec<Script>) -> Self {
        *self.logins.lock().unwrap() = scripts.into();
        self
    }

    pub fn with_renewal(mut self, script: Script) -> Self {
        self.default_renewal = script;
        self
    }

    pub fn with_renewals(self, scripts: Vec<Script>) -> Self {
        *self.renewals.lock().unwrap() = scripts.into();
        self
    }

    pub fn with_unwrap(mut self, script: Script) -> Self {
        self.unwrap = script;
        self
    }

    pub fn login_calls(&self) -> usize {
        self.calls.lock().unwrap().logins
    }

    pub fn renew_calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().renewals.clone()
    }

    pub fn unwrap_calls(&self) -> usize {
        self.calls.lock().unwrap().unwraps.len()
    }

    pub fn unwrapped_tokens(&self) -> Vec<String> {
        self.calls.lock().unwrap().unwraps.clone()
    }
}

#[async_trait]
impl AuthApi for ScriptedApi {
    async fn login(&self, _request: &LoginRequest) -> Result<SecretResponse, AuthError> {
        self.calls.lock().unwrap().logins += 1;
        let next = self.logins.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default_login.clone()).play().await
    }

    async fn renew_self(
        &self,
        _token: &str,
        _increment: Option<Duration>,
    ) -> Result<SecretResponse, AuthError> {
        self.calls.lock().unwrap().renewals.push(Instant::now());
        let next = self.renewals.lock().unwrap().pop_front();
        next.unwrap_or_else(|| self.default_renewal.clone()).play().await
    }

    async fn unwrap(&self, wrap_token: &str) -> Result<SecretResponse, AuthError> {
        self.calls.lock().unwrap().unwraps.push(wrap_token.to_owned());
        self.unwrap.play().await
    }
}

/// Auth method with a fixed payload, optional change notifications and
/// counters for the lifecycle hooks.
pub struct StaticMethod {
    fail: bool,
    changed: Option<watch::Sender<u64>>,
    successes: AtomicUsize,
    shut_down: AtomicBool,
}

impl StaticMethod {
    pub fn new() -> Self {
        Self {
            fail: false,
            changed: None,
            successes: AtomicUsize::new(0),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new() }
    }

    pub fn with_notifications() -> Self {
        Self {
            changed: Some(watch::channel(0).0),
            ..Self::new()
        }
    }

    pub fn notify_changed(&self) {
        if let Some(changed) = &self.changed {
            changed.send_modify(|generation| *generation += 1);
        }
    }

    pub fn successes(&self) -> usize {
        self.successes.load(Ordering::SeqCst)
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthMethod for StaticMethod {
    fn name(&self) -> &str {
        "static"
    }

    async fn authenticate(&self, _client: &ClientCapabilities) -> Result<LoginRequest, MethodError> {
        if self.fail {
            return Err(MethodError::Other("credential source unavailable".into()));
        }
        let mut payload = Map::new();
        payload.insert("role".into(), json!("test"));
        Ok(LoginRequest::new("auth/test", payload))
    }

    fn credentials_changed(&self) -> Option<watch::Receiver<u64>> {
        self.changed.as_ref().map(|changed| changed.subscribe())
    }

    async fn on_auth_success(&self) {
        self.successes.fetch_add(1, Ordering::SeqCst);
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
