use std::io::ErrorKind;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::{json, Map};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::auth::{read_credential_file, AuthMethod, ClientCapabilities, LoginRequest};
use crate::config::auth::JwtConfig;
use crate::error::MethodError;

/// JWT login from a token file (service-account tokens, OIDC files, ...).
#[derive(Debug)]
pub struct JwtMethod {
    mount_path: String,
    config: JwtConfig,
    cached_jwt: Mutex<Option<String>>,
    changed: Option<Arc<watch::Sender<u64>>>,
    watcher: CancellationToken,
}

impl JwtMethod {
    /// Starts a file watcher when `watch_interval_ms` is configured, so this
    /// has to be called from within a tokio runtime in that case.
    pub fn new(mount_path: String, config: JwtConfig) -> Self {
        let watcher = CancellationToken::new();
        let changed = config.watch_interval_ms.map(|interval_ms| {
            let (generation, _) = watch::channel(0u64);
            let generation = Arc::new(generation);
            tokio::spawn(watch_file(
                config.path.clone(),
                Duration::from_millis(interval_ms),
                generation.clone(),
                watcher.clone(),
            ));
            generation
        });

        Self {
            mount_path,
            config,
            cached_jwt: Mutex::new(None),
            changed,
            watcher,
        }
    }
}

#[async_trait]
impl AuthMethod for JwtMethod {
    fn name(&self) -> &str {
        "jwt"
    }

    async fn authenticate(&self, _client: &ClientCapabilities) -> Result<LoginRequest, MethodError> {
        let path = &self.config.path;
        let mut cached = self.cached_jwt.lock().await;

        let jwt = match read_credential_file(path).await {
            Ok(jwt) if jwt.is_empty() => return Err(MethodError::EmptyCredential("jwt")),
            Ok(jwt) => {
                *cached = Some(jwt.clone());
                jwt
            }
            Err(e) if e.kind() == ErrorKind::NotFound && cached.is_some() => {
                debug!(path = %path, "jwt file gone, using the last token read");
                cached.clone().unwrap_or_default()
            }
            Err(source) => {
                return Err(MethodError::CredentialFile {
                    path: path.clone(),
                    source,
                })
            }
        };

        let mut payload = Map::new();
        payload.insert("role".into(), json!(self.config.role));
        payload.insert("jwt".into(), json!(jwt));
        Ok(LoginRequest::new(self.mount_path.clone(), payload))
    }

    fn credentials_changed(&self) -> Option<watch::Receiver<u64>> {
        self.changed.as_ref().map(|generation| generation.subscribe())
    }

    /// The file is only removed once a login with its content went through.
    async fn on_auth_success(&self) {
        if !self.config.remove_jwt_after_reading {
            return;
        }
        match tokio::fs::remove_file(&self.config.path).await {
            Ok(()) => info!(path = %self.config.path, "jwt file removed after login"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.config.path, error = %e, "failed to remove jwt file"),
        }
    }

    fn shutdown(&self) {
        self.watcher.cancel();
    }
}

async fn modified_at(path: &str) -> Option<SystemTime> {
    tokio::fs::metadata(path).await.ok()?.modified().ok()
}

/// Poll the file's modification time and bump the generation on every change.
async fn watch_file(
    path: String,
    interval: Duration,
    generation: Arc<watch::Sender<u64>>,
    cancel: CancellationToken,
) {
    let mut last_seen = modified_at(&path).await;
    debug!(path = %path, ?interval, "watching jwt file");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!(path = %path, "jwt file watcher stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        let current = modified_at(&path).await;
        if current.is_some() && current != last_seen {
            info!(path = %path, "jwt file changed");
            generation.send_modify(|n| *n += 1);
        }
        if current.is_some() {
            last_seen = current;
        }
    }
}
