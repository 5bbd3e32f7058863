// End-to-end runs of the auth loop against a local HTTP server:
//  - a server that always answers with the upstream fixture envelope
//  - a server that always fails
//  - a server that fails once, then succeeds
//  - a wrapped login that must be unwrapped
//  - a non-renewable token that must not be renewed

#[cfg(test)]
mod test {

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use axum::routing::post;
    use axum::Router;
    use http::{HeaderMap, StatusCode};
    use httpmock::Method::POST;
    use httpmock::MockServer;
    use serde_json::json;
    use tokio::sync::mpsc::Receiver;
    use tokio::time::timeout;
    use tokio_util::sync::CancellationToken;

    use crate::auth::methods::alicloud::AliCloudMethod;
    use crate::auth::AuthMethod;
    use crate::client::VaultClient;
    use crate::config::auth::VaultConfig;
    use crate::handler::{AuthHandler, TokenEnvelope};
    use crate::tests::common::{alicloud_config, handler_config, spawn_axum, FIXTURE_SECRET};
    use crate::utils::shutdown::cancel_after;

    fn start_handler(
        address: String,
        min_backoff_ms: u64,
        cancel: CancellationToken,
    ) -> (tokio::task::JoinHandle<()>, Receiver<TokenEnvelope>) {
        let client = VaultClient::new(&VaultConfig {
            address,
            namespace: None,
            timeout_ms: 2000,
            wrap_ttl_seconds: None,
        })
        .unwrap();
        let capabilities = client.capabilities();
        let method: Arc<dyn AuthMethod> =
            Arc::new(AliCloudMethod::new("auth/alicloud".into(), alicloud_config()));

        let (handler, rx) =
            AuthHandler::new(Arc::new(client), capabilities, handler_config(min_backoff_ms));
        (tokio::spawn(handler.run(cancel, method)), rx)
    }

    async fn drain(rx: &mut Receiver<TokenEnvelope>) -> Vec<TokenEnvelope> {
        let mut tokens = Vec::new();
        while let Some(token) = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("channel closes after cancellation")
        {
            tokens.push(token);
        }
        tokens
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn fixture_server_yields_client_token() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/auth/alicloud/login");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .body(FIXTURE_SECRET);
            })
            .await;
        let unwrap = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/sys/wrapping/unwrap")
                    .header("X-Vault-Token", "token");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .body(FIXTURE_SECRET);
            })
            .await;

        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_secs(10));
        let (handle, mut rx) = start_handler(server.base_url(), 100, cancel.clone());

        let first = timeout(Duration::from_secs(10), rx.recv())
            .await
            .expect("token before deadline")
            .expect("at least one token");
        assert_eq!(first.client_token, "client-token");
        assert_eq!(first.warnings, vec!["a warning!".to_string()]);
        assert!(first.wrap_info.is_some());

        cancel.cancel();
        for token in drain(&mut rx).await {
            assert_eq!(token.client_token, "client-token");
        }
        handle.await.unwrap();

        login.assert_async().await;
        unwrap.assert_async().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn failing_server_emits_nothing_and_closes() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST);
                then.status(500).body(r#"{"errors":["internal error"]}"#);
            })
            .await;

        let cancel = CancellationToken::new();
        cancel_after(&cancel, Duration::from_millis(1200));
        let (handle, mut rx) = start_handler(server.base_url(), 50, cancel);

        assert!(drain(&mut rx).await.is_empty());
        timeout(Duration::from_secs(2), handle)
            .await
            .expect("run returns after cancellation")
            .unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn one_failure_then_success_emits_once_after_backoff() {
        let logins = Arc::new(AtomicUsize::new(0));
        let counter = logins.clone();
        let router = Router::new().route(
            "/v1/auth/alicloud/login",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::INTERNAL_SERVER_ERROR, r#"{"errors":["transient"]}"#.to_owned())
                    } else {
                        let body = json!({
                            "auth": {
                                "client_token": "s.after-retry",
                                "accessor": "acc",
                                "renewable": false,
                                "lease_duration": 3600
                            }
                        });
                        (StatusCode::OK, body.to_string())
                    }
                }
            }),
        );
        let (server, addr) = spawn_axum(router).await;

        let min_backoff = Duration::from_millis(300);
        let cancel = CancellationToken::new();
        let start = Instant::now();
        let (handle, mut rx) =
            start_handler(format!("http://{}", addr), min_backoff.as_millis() as u64, cancel.clone());

        let token = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert!(start.elapsed() >= min_backoff);
        assert_eq!(token.client_token, "s.after-retry");

        // the token is held for half its hour-long lease; nothing else arrives
        tokio::time::sleep(Duration::from_millis(300)).await;
        cancel.cancel();
        assert!(drain(&mut rx).await.is_empty());
        handle.await.unwrap();
        assert_eq!(logins.load(Ordering::SeqCst), 2);

        server.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn wrapped_login_emits_unwrapped_token() {
        let unwrap_tokens = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let seen = unwrap_tokens.clone();
        let router = Router::new()
            .route(
                "/v1/auth/alicloud/login",
                post(|| async {
                    json!({
                        "wrap_info": {
                            "token": "wrap-token",
                            "accessor": "wrap-accessor",
                            "ttl": 60,
                            "creation_time": "2016-06-07T15:52:10-04:00",
                            "wrapped_accessor": "abcd1234"
                        }
                    })
                    .to_string()
                }),
            )
            .route(
                "/v1/sys/wrapping/unwrap",
                post(move |headers: HeaderMap| {
                    let seen = seen.clone();
                    async move {
                        let token = headers
                            .get("X-Vault-Token")
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or_default()
                            .to_owned();
                        seen.lock().unwrap().push(token);
                        json!({
                            "auth": {
                                "client_token": "s.unwrapped",
                                "renewable": false,
                                "lease_duration": 3600
                            }
                        })
                        .to_string()
                    }
                }),
            );
        let (server, addr) = spawn_axum(router).await;

        let cancel = CancellationToken::new();
        let (handle, mut rx) = start_handler(format!("http://{}", addr), 100, cancel.clone());

        let token = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(token.client_token, "s.unwrapped");
        assert_eq!(token.wrap_info.unwrap().token, "wrap-token");
        assert_eq!(*unwrap_tokens.lock().unwrap(), vec!["wrap-token".to_string()]);

        cancel.cancel();
        handle.await.unwrap();
        server.abort();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn non_renewable_token_is_never_renewed() {
        let logins = Arc::new(AtomicUsize::new(0));
        let renewals = Arc::new(AtomicUsize::new(0));
        let (login_counter, renew_counter) = (logins.clone(), renewals.clone());
        let router = Router::new()
            .route(
                "/v1/auth/alicloud/login",
                post(move || {
                    let counter = login_counter.clone();
                    async move {
                        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        json!({
                            "auth": {
                                "client_token": format!("s.{}", n),
                                "renewable": false,
                                "lease_duration": 1
                            }
                        })
                        .to_string()
                    }
                }),
            )
            .route(
                "/v1/auth/token/renew-self",
                post(move || {
                    let counter = renew_counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        StatusCode::OK
                    }
                }),
            );
        let (server, addr) = spawn_axum(router).await;

        let cancel = CancellationToken::new();
        let (handle, mut rx) = start_handler(format!("http://{}", addr), 100, cancel.clone());

        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        let second = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert_eq!(first.client_token, "s.1");
        assert_eq!(second.client_token, "s.2");

        cancel.cancel();
        drain(&mut rx).await;
        handle.await.unwrap();
        assert_eq!(renewals.load(Ordering::SeqCst), 0);
        assert!(logins.load(Ordering::SeqCst) >= 2);

        server.abort();
    }
}
