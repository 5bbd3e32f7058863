use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use auth_agent::auth::build_method;
use auth_agent::client::VaultClient;
use auth_agent::config::proc_loader::file_to_config;
use auth_agent::handler::{AuthHandler, AuthHandlerConfig, TokenEnvelope};
use auth_agent::server;
use auth_agent::utils::logging::LogLevel;
use auth_agent::utils::{channel, logging, shutdown};
use clap::Parser;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "auth-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let service_config = file_to_config(Path::new(&args.config)).await?;
    logging::run(&service_config, args.log_level);

    // -------------------------------
    // 2. Server client and auth method
    // -------------------------------

    let client = VaultClient::new(&service_config.vault)?;
    let capabilities = client.capabilities();
    let method = build_method(&service_config.auto_auth.method);
    info!(
        address = %service_config.vault.address,
        method = service_config.auto_auth.method.method_type(),
        mount_path = %service_config.auto_auth.method.mount_path(),
        "auth agent starting"
    );

    // -------------------------------
    // 3. Cancellation on SIGINT / SIGTERM
    // -------------------------------

    let cancel = CancellationToken::new();
    let signals = tokio::spawn(shutdown::cancel_on_signal(cancel.clone()));

    // -------------------------------
    // 4. Auth loop and token consumers
    // -------------------------------

    let (handler, output) = AuthHandler::new(
        Arc::new(client),
        capabilities,
        AuthHandlerConfig::from(&service_config.auto_auth),
    );
    let auth_loop = tokio::spawn(handler.run(cancel.clone(), method));

    let (subscribers, fan_out) = channel::fan_out(output, 1);
    let consumers: Vec<_> = subscribers
        .into_iter()
        .map(|tokens| tokio::spawn(log_tokens(tokens)))
        .collect();
    let consumer = tokio::spawn(async move {
        let mut received = 0usize;
        for handle in consumers {
            received += handle.await.unwrap_or_default();
        }
        if received == 0 {
            warn!("authentication never succeeded before shutdown");
        }
    });

    // -------------------------------
    // 5. Health / metrics server
    // -------------------------------

    let http_server = tokio::spawn({
        let settings = service_config.settings.clone();
        let cancel = cancel.clone();
        async move {
            if let Err(e) = server::server::start(&settings, cancel).await {
                error!(error = %e, "http server failed");
            }
        }
    });

    let (auth_loop, ..) = tokio::join!(auth_loop, fan_out, consumer, http_server);
    auth_loop?;
    signals.abort();
    info!("auth agent stopped");
    Ok(())
}

/// Log every published token; returns how many were seen.
async fn log_tokens(mut tokens: Receiver<TokenEnvelope>) -> usize {
    let mut received = 0usize;
    while let Some(envelope) = tokens.recv().await {
        received += 1;
        info!(
            accessor = %envelope.accessor,
            origin = envelope.origin.as_str(),
            lease_seconds = envelope.lease_duration.as_secs(),
            "token available"
        );
    }
    received
}
