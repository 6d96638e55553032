mod api;
mod static_assets;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::sync::Arc;

use anyhow::{Context, Result};
use chatrelay_core::RelayCore;
use chatrelay_core::channel::{TelegramChannel, TelegramConfig, WebhookReceiver};
use chatrelay_core::completion::llm_client_from_settings;
use chatrelay_core::config::RelayConfig;
use chatrelay_core::runtime::channel::spawn_polling_loop;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use api::AppState;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,chatrelay_core=debug,chatrelay_server=debug".into());

    if std::env::var("CHATRELAY_LOG_FORMAT").as_deref() == Ok("json") {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .init();
    }
}

#[tokio::main]
async fn main() {
    init_tracing();

    info!("Starting ChatRelay");

    let config = match RelayConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        error!(error = %format!("{e:#}"), "ChatRelay stopped with an error");
        std::process::exit(1);
    }
}

async fn run(config: RelayConfig) -> Result<()> {
    let telegram = Arc::new(TelegramChannel::new(TelegramConfig::from(&config.telegram)));
    let llm = llm_client_from_settings(&config.completion);
    let core = RelayCore::new(&config, llm, telegram.clone());

    match telegram.test_connection().await {
        Ok(bot) => info!(
            bot_id = bot.id,
            username = bot.username.as_deref().unwrap_or(""),
            "Connected to Telegram"
        ),
        Err(e) => warn!(error = %e, "Telegram connection check failed"),
    }

    let shutdown = CancellationToken::new();
    let (polling, webhook): (_, Option<Arc<dyn WebhookReceiver>>) =
        match config.webhook_endpoint() {
            Some(endpoint) => {
                telegram
                    .set_webhook(&endpoint)
                    .await
                    .context("Failed to register Telegram webhook")?;
                info!(endpoint = %endpoint, "Webhook registered");
                core.recorder.set_online(true);
                let receiver: Arc<dyn WebhookReceiver> = telegram.clone();
                (None, Some(receiver))
            }
            None => {
                if let Err(e) = telegram.delete_webhook().await {
                    warn!(error = %e, "Failed to clear Telegram webhook before polling");
                }
                let handle = spawn_polling_loop(core.handler.clone(), shutdown.clone());
                (Some(handle), None)
            }
        };

    let state = AppState::new(core.reporter.clone(), core.handler.clone(), webhook);
    let app = api::router(state);

    let addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(address = %addr, transport = %config.transport_mode(), "Dashboard listening");

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::select! {
                _ = shutdown_signal() => {}
                _ = server_shutdown.cancelled() => {}
            }
            info!("HTTP server shutting down");
        })
        .await
        .context("HTTP server failed")?;

    shutdown.cancel();
    if let Some(handle) = polling
        && let Err(e) = handle.await
    {
        warn!(error = %e, "Polling task ended abnormally");
    }
    core.recorder.set_online(false);

    info!("ChatRelay stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
