//! intentwatch server
//!
//! Subscribes to the escrow contract of a peer-to-peer on-ramp and turns its
//! event stream into intent outcome notifications.

mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::ConfigLoader;
use intentwatch_core::consumers::{LogConsumer, NotificationConsumer, WebhookConsumer};
use intentwatch_core::events::{correlation_input_channel, notification_channel, raw_log_channel};
use intentwatch_core::processors::{
    ConnectionManager, CorrelationRunner, EventDispatcher, HealthSupervisor, NotificationRelay,
};
use intentwatch_core::transport::WsTransport;
use server::{build_router, run_server};
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// intentwatch - contract event subscriber for intent outcomes
#[derive(Parser, Debug)]
#[command(name = "intentwatch-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./intentwatch.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Emit logs as JSON lines
    #[arg(long, env = "INTENTWATCH_LOG_JSON", default_value = "false")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.log_json);

    tracing::info!("Starting intentwatch-server v{}", env!("CARGO_PKG_VERSION"));

    let config_loader = ConfigLoader::new(&args.config, args.listen);
    let config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;
    tracing::info!(
        contract = %config.contract_address,
        node = %config.node_url,
        "Configuration loaded from {:?}",
        args.config
    );

    // Pipeline: manager -> dispatcher -> correlation -> relay
    let (log_tx, log_rx) = raw_log_channel();
    let (correlation_tx, correlation_rx) = correlation_input_channel();
    let (notification_tx, notification_rx) = notification_channel();

    let (manager, connection) = ConnectionManager::new(
        WsTransport::new(config.node_url.clone()),
        config.contract_address,
        config.connection.clone(),
        log_tx,
    );
    let dispatcher = EventDispatcher::new(log_rx, correlation_tx, notification_tx.clone());
    let correlation = CorrelationRunner::new(
        config.correlation.clone(),
        correlation_rx,
        notification_tx,
    );

    let mut consumers: Vec<Arc<dyn NotificationConsumer>> = vec![Arc::new(LogConsumer)];
    if let Some(webhook) = &config.webhook {
        tracing::info!(url = %webhook.url, "Webhook delivery enabled");
        consumers.push(Arc::new(WebhookConsumer::new(
            webhook.url.clone(),
            webhook.timeout,
            webhook.include_contract_events,
        )));
    }
    let relay = NotificationRelay::new(notification_rx, consumers);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let supervisor = HealthSupervisor::new(
        connection.clone(),
        config.supervisor.health_check_interval,
        shutdown_rx,
    );

    let tasks = vec![
        tokio::spawn(manager.run()),
        tokio::spawn(dispatcher.run()),
        tokio::spawn(correlation.run()),
        tokio::spawn(relay.run()),
        tokio::spawn(supervisor.run()),
    ];

    let router = build_router(AppState::new(connection.clone()));

    tracing::info!("Starting HTTP server on {}", config.server.listen);
    let result = run_server(router, config.server.listen).await;

    // Destroying the connection closes the raw log channel, which lets every
    // downstream runner finish what it holds and exit in turn.
    tracing::info!("Stopping pipeline...");
    let _ = shutdown_tx.send(true);

    let drain = async {
        connection.destroy().await;
        futures_util::future::join_all(tasks).await
    };
    match tokio::time::timeout(config.server.drain_timeout, drain).await {
        Ok(results) => {
            for joined in results {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Pipeline task failed");
                }
            }
            tracing::info!("Server shutdown complete");
        }
        Err(_) => {
            tracing::warn!(
                timeout_secs = config.server.drain_timeout.as_secs(),
                "Pipeline did not drain in time, exiting anyway"
            );
        }
    }

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
