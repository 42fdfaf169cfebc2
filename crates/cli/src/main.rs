//! Notifications bot entry point.
//!
//! This binary is the composition root for the entire system. Responsibilities:
//!
//! 1. **Parse configuration** — load the optional TOML file and overlay the
//!    command-line flags.
//! 2. **Wire observability** — configure `tracing-subscriber` with a text or
//!    JSON layer and, when an endpoint is configured, an OpenTelemetry OTLP
//!    exporter. All spans and events from every crate flow through here.
//! 3. **Construct infrastructure** — one `KubeClient`, viewed as the
//!    application and project collections, each wrapped in a
//!    `SubscriptionRepository` and handed to the `CommandRouter`.
//! 4. **Serve** — register the JSON adapter and run the HTTP server until
//!    SIGINT or SIGTERM.

mod config;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use bot::{JsonAdapter, Server};
use clap::Parser;
use kubernetes::KubeClient;
use subscriptions::{CommandRouter, ResourceKind, SubscriptionRepository};
use tokio::net::TcpListener;
use tracing::info;

use crate::config::{Args, BotConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = BotConfig::load(args.config.as_deref())?.with_overrides(&args);

    let _telemetry = telemetry::init(
        &args.log_level,
        config.telemetry.log_format,
        config.telemetry.otlp_endpoint.as_deref(),
    )?;

    let kube_config = config.kube_config()?;
    info!(
        api_server = %kube_config.api_server,
        namespace = %kube_config.namespace,
        "connecting to Kubernetes"
    );
    let kube = KubeClient::new(kube_config).context("failed to create Kubernetes client")?;

    let subscriptions = &config.subscriptions;
    let applications = SubscriptionRepository::new(kube.collection(ResourceKind::Application))
        .with_key_selector(subscriptions.key_selector)
        .with_max_conflict_retries(subscriptions.max_conflict_retries);
    let projects = SubscriptionRepository::new(kube.collection(ResourceKind::Project))
        .with_key_selector(subscriptions.key_selector)
        .with_max_conflict_retries(subscriptions.max_conflict_retries);
    let router = CommandRouter::new(applications, projects);

    let server = Server::new(Arc::new(router))
        .add_adapter(&config.server.adapter_path, JsonAdapter)
        .context("invalid server.adapter_path")?;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    server
        .serve_with_shutdown(listener, shutdown_signal())
        .await
        .context("bot server error")?;

    info!("shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT"),
        () = terminate => info!("received SIGTERM"),
    }
}
