//! Coordinator Service
//!
//! Watches cluster membership, keeps a gRPC channel to every node's reporter
//! agent and serves the profiling HTTP API.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vantage_coordinator::{
    agent::GrpcConnector,
    config::{CoordinatorConfig, LogFormat},
    membership::FileMembership,
    server::{api, http},
    Coordinator, CoordinatorSettings,
};

#[derive(Parser, Debug)]
#[command(name = "vantage-coordinator")]
#[command(about = "Cluster profiling coordinator", long_about = None)]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, env = "VANTAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = CoordinatorConfig::load(args.config.as_deref())?;
    init_tracing(args.verbose, config.log_format);

    info!("Starting Vantage coordinator");
    info!(
        membership_file = %config.membership_file.display(),
        interval_secs = config.reconcile_interval_secs,
        "Configuration loaded"
    );

    let membership = Arc::new(FileMembership::new(config.membership_file.clone()));
    let connector = Arc::new(
        GrpcConnector::new(config.connect_timeout(), config.agent_token.as_deref())
            .context("Invalid agent token")?,
    );

    let coordinator =
        Coordinator::init(CoordinatorSettings::from(&config), membership, connector).await;
    let shutdown = coordinator.shutdown_token();

    let admin_addr = config.admin_socket_addr()?;
    let admin = tokio::spawn(http::serve_admin(
        admin_addr,
        coordinator.pool().clone(),
        shutdown.clone(),
    ));

    let state = Arc::new(api::ApiState::new(&coordinator, config.api_token.clone()));
    let api_server = api::serve_api(config.api_socket_addr()?, state, shutdown.clone());

    let served = tokio::select! {
        res = api_server => res.context("API server error"),
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl-C, shutting down");
            Ok(())
        }
    };

    coordinator.teardown().await;
    if let Err(e) = admin.await.context("Admin task panicked")? {
        error!("Admin HTTP server error: {}", e);
    }
    served
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool, format: LogFormat) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init(),
    }
}
