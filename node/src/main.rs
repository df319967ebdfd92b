// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # ALOC Node
//!
//! Entry point for the `aloc-node` binary. Parses CLI arguments, initializes
//! logging and metrics, opens the vault database and serves the API.
//!
//! The binary supports three subcommands:
//!
//! - `run`: load the vault configuration and serve it
//! - `init`: write an example configuration into a data directory
//! - `version`: print build version information

mod api;
mod cli;
mod config;
mod logging;
mod metrics;
mod service;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use aloc_protocol::storage::AlocDb;
use aloc_protocol::SystemClock;

use cli::{AlocNodeCli, Commands};
use config::{NodeConfig, CONFIG_FILE_NAME};
use metrics::NodeMetrics;
use service::VaultService;

/// How often gauges are refreshed between operations, so that accruing
/// interest and fees show up without waiting for the next transaction.
const METRICS_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

#[tokio::main]
async fn main() -> Result<()> {
    let cli = AlocNodeCli::parse();
    logging::init_logging(&cli.log_level, cli.log_format.into());

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Starts the node: vault service, API server and metrics endpoint.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let config_path = args.config_path();
    let config = NodeConfig::load(&config_path)?;

    tracing::info!(
        rpc_port = args.rpc_port,
        metrics_port = args.metrics_port,
        data_dir = %args.data_dir.display(),
        config = %config_path.display(),
        vault = %config.vault.address,
        "starting aloc-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;

    let db = Arc::new(
        AlocDb::open(&db_path)
            .with_context(|| format!("failed to open database at {}", db_path.display()))?,
    );
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Metrics ---
    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);

    // --- Vault ---
    let service = Arc::new(VaultService::open(
        &config,
        db,
        Arc::new(SystemClock),
        Arc::clone(&node_metrics),
    )?);

    let app_state = api::AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            aloc_protocol::config::PROTOCOL_VERSION,
        ),
        service: Arc::clone(&service),
    };

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", args.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", args.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Gauge refresh ---
    let service_ref = Arc::clone(&service);
    let metrics_ref = Arc::clone(&node_metrics);
    let refresh_loop = tokio::spawn(async move {
        let mut interval = tokio::time::interval(METRICS_REFRESH_INTERVAL);
        loop {
            interval.tick().await;
            service_ref.read(|vault| metrics_ref.observe(vault));
            tracing::trace!("vault gauges refreshed");
        }
    });

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    refresh_loop.abort();
    tracing::info!("aloc-node stopped");
    Ok(())
}

/// Writes the example vault configuration into a data directory.
fn init_node(args: cli::InitArgs) -> Result<()> {
    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            config_path.display()
        );
    }

    let config = NodeConfig::example()?;
    config.save(&config_path)?;
    tracing::info!(path = %config_path.display(), "example configuration written");

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Configuration  : {}", config_path.display());
    println!("  Vault          : {}", config.vault.address);
    println!("  Borrower       : {}", config.vault.borrower);

    Ok(())
}

/// Prints version information to stdout.
fn print_version() {
    println!("aloc-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol  {}", aloc_protocol::config::PROTOCOL_VERSION);
    println!("rustc     {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported. A handler that fails to
/// install is logged and never fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
