//! CLI entry point for OpenGrid.
//!
//! Provides the `opengrid` command with one subcommand per cluster role:
//! `scheduler`, `worker`, and `api`. Each subcommand initializes tracing,
//! installs the Prometheus exporter, connects to the state store, and runs
//! its component until killed.

mod cli;
mod helpers;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use opengrid_scheduler::{Scheduler, SchedulerConfig};
use opengrid_web::{ApiConfig, ApiServer};
use opengrid_worker::{Worker, WorkerConfig};

use crate::cli::{Cli, Commands};
use crate::helpers::{connect_board, env_u32, init_tracing, install_metrics};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing).
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command {
        Commands::Scheduler { metrics_port } => cmd_scheduler(metrics_port).await,
        Commands::Worker { id, metrics_port } => cmd_worker(id, metrics_port).await,
        Commands::Api {
            bind,
            port,
            metrics_port,
        } => cmd_api(bind, port, metrics_port).await,
    }
}

// ---------------------------------------------------------------------------
// Subcommand: scheduler
// ---------------------------------------------------------------------------

async fn cmd_scheduler(metrics_port: u16) -> Result<()> {
    init_tracing("info");
    install_metrics(metrics_port)?;

    let board = connect_board().await?;
    let scheduler = Scheduler::new(board, SchedulerConfig::default());

    info!("starting scheduler");
    scheduler.run().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: worker
// ---------------------------------------------------------------------------

async fn cmd_worker(id: String, metrics_port: u16) -> Result<()> {
    init_tracing("info");
    install_metrics(metrics_port)?;

    let board = connect_board().await?;
    let worker = Worker::new(board, id, WorkerConfig::default());

    info!(worker = %worker.id(), "starting worker");
    worker.run().await;
    Ok(())
}

// ---------------------------------------------------------------------------
// Subcommand: api
// ---------------------------------------------------------------------------

async fn cmd_api(bind: String, port: u16, metrics_port: u16) -> Result<()> {
    init_tracing("info");
    install_metrics(metrics_port)?;

    let board = connect_board().await?;
    let config = ApiConfig {
        bind_addr: bind,
        port,
        default_deadline_sec: env_u32("SLO_DEADLINE_SEC", 10)?,
    };

    let server = ApiServer::new(config, board);
    info!(addr = %server.addr(), "starting api");
    server
        .start()
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
    Ok(())
}
