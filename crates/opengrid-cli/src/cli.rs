//! CLI argument definitions for OpenGrid.
//!
//! All `clap` structures live here so that `main.rs` stays focused on
//! dispatching subcommands.

use clap::{Parser, Subcommand};

/// OpenGrid -- a distributed compute-job cluster.
#[derive(Parser)]
#[command(
    name = "opengrid",
    version,
    about = "OpenGrid -- distributed compute-job cluster",
    long_about = "Clients submit bounded compute jobs with a priority and a latency \
                  deadline; one scheduler routes each job to the least-loaded live \
                  worker; workers execute and publish status and telemetry. All \
                  components communicate only through the shared state store."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the dispatch scheduler (one logical instance per cluster).
    Scheduler {
        /// Port for the Prometheus exporter.
        #[arg(long, default_value_t = 9100)]
        metrics_port: u16,
    },

    /// Run a worker with a cluster-unique id.
    Worker {
        /// Worker id; must be unique across the cluster.
        #[arg(long, env = "WORKER_ID")]
        id: String,

        /// Port for the Prometheus exporter.
        #[arg(long, default_value_t = 9200)]
        metrics_port: u16,
    },

    /// Run the HTTP submission/status API.
    Api {
        /// Address to bind the HTTP server to.
        #[arg(long, default_value = "0.0.0.0")]
        bind: String,

        /// Port to listen on.
        #[arg(long, short, default_value_t = 8000)]
        port: u16,

        /// Port for the Prometheus exporter.
        #[arg(long, default_value_t = 9300)]
        metrics_port: u16,
    },
}
