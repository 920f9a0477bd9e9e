//! HTTP surface for OpenGrid.
//!
//! A deliberately thin front over the state store: validation and enqueue on
//! `POST /submit`, a status read on `GET /status/{job_id}`, and a health
//! probe. Everything else -- scheduling, execution, telemetry -- happens
//! behind the store; this crate holds no cluster state of its own.

pub mod api;
pub mod server;
pub mod state;

pub use server::ApiServer;
pub use state::AppState;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// The address to bind the HTTP server to.
    pub bind_addr: String,
    /// The port to listen on.
    pub port: u16,
    /// Deadline applied when a submission omits `deadline_sec`.
    pub default_deadline_sec: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".into(),
            port: 8000,
            default_deadline_sec: 10,
        }
    }
}
