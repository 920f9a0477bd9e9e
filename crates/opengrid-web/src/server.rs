//! API server setup and startup.
//!
//! [`ApiServer`] composes the Axum router, registers the routes, and starts
//! the HTTP listener.

use std::sync::Arc;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use opengrid_store::JobBoard;

use crate::ApiConfig;
use crate::api;
use crate::state::AppState;

/// The OpenGrid submission/status server.
pub struct ApiServer {
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server over `board`.
    pub fn new(config: ApiConfig, board: JobBoard) -> Self {
        let state = Arc::new(AppState { board, config });
        Self { state }
    }

    /// Return the `host:port` string this server will bind to.
    pub fn addr(&self) -> String {
        format!(
            "{}:{}",
            self.state.config.bind_addr, self.state.config.port
        )
    }

    /// Build the Axum router with all routes registered.
    fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST])
            .allow_headers(tower_http::cors::Any);

        Router::new()
            .route("/submit", post(api::submit))
            .route("/status/{job_id}", get(api::status))
            .route("/healthz", get(api::healthz))
            .layer(cors)
            .with_state(Arc::clone(&self.state))
    }

    /// Start the server and block until it is shut down.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP listener cannot be bound.
    pub async fn start(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = self.addr();
        let router = self.router();

        tracing::info!(addr = %addr, "starting api server");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, router).await?;
        Ok(())
    }
}
