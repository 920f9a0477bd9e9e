//! Shared state for the API handlers.

use opengrid_store::JobBoard;

use crate::ApiConfig;

/// State shared across all API requests.
pub struct AppState {
    /// Typed access to the cluster's shared store.
    pub board: JobBoard,
    /// Server configuration (bind address, default deadline).
    pub config: ApiConfig,
}
