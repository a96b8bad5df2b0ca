//! Liveness and readiness probes.

use axum::{extract::State, http::StatusCode};

use crate::db::{CatalogRepository, DataScope};
use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies the backend answers a public query. Returns 503 Service
/// Unavailable when it does not.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    match CatalogRepository::new(DataScope::anonymous(state.data()))
        .active_stores()
        .await
    {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
