//! Route definitions for the `/containers` resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::containers;
use crate::state::AppState;

/// Routes mounted at `/containers`.
///
/// ```text
/// POST   /{id}/stop       -> stop_container
/// POST   /{id}/restart    -> restart_container
/// POST   /{id}/exec       -> exec_in_container
/// GET    /{id}/logs       -> container_logs
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/stop", post(containers::stop_container))
        .route("/{id}/restart", post(containers::restart_container))
        .route("/{id}/exec", post(containers::exec_in_container))
        .route("/{id}/logs", get(containers::container_logs))
}
