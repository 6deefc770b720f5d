pub mod containers;
pub mod health;
pub mod images;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /jobs                          list
/// /jobs/{id}                     get
/// /jobs/{id}/cancel              cancel (POST)
///
/// /containers/{id}/stop          start stop job (POST)
/// /containers/{id}/restart       start restart job (POST)
/// /containers/{id}/exec          start exec job (POST)
/// /containers/{id}/logs          stream demultiplexed logs (GET)
///
/// /images/pull                   start pull job (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/jobs", jobs::router())
        .nest("/containers", containers::router())
        .nest("/images", images::router())
}
