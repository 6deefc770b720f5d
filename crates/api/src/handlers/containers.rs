//! Handlers for the `/containers` resource.
//!
//! Stop, restart and exec run as jobs and answer `202 Accepted` right away;
//! logs are streamed back with the engine's stdout/stderr framing removed.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::Json;
use edgegate_core::logstream::LogDemux;
use edgegate_engine::{ExecConfig, LogOptions};
use futures::TryStreamExt;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::handlers::accept_engine_job;
use crate::state::AppState;

/// Reject IDs that cannot be a container ID or name before they are placed
/// in an engine URL path.
fn validate_container_id(id: &str) -> AppResult<()> {
    let valid = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        && !id.starts_with('.');
    if !valid {
        return Err(AppError::BadRequest(format!("Invalid container id '{id}'")));
    }
    Ok(())
}

/// POST /api/v1/containers/{id}/stop
pub async fn stop_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    validate_container_id(&id)?;
    accept_engine_job(
        &state,
        format!("stop container {id}"),
        move |engine, cancel| async move { engine.stop_container(&cancel, &id).await },
    )
    .await
}

/// POST /api/v1/containers/{id}/restart
pub async fn restart_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    validate_container_id(&id)?;
    accept_engine_job(
        &state,
        format!("restart container {id}"),
        move |engine, cancel| async move { engine.restart_container(&cancel, &id).await },
    )
    .await
}

/// POST /api/v1/containers/{id}/exec
///
/// Body: `{ "cmd": [...], "env": [...], "working_dir": ..., "user": ... }`.
/// The job fails if the command exits non-zero.
pub async fn exec_in_container(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<ExecConfig>,
) -> AppResult<impl IntoResponse> {
    validate_container_id(&id)?;
    if config.cmd.is_empty() {
        return Err(AppError::BadRequest("cmd must not be empty".into()));
    }

    accept_engine_job(
        &state,
        format!("exec in container {id}: {}", config.cmd.join(" ")),
        move |engine, cancel| async move { engine.exec(&cancel, &id, &config).await },
    )
    .await
}

/// GET /api/v1/containers/{id}/logs
///
/// Streams the container's combined stdout/stderr as plain bytes. Logs of
/// containers running with a TTY are passed through unchanged.
pub async fn container_logs(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(options): Query<LogOptions>,
) -> AppResult<impl IntoResponse> {
    validate_container_id(&id)?;

    let raw = state.engine.container_logs(&id, &options).await?;
    let body = ReaderStream::new(LogDemux::new(raw)).inspect_err(move |e| {
        tracing::warn!(container = %id, error = %e, "Log stream aborted");
    });

    Ok((
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    ))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn container_ids_and_names_are_accepted() {
        assert!(validate_container_id("4f2a9c1b7e3d").is_ok());
        assert!(validate_container_id("web-1").is_ok());
        assert!(validate_container_id("my_app.worker").is_ok());
    }

    #[test]
    fn path_like_ids_are_rejected() {
        assert_matches!(validate_container_id(""), Err(AppError::BadRequest(_)));
        assert_matches!(validate_container_id(".."), Err(AppError::BadRequest(_)));
        assert_matches!(validate_container_id("a/b"), Err(AppError::BadRequest(_)));
        assert_matches!(validate_container_id("a?b=c"), Err(AppError::BadRequest(_)));
    }
}
