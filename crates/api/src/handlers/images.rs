//! Handlers for the `/images` resource.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::handlers::accept_engine_job;
use crate::state::AppState;

/// Request body for `POST /images/pull`.
#[derive(Debug, Deserialize)]
pub struct PullImageRequest {
    /// `name[:tag]` or `name@digest`.
    pub reference: String,
}

/// POST /api/v1/images/pull
///
/// Start pulling an image. Returns 202 with the job ID.
pub async fn pull_image(
    State(state): State<AppState>,
    Json(input): Json<PullImageRequest>,
) -> AppResult<impl IntoResponse> {
    let reference = input.reference.trim().to_string();
    if !is_valid_image_reference(&reference) {
        return Err(AppError::BadRequest(format!(
            "Invalid image reference '{reference}'"
        )));
    }

    accept_engine_job(
        &state,
        format!("pull image {reference}"),
        move |engine, cancel| async move { engine.pull_image(&cancel, &reference).await },
    )
    .await
}

fn is_valid_image_reference(reference: &str) -> bool {
    !reference.is_empty()
        && reference.len() <= 255
        && reference
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphanumeric())
        && reference.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '@')
        })
}
