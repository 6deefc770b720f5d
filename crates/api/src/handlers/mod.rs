pub mod containers;
pub mod images;
pub mod jobs;

use std::future::Future;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::Json;
use edgegate_core::jobs::JobError;
use edgegate_engine::{EngineClient, EngineError};
use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::response::{DataResponse, JobAccepted};
use crate::state::AppState;

/// Register `op` as a job and answer `202 Accepted` with its ID.
///
/// The engine error `op` finishes with, if any, is recorded on the job.
pub(crate) async fn accept_engine_job<F, Fut>(
    state: &AppState,
    description: String,
    op: F,
) -> AppResult<(StatusCode, Json<DataResponse<JobAccepted>>)>
where
    F: FnOnce(Arc<dyn EngineClient>, CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), EngineError>> + Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    let job_id = state
        .registry
        .create(description, move |cancel| async move {
            op(engine, cancel).await.map_err(JobError::from)
        })
        .await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: JobAccepted { job_id },
        }),
    ))
}
