//! Shared response envelope types for API handlers.
//!
//! Success bodies use a `{ "data": ... }` envelope. Use [`DataResponse`]
//! instead of ad-hoc `serde_json::json!({ "data": ... })`.

use edgegate_core::types::JobId;
use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

/// Body of a `202 Accepted` answer to a request that started a job.
#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: JobId,
}
