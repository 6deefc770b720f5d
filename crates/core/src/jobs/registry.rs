//! In-memory job registry.
//!
//! [`JobRegistry`] turns long-running, cancelable operations into jobs that
//! callers can poll and cancel by ID. Work is executed on the shared
//! [`TaskRunner`]; the registry only records the lifecycle.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use rand::rngs::OsRng;
use rand::TryRngCore;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::filter::JobFilter;
use super::job::{Job, JobView};
use crate::error::CoreError;
use crate::runner::{CompletionHook, Task, TaskRunner};
use crate::types::{JobId, Timestamp};

/// Error type returned by job work functions.
pub type JobError = Box<dyn std::error::Error + Send + Sync>;

/// Result type returned by job work functions.
pub type JobResult = Result<(), JobError>;

/// Tracks every job created by this process.
///
/// Constructed once at startup and shared via `Arc`. All jobs derive their
/// cancellation token from the registry's root token, so
/// [`shutdown`](Self::shutdown) cancels everything still in flight.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<Job>>>,
    runner: Arc<TaskRunner>,
    root: CancellationToken,
}

impl JobRegistry {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            runner,
            root: CancellationToken::new(),
        }
    }

    /// Register a job and queue `work` on the task runner.
    ///
    /// Returns the new job's ID without waiting for the work to start. The
    /// work receives the job's cancellation token; cancellation is
    /// cooperative, so long-running work must select on
    /// `token.cancelled()` to stop early. A failure returned by `work` is
    /// recorded on the job, never returned here.
    ///
    /// Fails with [`CoreError::Capacity`] if the runner's queue is full and
    /// with [`CoreError::Internal`] if no ID could be generated. In both
    /// cases nothing stays registered.
    pub async fn create<F, Fut>(
        &self,
        description: impl Into<String>,
        work: F,
    ) -> Result<JobId, CoreError>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = JobResult> + Send + 'static,
    {
        let id = generate_job_id()?;
        let job = Arc::new(Job::new(id, description.into(), self.root.child_token()));
        let description = job.description.clone();

        self.jobs.write().await.insert(id, Arc::clone(&job));

        let task: Task = Box::new(move |on_complete| execute(job, work, on_complete).boxed());
        if let Err(e) = self.runner.submit(task) {
            self.jobs.write().await.remove(&id);
            tracing::warn!(job_id = %id, description = %description, error = %e, "Job rejected");
            return Err(e);
        }

        tracing::info!(job_id = %id, description = %description, "Job created");
        Ok(id)
    }

    /// Snapshot of a single job.
    pub async fn get(&self, id: JobId) -> Result<JobView, CoreError> {
        Ok(self.find(id).await?.view())
    }

    /// Request cancellation of a job.
    ///
    /// Fires the job's token and stamps `canceled` on the first call; later
    /// calls succeed without changing anything. Does not wait for the work
    /// to observe the cancellation.
    pub async fn cancel(&self, id: JobId) -> Result<(), CoreError> {
        let job = self.find(id).await?;
        if job.cancel() {
            tracing::info!(job_id = %id, "Job cancelled");
        } else {
            tracing::debug!(job_id = %id, "Job already cancelled");
        }
        Ok(())
    }

    /// Snapshots of all jobs matching `filter`, ordered by creation time.
    pub async fn list(&self, filter: &JobFilter) -> Vec<JobView> {
        let jobs: Vec<Arc<Job>> = self.jobs.read().await.values().cloned().collect();

        let mut views: Vec<JobView> = jobs
            .iter()
            .map(|job| job.view())
            .filter(|view| filter.matches(view))
            .collect();

        if filter.sort_desc {
            views.sort_by(|a, b| b.created.cmp(&a.created));
        } else {
            views.sort_by(|a, b| a.created.cmp(&b.created));
        }
        views
    }

    /// Remove terminal jobs created at least `max_age` ago. Returns the
    /// number of jobs removed.
    pub async fn purge_jobs(&self, max_age: Duration) -> usize {
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            // Nothing can be that old.
            return 0;
        };
        self.purge_at(Utc::now(), max_age).await
    }

    /// Number of jobs currently tracked.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Cancel the root token, and with it every job's token.
    ///
    /// Jobs are not stamped `canceled`; work that honours its token will
    /// finish with whatever error it reports for cancellation.
    pub fn shutdown(&self) {
        tracing::info!("Cancelling all in-flight jobs");
        self.root.cancel();
    }

    // ---- private helpers ----

    async fn find(&self, id: JobId) -> Result<Arc<Job>, CoreError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            })
    }

    /// Candidate IDs are collected under the shared lock; the exclusive
    /// lock is held only for the removals.
    async fn purge_at(&self, now: Timestamp, max_age: chrono::Duration) -> usize {
        let candidates: Vec<JobId> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| now - job.created >= max_age && job.is_terminal())
            .map(|job| job.id)
            .collect();

        if candidates.is_empty() {
            return 0;
        }

        let mut jobs = self.jobs.write().await;
        let removed = candidates
            .iter()
            .filter(|id| jobs.remove(*id).is_some())
            .count();

        tracing::debug!(removed, remaining = jobs.len(), "Purged terminal jobs");
        removed
    }
}

/// Execution wrapper run on the task runner.
async fn execute<F, Fut>(job: Arc<Job>, work: F, on_complete: CompletionHook)
where
    F: FnOnce(CancellationToken) -> Fut + Send + 'static,
    Fut: Future<Output = JobResult> + Send + 'static,
{
    job.mark_started();
    tracing::debug!(job_id = %job.id, "Job started");

    // `work` itself runs inside the caught future so a panic before it
    // returns its future is recorded too.
    let token = job.cancel_token();
    let outcome = AssertUnwindSafe(async move { work(token).await })
        .catch_unwind()
        .await;

    let error = match outcome {
        Ok(Ok(())) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some("job panicked".to_string()),
    };

    match &error {
        None => tracing::info!(job_id = %job.id, "Job completed"),
        Some(e) => tracing::warn!(job_id = %job.id, error = %e, "Job failed"),
    }

    job.mark_completed(error);
    on_complete();
}

/// Draw a fresh random ID from the OS entropy source.
fn generate_job_id() -> Result<JobId, CoreError> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CoreError::Internal(format!("Failed to generate job id: {e}")))?;
    Ok(uuid::Builder::from_random_bytes(bytes).into_uuid())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
