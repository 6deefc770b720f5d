//! A single tracked job and its externally visible snapshot.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::types::{JobId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status derived from a job's timestamps. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Canceled,
    Completed,
    Error,
}

impl JobStatus {
    /// Derive the status from the mutable job fields.
    ///
    /// `canceled` wins over everything else, but the other fields are kept
    /// as they are: a job that finished before it noticed the cancellation
    /// reports `canceled` while still carrying `completed` (and `error`).
    pub fn derive(
        started: Option<Timestamp>,
        completed: Option<Timestamp>,
        canceled: Option<Timestamp>,
        has_error: bool,
    ) -> Self {
        match (canceled, completed, started) {
            (Some(_), _, _) => Self::Canceled,
            (None, Some(_), _) if has_error => Self::Error,
            (None, Some(_), _) => Self::Completed,
            (None, None, Some(_)) => Self::Running,
            (None, None, None) => Self::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Canceled => "canceled",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }

    /// Whether the job will not transition any further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Canceled | Self::Completed | Self::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobView
// ---------------------------------------------------------------------------

/// Serializable point-in-time snapshot of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    pub id: JobId,
    pub description: String,
    pub status: JobStatus,
    pub created: Timestamp,
    pub started: Option<Timestamp>,
    pub completed: Option<Timestamp>,
    pub canceled: Option<Timestamp>,
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct JobState {
    started: Option<Timestamp>,
    completed: Option<Timestamp>,
    canceled: Option<Timestamp>,
    error: Option<String>,
}

/// State holder for one asynchronous operation.
///
/// Owned by the registry behind an `Arc`. The immutable fields are read
/// without locking; the timestamps and error sit behind a per-job lock so
/// the execution wrapper and registry readers never hold the registry-wide
/// lock while touching them.
#[derive(Debug)]
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) description: String,
    pub(crate) created: Timestamp,
    cancel: CancellationToken,
    state: Mutex<JobState>,
}

impl Job {
    pub(crate) fn new(id: JobId, description: String, cancel: CancellationToken) -> Self {
        Self {
            id,
            description,
            created: Utc::now(),
            cancel,
            state: Mutex::new(JobState::default()),
        }
    }

    /// Token handed to the job's work function.
    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stamp `started`. Later calls are ignored.
    pub(crate) fn mark_started(&self) {
        let mut state = self.lock();
        if state.started.is_none() {
            state.started = Some(Utc::now().max(self.created));
        }
    }

    /// Stamp `completed`, recording `error` when the work failed. Later
    /// calls are ignored.
    pub(crate) fn mark_completed(&self, error: Option<String>) {
        let mut state = self.lock();
        if state.completed.is_some() {
            return;
        }
        let floor = state.started.unwrap_or(self.created);
        state.error = error;
        state.completed = Some(Utc::now().max(floor));
    }

    /// Cancel the job's token and stamp `canceled` on the first call.
    ///
    /// Returns `true` if this call stamped the timestamp.
    pub(crate) fn cancel(&self) -> bool {
        self.cancel.cancel();

        let mut state = self.lock();
        if state.canceled.is_some() {
            return false;
        }
        state.canceled = Some(Utc::now());
        true
    }

    pub(crate) fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    fn status(&self) -> JobStatus {
        let state = self.lock();
        JobStatus::derive(
            state.started,
            state.completed,
            state.canceled,
            state.error.is_some(),
        )
    }

    pub(crate) fn view(&self) -> JobView {
        let state = self.lock();
        JobView {
            id: self.id,
            description: self.description.clone(),
            status: JobStatus::derive(
                state.started,
                state.completed,
                state.canceled,
                state.error.is_some(),
            ),
            created: self.created,
            started: state.started,
            completed: state.completed,
            canceled: state.canceled,
            error: state.error.clone(),
        }
    }

    /// Lock the mutable state. Nothing panics while the lock is held, but
    /// a poisoned lock still yields consistent data, so recover from it.
    fn lock(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
