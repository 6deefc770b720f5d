//! Selection criteria for [`JobRegistry::list`](super::JobRegistry::list).

use serde::Deserialize;

use super::job::{JobStatus, JobView};
use crate::error::CoreError;
use crate::types::Timestamp;

/// Status predicate accepted by the job listing.
///
/// Mirrors [`JobStatus`] plus `ok`, which selects jobs whose work finished
/// without error even if a cancellation raced with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    Pending,
    Running,
    Canceled,
    Completed,
    Error,
    Ok,
}

impl StatusFilter {
    pub fn matches(&self, view: &JobView) -> bool {
        match self {
            Self::Pending => view.status == JobStatus::Pending,
            Self::Running => view.status == JobStatus::Running,
            Self::Canceled => view.status == JobStatus::Canceled,
            Self::Completed => view.status == JobStatus::Completed,
            Self::Error => view.status == JobStatus::Error,
            Self::Ok => view.completed.is_some() && view.error.is_none(),
        }
    }
}

/// Job listing filter (`?status=&since=&until=&sort_desc=`).
///
/// Absent bounds are not applied. `since` is inclusive, `until` exclusive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub status: Option<StatusFilter>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
    #[serde(default)]
    pub sort_desc: bool,
}

impl JobFilter {
    /// Reject a window whose lower bound lies after its upper bound.
    pub fn validate(&self) -> Result<(), CoreError> {
        match (self.since, self.until) {
            (Some(since), Some(until)) if since > until => Err(CoreError::Validation(format!(
                "since ({since}) must not be later than until ({until})"
            ))),
            _ => Ok(()),
        }
    }

    pub fn matches(&self, view: &JobView) -> bool {
        if let Some(status) = &self.status {
            if !status.matches(view) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if view.created < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if view.created >= until {
                return false;
            }
        }
        true
    }
}
