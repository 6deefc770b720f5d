//! Asynchronous job tracking.
//!
//! A job wraps one long-running engine operation (stop, restart, pull,
//! exec). Callers get an ID back immediately from
//! [`JobRegistry::create`] and observe progress through
//! [`JobRegistry::get`] / [`JobRegistry::list`] snapshots.

mod filter;
mod job;
mod registry;

pub use filter::{JobFilter, StatusFilter};
pub use job::{JobStatus, JobView};
pub use registry::{JobError, JobRegistry, JobResult};
