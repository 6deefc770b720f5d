//! `edgegate-core` -- asynchronous job tracking and log stream decoding.
//!
//! - [`jobs`]: the in-memory job registry that turns long-running engine
//!   operations into pollable, cancelable jobs.
//! - [`runner`]: the bounded-concurrency task runner jobs are executed on.
//! - [`logstream`]: the demultiplexer for the engine's framed log transport.

pub mod error;
pub mod jobs;
pub mod logstream;
pub mod runner;
pub mod types;
