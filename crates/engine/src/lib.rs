//! `edgegate-engine` -- container engine access.
//!
//! [`EngineClient`] is the seam between the gateway and the container
//! engine: the four long-running operations the job registry wraps, plus
//! raw log retrieval. [`DockerEngine`] implements it against the Docker
//! Engine HTTP API.

pub mod client;
pub mod docker;
pub mod error;

pub use client::{EngineClient, ExecConfig, LogOptions, LogStream};
pub use docker::DockerEngine;
pub use error::EngineError;
