//! Probe module for website monitoring.
//!
//! The scheduler only depends on the [`Probe`] trait; [`HttpProbe`] is the
//! implementation used by the binary.

mod http;

pub use http::*;

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// What a completed probe observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeReading {
    pub elapsed: Duration,
    /// HTTP status code.
    pub status: u16,
}

/// A single network check against a target.
pub trait Probe: Send + Sync + 'static {
    fn probe(&self, target: &str) -> impl Future<Output = Result<ProbeReading, ProbeError>> + Send;
}
