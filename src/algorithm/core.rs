use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use crate::model::set::Tick;

/// Failures raised by algorithm construction or invocation.
#[derive(Debug, Error)]
pub enum AlgorithmError {
    #[error("no algorithm registered under '{0}'")]
    Unknown(String),
    #[error("algorithm configuration invalid: {0}")]
    InvalidConfig(String),
    #[error("algorithm failed: {0}")]
    Failed(String),
}

/// User algorithm driven by a stage: zero or more `B` outputs per `A` input,
/// plus a flush hook that releases pent-up state when a heartbeat advances
/// logical time.
///
/// Implementations must not block; the worker thread's only suspension
/// points are its channel operations.
pub trait Algorithm<A, B>: Send {
    /// Processes one input, appending any produced outputs.
    fn apply(&mut self, input: &A, out: &mut Vec<B>) -> Result<(), AlgorithmError>;

    /// Releases buffered state up to `end_time`. Only meaningful for
    /// algorithms that hold elements across inputs; the default does
    /// nothing.
    fn flush(&mut self, _end_time: Tick, _out: &mut Vec<B>) -> Result<(), AlgorithmError> {
        Ok(())
    }
}

/// Builds a fresh algorithm instance from its opaque configuration.
///
/// Stages invoke the factory on every `start` so no algorithm state
/// survives across runs.
pub type AlgorithmFactory<A, B> =
    Arc<dyn Fn(&Value) -> Result<Box<dyn Algorithm<A, B>>, AlgorithmError> + Send + Sync>;

impl<A, B> std::fmt::Debug for dyn Algorithm<A, B> + '_ {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<algorithm>")
    }
}
