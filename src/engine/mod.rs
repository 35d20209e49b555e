//! Boundary to the external inference engine.
//!
//! The engine is an opaque blocking call: given an input reference, a model
//! and a GPU to run on, it either returns a [`Transcript`] or fails. The
//! adapter invokes it from a blocking-capable thread and normalizes every
//! outcome, including a panicking engine, into the job store's vocabulary.

pub(crate) mod adapter;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::scheduler::Transcript;

/// Per-job tuning passed through to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineOptions {
    /// Prompt fed to the model ahead of the input, if any.
    pub initial_prompt: Option<String>,
    /// Decoder beam width.
    pub beam_size: u32,
    /// Hard cap on one inference call, passed through to the engine. Expiry
    /// is a normal `Error` outcome, not a scheduler concern.
    pub timeout: Option<Duration>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            initial_prompt: None,
            beam_size: 5,
            timeout: None,
        }
    }
}

/// Everything the engine needs for one bound (job, GPU) pair.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub input: PathBuf,
    pub model: String,
    /// Device affinity for the call.
    pub gpu_id: u32,
    pub options: EngineOptions,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to read input: {0}")]
    Io(#[from] std::io::Error),

    #[error("Inference failed: {0}")]
    Failed(String),

    #[error("Inference timed out after {0:?}")]
    TimedOut(Duration),
}

/// The external inference engine.
///
/// `run` blocks for the duration of one inference call; the scheduler only
/// ever invokes it through [`tokio::task::spawn_blocking`].
pub trait InferenceEngine: Send + Sync + 'static {
    fn run(&self, request: &InferenceRequest) -> Result<Transcript, EngineError>;
}
