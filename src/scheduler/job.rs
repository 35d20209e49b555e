use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::EngineOptions;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Running,
    Done,
    Error,
}

impl JobState {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Error)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Queued => write!(f, "queued"),
            JobState::Running => write!(f, "running"),
            JobState::Done => write!(f, "done"),
            JobState::Error => write!(f, "error"),
        }
    }
}

/// Result payload of a successful inference run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub text: String,
    /// Artifact the engine wrote alongside the text, if any.
    pub artifact: Option<PathBuf>,
}

/// One submitted unit of inference work.
///
/// Timestamps are set once and never rewound: `created_at` at submission,
/// `started_at` when the dispatch loop binds a GPU, `finished_at` when the
/// job reaches a terminal state. `gpu_id` is set only while `Running`.
/// At most one of `result`/`error` is ever set, and only in a terminal state.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    /// Reference to the input payload. Owned by the caller, never copied.
    pub input: PathBuf,
    pub model: String,
    pub options: EngineOptions,
    pub state: JobState,
    pub gpu_id: Option<u32>,
    pub result: Option<Transcript>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(input: PathBuf, model: impl Into<String>, options: EngineOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            input,
            model: model.into(),
            options,
            state: JobState::Queued,
            gpu_id: None,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Snapshot copy for status reporting. Readers never hold a lock across
    /// a response; they take a view and drop the guard.
    pub fn view(&self) -> JobView {
        JobView {
            id: self.id,
            input: self.input.clone(),
            model: self.model.clone(),
            state: self.state,
            gpu_id: self.gpu_id,
            result: self.result.clone(),
            error: self.error.clone(),
            created_at: self.created_at,
            started_at: self.started_at,
            finished_at: self.finished_at,
        }
    }
}

/// Read-only snapshot of a job, as exposed by the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: Uuid,
    pub input: PathBuf,
    pub model: String,
    pub state: JobState,
    pub gpu_id: Option<u32>,
    pub result: Option<Transcript>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
