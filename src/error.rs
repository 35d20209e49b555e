use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Job table is full ({0} jobs)")]
    CapacityExhausted(usize),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
