use std::path::PathBuf;

use thiserror::Error;

use crate::job::{JobId, JobStatus};

/// Rejected orchestrator operation. Job failures are not errors here: they are
/// recorded on the job and published as events.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    #[error("no job with id {0}")]
    NotFound(JobId),
    #[error("cannot {op} job {id} while it is {status}")]
    InvalidState {
        id: JobId,
        status: JobStatus,
        op: &'static str,
    },
    #[error("job {id} already retried {retries} times")]
    RetryLimitReached { id: JobId, retries: u32 },
    #[error("another job is already writing {}", .0.display())]
    OutputInUse(PathBuf),
    #[error("engine is shut down")]
    ShutDown,
}
