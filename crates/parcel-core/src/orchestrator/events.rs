use crate::job::{Job, JobId};

/// Lifecycle and progress notifications, delivered over a broadcast channel.
/// Slow subscribers may miss events (`RecvError::Lagged`); job snapshots are
/// always available from the orchestrator.
#[derive(Debug, Clone)]
pub enum JobEvent {
    Added(Job),
    Started(Job),
    /// Emitted periodically while a job downloads.
    Progress {
        id: JobId,
        downloaded: u64,
        /// 0 while unknown.
        total: u64,
    },
    Paused(JobId),
    /// A paused or failed job went back to Pending.
    Requeued(JobId),
    Completed(Job),
    Failed { job: Job, error: String },
    Cancelled(JobId),
}

impl JobEvent {
    pub fn job_id(&self) -> JobId {
        match self {
            JobEvent::Added(j) | JobEvent::Started(j) | JobEvent::Completed(j) => j.id,
            JobEvent::Failed { job, .. } => job.id,
            JobEvent::Progress { id, .. }
            | JobEvent::Paused(id)
            | JobEvent::Requeued(id)
            | JobEvent::Cancelled(id) => *id,
        }
    }
}
