use tokio::sync::broadcast::error::RecvError;

use super::Orchestrator;
use crate::job::{Job, JobId};

/// Caller's reference to a submitted job.
#[derive(Clone)]
pub struct JobHandle {
    id: JobId,
    orchestrator: Orchestrator,
}

impl JobHandle {
    pub(super) fn new(id: JobId, orchestrator: Orchestrator) -> Self {
        Self { id, orchestrator }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Current state, or None once the job has been cleared.
    pub fn snapshot(&self) -> Option<Job> {
        self.orchestrator.job(self.id)
    }

    /// Wait until the job is Completed, Failed or Cancelled and return its final
    /// snapshot. Returns None if the job is cleared while waiting.
    pub async fn wait(&self) -> Option<Job> {
        let mut events = self.orchestrator.subscribe();
        loop {
            let job = self.snapshot()?;
            if job.status.is_finished() {
                return Some(job);
            }
            match events.recv().await {
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return self.snapshot(),
            }
        }
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle").field("id", &self.id).finish()
    }
}
