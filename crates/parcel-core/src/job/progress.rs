//! Live byte counters of a running job, shared by every transfer task.

use std::sync::atomic::{AtomicU64, Ordering};

/// Aggregate progress of one job. Chunk writers add to `downloaded` with atomic
/// adds, so concurrent updates are never lost.
#[derive(Debug, Default)]
pub struct JobProgress {
    downloaded: AtomicU64,
    total: AtomicU64,
}

impl JobProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Acquire)
    }

    /// 0 while unknown.
    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Release);
    }

    /// Reset the counter at the start of a run to the bytes already on disk.
    pub fn start_at(&self, already: u64) {
        self.downloaded.store(already, Ordering::Release);
    }

    pub fn add(&self, bytes: u64) {
        self.downloaded.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Percent complete; 0 while the total is unknown.
    pub fn percent(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.downloaded() as f64 / total as f64 * 100.0).min(100.0)
    }
}
