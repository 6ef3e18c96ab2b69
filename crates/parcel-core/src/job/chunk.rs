use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::segmenter::ByteRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

/// One inclusive byte range of a job's resource and the state of its transfer.
/// Owned by a single chunk task until it reaches Completed or Failed.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub index: usize,
    pub start: u64,
    /// Inclusive.
    pub end: u64,
    pub downloaded: u64,
    pub status: ChunkStatus,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Chunk {
    pub fn new(index: usize, range: ByteRange) -> Self {
        Self {
            index,
            start: range.start,
            end: range.end,
            downloaded: 0,
            status: ChunkStatus::Pending,
            error: None,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn range(&self) -> ByteRange {
        ByteRange::new(self.start, self.end)
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn mark_started(&mut self) {
        self.status = ChunkStatus::Downloading;
        self.started_at = Some(Utc::now());
    }

    pub fn mark_completed(&mut self) {
        self.downloaded = self.len();
        self.status = ChunkStatus::Completed;
        self.finished_at = Some(Utc::now());
    }

    pub fn mark_failed(&mut self, error: String) {
        self.status = ChunkStatus::Failed;
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_length_is_inclusive() {
        let c = Chunk::new(0, ByteRange::new(10, 19));
        assert_eq!(c.len(), 10);
        assert_eq!(c.range(), ByteRange::new(10, 19));
        assert_eq!(c.status, ChunkStatus::Pending);
    }

    #[test]
    fn completion_fills_counter() {
        let mut c = Chunk::new(3, ByteRange::new(0, 99));
        c.mark_started();
        c.downloaded = 40;
        c.mark_completed();
        assert_eq!(c.downloaded, 100);
        assert!(c.finished_at.is_some());
    }
}
