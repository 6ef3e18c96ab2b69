//! Job model: identity, lifecycle status, counters and the submission descriptor.

mod chunk;
mod descriptor;
mod progress;

pub use chunk::{Chunk, ChunkStatus};
pub use descriptor::JobDescriptor;
pub use progress::JobProgress;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

use crate::checksum::CHECKSUM_KEY;

/// Job identity (random UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Declared type of a job, as handed over by the front-end that resolved it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// One directly fetchable URL.
    #[default]
    Direct,
    /// An ordered list of segment URLs concatenated into one file.
    Segmented,
    /// Handed to an external program.
    External,
}

/// Job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Downloading => "downloading",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Completed, Failed or Cancelled.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one job. Counters are copied from the live [`JobProgress`]
/// when the snapshot is taken.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub source_url: String,
    pub segment_urls: Vec<String>,
    pub output_path: PathBuf,
    pub kind: JobKind,
    pub status: JobStatus,
    /// 0 until known.
    pub total_size: u64,
    pub downloaded_bytes: u64,
    pub retry_count: u32,
    pub last_error: Option<String>,
    pub metadata: HashMap<String, String>,
    #[serde(skip)]
    pub headers: HashMap<String, String>,
    /// Explicit chunk count; None lets the planner decide.
    pub chunk_count: Option<usize>,
    pub expected_size: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Job {
    /// New Pending job for `desc`, saved to `output_path`.
    pub fn new(desc: JobDescriptor, output_path: PathBuf) -> Self {
        Self {
            id: JobId::new(),
            title: desc.title,
            source_url: desc.source_url,
            segment_urls: desc.segment_urls,
            output_path,
            kind: desc.kind,
            status: JobStatus::Pending,
            total_size: desc.expected_size.unwrap_or(0),
            downloaded_bytes: 0,
            retry_count: 0,
            last_error: None,
            metadata: desc.metadata,
            headers: desc.headers,
            chunk_count: desc.chunk_count,
            expected_size: desc.expected_size,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
        }
    }

    /// Percent complete; 0 while the size is unknown.
    pub fn progress(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        (self.downloaded_bytes as f64 / self.total_size as f64 * 100.0).min(100.0)
    }

    /// Expected hex digest from the `Checksum` metadata entry, if any.
    pub fn checksum(&self) -> Option<&str> {
        self.metadata
            .get(CHECKSUM_KEY)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> Job {
        Job::new(
            JobDescriptor::direct("https://example.com/file.bin"),
            PathBuf::from("/tmp/file.bin"),
        )
    }

    #[test]
    fn new_job_is_pending_with_unknown_size() {
        let j = job();
        assert_eq!(j.status, JobStatus::Pending);
        assert_eq!(j.total_size, 0);
        assert_eq!(j.progress(), 0.0);
        assert!(j.started_at.is_none());
    }

    #[test]
    fn progress_is_percent_of_total() {
        let mut j = job();
        j.total_size = 200;
        j.downloaded_bytes = 50;
        assert_eq!(j.progress(), 25.0);
    }

    #[test]
    fn checksum_from_metadata() {
        let mut j = job();
        assert_eq!(j.checksum(), None);
        j.metadata.insert(CHECKSUM_KEY.into(), " abc ".into());
        assert_eq!(j.checksum(), Some("abc"));
    }

    #[test]
    fn job_id_roundtrips_through_string() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!("nope".parse::<JobId>().is_err());
    }

    #[test]
    fn finished_states() {
        assert!(JobStatus::Completed.is_finished());
        assert!(JobStatus::Cancelled.is_finished());
        assert!(!JobStatus::Paused.is_finished());
        assert!(!JobStatus::Downloading.is_finished());
    }
}
