//! Error taxonomy shared by the transfer client, planner and strategies.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::store::StoreError;

/// Error returned by a single HTTP transfer (probe, ranged GET or single-stream GET).
/// Kept separate from [`EngineError`] so retry decisions can be made before it is
/// surfaced at job level.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    #[error("{0}")]
    Curl(#[from] curl::Error),
    /// Response had a non-2xx status where no stricter rule applied.
    #[error("HTTP {0}")]
    Http(u32),
    /// Server answered, but not the way the request requires
    /// (wrong status for a range request, missing or mismatched Content-Range).
    #[error("protocol violation: {0}")]
    Protocol(String),
    /// Body ended before the expected number of bytes arrived.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },
    /// Writing the body to disk failed. Not retried.
    #[error("storage: {0}")]
    Storage(#[source] io::Error),
    /// The blocking task running the transfer panicked or was aborted.
    #[error("transfer task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("transfer cancelled")]
    Cancelled,
}

/// Job-level failure recorded on the job and published with the `Failed` event.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("size unknown: server did not report a Content-Length for {url}")]
    SizeUnknown { url: String },
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error("{failed} of {total} chunks failed; first error: {first}")]
    ChunksFailed {
        failed: usize,
        total: usize,
        first: String,
    },
    #[error("{algorithm} checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        algorithm: &'static str,
        expected: String,
        actual: String,
    },
    #[error(
        "not enough disk space at {}: need {needed} bytes, {available} available",
        .path.display()
    )]
    InsufficientSpace {
        path: PathBuf,
        needed: u64,
        available: u64,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("assembled {actual} bytes, expected {expected}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("external handler: {0}")]
    External(String),
    #[error("job has no segment URLs")]
    NoSegments,
    #[error("download cancelled")]
    Cancelled,
}

impl EngineError {
    /// True when the failure is the cooperative-cancellation signal rather than a fault.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            EngineError::Cancelled
                | EngineError::Transfer(TransferError::Cancelled)
                | EngineError::Store(StoreError::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_variants_are_recognized() {
        assert!(EngineError::Cancelled.is_cancelled());
        assert!(EngineError::from(TransferError::Cancelled).is_cancelled());
        assert!(EngineError::from(StoreError::Cancelled).is_cancelled());
        assert!(!EngineError::NoSegments.is_cancelled());
    }

    #[test]
    fn checksum_message_names_both_digests() {
        let e = EngineError::ChecksumMismatch {
            algorithm: "SHA-256",
            expected: "aa".into(),
            actual: "bb".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("SHA-256"));
        assert!(msg.contains("expected aa"));
        assert!(msg.contains("got bb"));
    }
}
