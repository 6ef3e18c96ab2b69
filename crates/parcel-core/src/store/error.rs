use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// File store failure. Resource problems carry a diagnostic instead of a bare OS message.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{op} {}: {source}", .path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("chunk file missing: {}", .0.display())]
    MissingChunk(PathBuf),
    #[error("{} is locked by {}", .path.display(), .holder.as_deref().unwrap_or("another process"))]
    Locked {
        path: PathBuf,
        holder: Option<String>,
    },
    #[error("file operation cancelled")]
    Cancelled,
}

impl StoreError {
    pub(crate) fn io(op: &'static str, path: &std::path::Path, source: io::Error) -> Self {
        StoreError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}
