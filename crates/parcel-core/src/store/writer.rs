//! Sequential writer for one chunk temp file.

use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::TransferError;

/// Owns the temp file of exactly one chunk (or one single-stream partial file).
/// Opening in resume mode keeps bytes already on disk and appends after them.
pub struct ChunkWriter {
    file: File,
    path: PathBuf,
    written: u64,
}

impl ChunkWriter {
    /// Create (truncating) a new temp file.
    pub fn create(path: &Path) -> Result<Self, TransferError> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(TransferError::Storage)?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
            written: 0,
        })
    }

    /// Open for append, keeping at most `keep` existing bytes (longer files are truncated).
    pub fn resume(path: &Path, keep: u64) -> Result<Self, TransferError> {
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(TransferError::Storage)?;
        let len = file.metadata().map_err(TransferError::Storage)?.len();
        if len > keep {
            file.set_len(keep).map_err(TransferError::Storage)?;
        }
        let mut w = Self {
            file,
            path: path.to_path_buf(),
            written: len.min(keep),
        };
        w.file
            .seek(SeekFrom::Start(w.written))
            .map_err(TransferError::Storage)?;
        Ok(w)
    }

    /// Bytes in the file so far (including resumed bytes).
    pub fn len(&self) -> u64 {
        self.written
    }

    pub fn is_empty(&self) -> bool {
        self.written == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<(), TransferError> {
        self.file.write_all(data).map_err(TransferError::Storage)?;
        self.written += data.len() as u64;
        Ok(())
    }

    /// Flush file data to disk.
    pub fn sync(&self) -> Result<(), TransferError> {
        self.file.sync_data().map_err(TransferError::Storage)
    }
}
