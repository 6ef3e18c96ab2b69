//! Disk I/O and file lifecycle.
//!
//! Every chunk is written to its own temp file (`<output>.partNNN`), so no two
//! tasks ever write the same file. Once all chunks are done they are appended in
//! index order into a staging file (`<output>.merged`), which is verified and
//! then renamed over the destination.

mod error;
mod finalize;
mod lock;
mod merge;
mod paths;
mod space;
mod writer;

pub use error::StoreError;
pub use finalize::finalize;
pub use lock::{check_not_locked, is_locked, lock_holder};
pub use merge::merge_in_order;
pub use paths::{
    partial_path, resume_record_path, staging_path, temp_chunk_path, temp_files_for, CHUNK_SUFFIX,
    RESUME_SUFFIX, STAGING_SUFFIX,
};
pub use space::available_space;
pub use writer::ChunkWriter;

use std::io;
use std::path::{Path, PathBuf};

/// Create `dir` and its parents if missing.
pub fn ensure_directory(dir: &Path) -> Result<(), StoreError> {
    std::fs::create_dir_all(dir).map_err(|e| StoreError::io("create directory", dir, e))
}

/// Delete a file, treating "already gone" as success. Returns true if a file was removed.
pub fn safe_delete(path: &Path) -> Result<bool, StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(StoreError::io("delete", path, e)),
    }
}

/// Best-effort removal of temp files; failures are logged, not returned.
pub fn cleanup(paths: &[PathBuf]) {
    for p in paths {
        if let Err(e) = safe_delete(p) {
            tracing::warn!("cleanup: {e}");
        }
    }
}

/// Size of an existing file, or 0 if it does not exist.
pub fn existing_len(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
