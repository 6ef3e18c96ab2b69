//! Sequential merge of chunk files into the staging file.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

use super::StoreError;

/// Appends the full contents of each chunk file, in the order given, to a freshly
/// created `destination`. The caller's order (chunk index order) alone decides the
/// byte layout. Fails if any chunk file is missing. Runs on the current thread;
/// call from `spawn_blocking` when used from async code.
pub fn merge_in_order(
    chunk_paths: &[PathBuf],
    destination: &Path,
    cancel: &CancellationToken,
    buffer_size: usize,
) -> Result<u64, StoreError> {
    if let Some(missing) = chunk_paths.iter().find(|p| !p.is_file()) {
        return Err(StoreError::MissingChunk(missing.clone()));
    }

    let mut out = File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(destination)
        .map_err(|e| StoreError::io("create staging file", destination, e))?;

    let mut buf = vec![0u8; buffer_size.max(4096)];
    let mut total = 0u64;
    for path in chunk_paths {
        let mut input = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::MissingChunk(path.clone()))
            }
            Err(e) => return Err(StoreError::io("open chunk", path, e)),
        };
        loop {
            if cancel.is_cancelled() {
                return Err(StoreError::Cancelled);
            }
            let n = input
                .read(&mut buf)
                .map_err(|e| StoreError::io("read chunk", path, e))?;
            if n == 0 {
                break;
            }
            out.write_all(&buf[..n])
                .map_err(|e| StoreError::io("write staging file", destination, e))?;
            total += n as u64;
        }
    }
    out.sync_all()
        .map_err(|e| StoreError::io("sync staging file", destination, e))?;
    tracing::debug!(
        chunks = chunk_paths.len(),
        bytes = total,
        "merged into {}",
        destination.display()
    );
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::temp_chunk_path;

    #[test]
    fn merges_in_given_order() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out.bin");
        let parts: Vec<PathBuf> = (0..3).map(|i| temp_chunk_path(&base, i)).collect();
        // Write in reverse to show creation order doesn't matter.
        std::fs::write(&parts[2], b"cc").unwrap();
        std::fs::write(&parts[0], b"aaaa").unwrap();
        std::fs::write(&parts[1], b"b").unwrap();
        let dest = dir.path().join("out.bin.merged");
        let n = merge_in_order(&parts, &dest, &CancellationToken::new(), 2).unwrap();
        assert_eq!(n, 7);
        assert_eq!(std::fs::read(&dest).unwrap(), b"aaaabcc");
    }

    #[test]
    fn missing_chunk_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out.bin");
        let parts: Vec<PathBuf> = (0..2).map(|i| temp_chunk_path(&base, i)).collect();
        std::fs::write(&parts[0], b"x").unwrap();
        let dest = dir.path().join("out.bin.merged");
        let err = merge_in_order(&parts, &dest, &CancellationToken::new(), 4096).unwrap_err();
        assert!(matches!(err, StoreError::MissingChunk(p) if p == parts[1]));
        assert!(!dest.exists());
    }

    #[test]
    fn cancelled_merge_stops() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("out.bin");
        let part = temp_chunk_path(&base, 0);
        std::fs::write(&part, b"abc").unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = merge_in_order(&[part], &dir.path().join("m"), &cancel, 4096).unwrap_err();
        assert!(matches!(err, StoreError::Cancelled));
    }
}
