//! Merge, verify and promote: the steps shared by every multi-file strategy.

use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::checksum::verify_path;
use crate::error::EngineError;
use crate::store::{
    available_space, check_not_locked, cleanup, finalize, merge_in_order, resume_record_path,
    safe_delete, staging_path,
};

/// Fail with `InsufficientSpace` if the filesystem holding `dir` has less than
/// `needed` bytes free. Unknown free space is not an error.
pub fn ensure_space(dir: &Path, needed: u64) -> Result<(), EngineError> {
    match available_space(dir) {
        Ok(Some(available)) if available < needed => Err(EngineError::InsufficientSpace {
            path: dir.to_path_buf(),
            needed,
            available,
        }),
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::debug!("free space query for {} failed: {e}", dir.display());
            Ok(())
        }
    }
}

/// Merges `parts` (in the given order) into `<output>.merged`, verifies the
/// optional checksum, then moves the staging file over `output` and deletes
/// the parts and their resume record. Returns the final size.
///
/// On failure the staging file is removed and `output` is left untouched. Parts
/// are kept for a later retry, except after a checksum mismatch, where they are
/// known to be bad.
pub async fn assemble(
    parts: Vec<PathBuf>,
    output: &Path,
    expected_size: Option<u64>,
    checksum: Option<String>,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, EngineError> {
    let staging = staging_path(output);
    let result = promote(&parts, &staging, output, expected_size, checksum, buffer_size, cancel).await;
    let discard_parts = match &result {
        Ok(_) => true,
        Err(e) => {
            let _ = safe_delete(&staging);
            matches!(e, EngineError::ChecksumMismatch { .. })
        }
    };
    if discard_parts {
        cleanup(&parts);
        cleanup(&[resume_record_path(output)]);
    }
    result
}

async fn promote(
    parts: &[PathBuf],
    staging: &Path,
    output: &Path,
    expected_size: Option<u64>,
    checksum: Option<String>,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<u64, EngineError> {
    let merged = {
        let parts = parts.to_vec();
        let staging = staging.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || merge_in_order(&parts, &staging, &cancel, buffer_size))
            .await??
    };
    if let Some(expected) = expected_size {
        if merged != expected {
            return Err(EngineError::SizeMismatch {
                expected,
                actual: merged,
            });
        }
    }

    if let Some(expected) = checksum {
        let staging = staging.to_path_buf();
        let cancel = cancel.clone();
        tokio::task::spawn_blocking(move || verify_path(&staging, &expected, &cancel)).await??;
    }

    if cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    check_not_locked(output)?;
    finalize(staging, output)?;
    tracing::info!("assembled {} ({merged} bytes)", output.display());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::temp_chunk_path;

    const HELLO_WORLD_SHA256: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    fn write_parts(output: &Path, pieces: &[&str]) -> Vec<PathBuf> {
        pieces
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let p = temp_chunk_path(output, i);
                std::fs::write(&p, s).unwrap();
                p
            })
            .collect()
    }

    #[tokio::test]
    async fn assembles_verifies_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hw.txt");
        let parts = write_parts(&out, &["hello", " ", "world"]);
        std::fs::write(resume_record_path(&out), b"{}").unwrap();
        let n = assemble(
            parts.clone(),
            &out,
            Some(11),
            Some(HELLO_WORLD_SHA256.to_uppercase()),
            4096,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(n, 11);
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "hello world");
        assert!(parts.iter().all(|p| !p.exists()));
        assert!(!staging_path(&out).exists());
        assert!(!resume_record_path(&out).exists());
    }

    #[tokio::test]
    async fn checksum_mismatch_leaves_destination_alone() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("hw.txt");
        std::fs::write(&out, "previous").unwrap();
        let parts = write_parts(&out, &["hello", " ", "world"]);
        let err = assemble(
            parts,
            &out,
            None,
            Some("0".repeat(64)),
            4096,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, EngineError::ChecksumMismatch { .. }), "{err}");
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "previous");
        assert!(!staging_path(&out).exists());
    }

    #[tokio::test]
    async fn missing_part_keeps_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("x.bin");
        let mut parts = write_parts(&out, &["a", "b"]);
        parts.push(temp_chunk_path(&out, 2));
        let err = assemble(parts.clone(), &out, None, None, 4096, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("chunk file missing"), "{err}");
        assert!(parts[0].exists() && parts[1].exists());
        assert!(!out.exists());
    }

    #[cfg(unix)]
    #[test]
    fn space_check_passes_for_small_needs() {
        let dir = tempfile::tempdir().unwrap();
        ensure_space(dir.path(), 1).unwrap();
        let err = ensure_space(dir.path(), u64::MAX).unwrap_err();
        assert!(matches!(err, EngineError::InsufficientSpace { .. }));
    }
}
