//! Safe resume: only reuse temp files that were downloaded from the same
//! resource, in the same layout.
//!
//! Before fetching, a run writes a [`ResumeRecord`] next to its temp files
//! (`<output>.resume`). A later run trusts leftover parts only when the stored
//! record matches its own probe. Otherwise the parts are deleted and the
//! download starts over.

mod error;

pub use error::ResumeMismatch;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::fetch_head::HeadResult;
use crate::store::{existing_len, resume_record_path, safe_delete, StoreError};

/// What a set of temp files was downloaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRecord {
    pub url: String,
    pub size: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    /// Number of `.partNNN` files; 0 for the single-stream `.part` file.
    pub chunks: usize,
}

impl ResumeRecord {
    pub fn new(url: &str, head: &HeadResult, chunks: usize) -> Self {
        Self {
            url: url.to_string(),
            size: head.size,
            etag: head.etag.clone(),
            last_modified: head.last_modified.clone(),
            chunks,
        }
    }

    /// The record stored for `output`. Missing or unreadable records are `None`.
    pub fn load(output: &Path) -> Option<Self> {
        let path = resume_record_path(output);
        let data = std::fs::read(&path).ok()?;
        match serde_json::from_slice(&data) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::debug!("ignoring unreadable {}: {e}", path.display());
                None
            }
        }
    }

    pub fn save(&self, output: &Path) -> Result<(), StoreError> {
        let path = resume_record_path(output);
        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::io("encode resume record", &path, e.into()))?;
        std::fs::write(&path, data).map_err(|e| StoreError::io("write resume record", &path, e))
    }
}

/// Ok if parts written under `stored` can be continued for `current`.
///
/// A validator present on only one side counts as changed.
pub fn validate_for_resume(
    stored: Option<&ResumeRecord>,
    current: &ResumeRecord,
) -> Result<(), ResumeMismatch> {
    let Some(stored) = stored else {
        return Err(ResumeMismatch::NoRecord);
    };
    if stored.url != current.url {
        return Err(ResumeMismatch::OtherSource(stored.url.clone()));
    }
    let etag_changed = stored.etag != current.etag;
    let last_modified_changed = stored.last_modified != current.last_modified;
    let size_changed = stored.size != current.size;
    if etag_changed || last_modified_changed || size_changed {
        return Err(ResumeMismatch::RemoteChanged {
            etag_changed,
            last_modified_changed,
            size_changed,
        });
    }
    if stored.chunks != current.chunks {
        return Err(ResumeMismatch::Layout {
            stored: stored.chunks,
            current: current.chunks,
        });
    }
    Ok(())
}

/// Prepare `parts` for a run described by `current`. Existing parts are kept
/// when the stored record matches and deleted otherwise; then `current` is
/// stored. Returns true if existing bytes were kept.
pub fn claim_parts(
    output: &Path,
    parts: &[PathBuf],
    current: &ResumeRecord,
) -> Result<bool, StoreError> {
    let leftovers: Vec<&PathBuf> = parts.iter().filter(|p| existing_len(p) > 0).collect();
    let mut kept = false;
    if !leftovers.is_empty() {
        match validate_for_resume(ResumeRecord::load(output).as_ref(), current) {
            Ok(()) => kept = true,
            Err(why) => {
                tracing::warn!(
                    "{}: discarding {} temp file(s): {why}",
                    output.display(),
                    leftovers.len()
                );
                for p in leftovers {
                    safe_delete(p)?;
                }
            }
        }
    }
    current.save(output)?;
    Ok(kept)
}
