use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::JobKind;
use crate::checksum::CHECKSUM_KEY;

/// A resolved download handed to the engine by a front-end.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDescriptor {
    pub source_url: String,
    /// Human title; sanitized into the output file name.
    pub title: String,
    pub kind: JobKind,
    /// Extension appended to the sanitized title (without the dot).
    pub file_extension: Option<String>,
    pub expected_size: Option<u64>,
    /// Ordered segment URLs for [`JobKind::Segmented`].
    pub segment_urls: Vec<String>,
    /// Free-form metadata; `Checksum` holds an expected hex digest.
    pub metadata: HashMap<String, String>,
    /// Extra request headers (cookies, auth, referer).
    pub headers: HashMap<String, String>,
    /// Explicit output path; bypasses title-derived naming.
    pub output_path: Option<PathBuf>,
    /// Explicit chunk count; None lets the planner decide.
    pub chunk_count: Option<usize>,
}

impl JobDescriptor {
    pub fn direct(url: impl Into<String>) -> Self {
        Self {
            source_url: url.into(),
            ..Self::default()
        }
    }

    /// Segmented job over `segments`; the first segment doubles as source URL.
    pub fn segmented(title: impl Into<String>, segments: Vec<String>) -> Self {
        Self {
            source_url: segments.first().cloned().unwrap_or_default(),
            title: title.into(),
            kind: JobKind::Segmented,
            segment_urls: segments,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: JobKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_extension(mut self, ext: impl Into<String>) -> Self {
        self.file_extension = Some(ext.into());
        self
    }

    pub fn with_output(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn with_checksum(mut self, hex: impl Into<String>) -> Self {
        self.metadata.insert(CHECKSUM_KEY.to_string(), hex.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_chunk_count(mut self, n: usize) -> Self {
        self.chunk_count = Some(n);
        self
    }

    pub fn with_expected_size(mut self, size: u64) -> Self {
        self.expected_size = Some(size);
        self
    }
}
