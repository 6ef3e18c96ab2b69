use thiserror::Error;

/// Why leftover temp files cannot be continued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResumeMismatch {
    #[error("no resume record")]
    NoRecord,
    #[error("temp files belong to {0}")]
    OtherSource(String),
    #[error("remote resource changed ({})", changed_fields(.etag_changed, .last_modified_changed, .size_changed))]
    RemoteChanged {
        etag_changed: bool,
        last_modified_changed: bool,
        size_changed: bool,
    },
    #[error("temp files were split into {stored} chunks, now {current}")]
    Layout { stored: usize, current: usize },
}

fn changed_fields(etag: &bool, last_modified: &bool, size: &bool) -> String {
    [(etag, "ETag"), (last_modified, "Last-Modified"), (size, "size")]
        .iter()
        .filter(|(changed, _)| **changed)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}
