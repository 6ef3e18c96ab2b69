//! Output naming: sanitized titles and URL-derived file names.

mod path;
mod sanitize;

pub use path::filename_from_url_path;
pub use sanitize::{sanitize_filename, MAX_NAME_BYTES};

use std::path::{Path, PathBuf};

use crate::job::JobDescriptor;

/// File name used when neither title nor URL yields anything usable.
const DEFAULT_FILENAME: &str = "download.bin";

/// File name for a download titled `title` with optional extension `ext`.
///
/// Falls back to the last URL path segment when the title sanitizes to nothing.
/// The extension is appended unless the name already ends with it.
pub fn file_name_for(title: &str, ext: Option<&str>, url: &str) -> String {
    let mut name = sanitize_filename(title);
    if name.is_empty() {
        name = filename_from_url_path(url)
            .map(|n| sanitize_filename(&n))
            .unwrap_or_default();
    }
    if name.is_empty() {
        return DEFAULT_FILENAME.to_string();
    }

    let ext = ext
        .map(|e| sanitize_filename(e.trim_start_matches('.')))
        .filter(|e| !e.is_empty());
    match ext {
        Some(ext) if !name.to_ascii_lowercase().ends_with(&format!(".{}", ext.to_ascii_lowercase())) => {
            format!("{name}.{ext}")
        }
        _ => name,
    }
}

/// Where a job's artifact goes: the descriptor's explicit path if any,
/// otherwise `root / file_name_for(title, ext, url)`.
pub fn output_path_for(desc: &JobDescriptor, root: &Path) -> PathBuf {
    if let Some(p) = &desc.output_path {
        return p.clone();
    }
    root.join(file_name_for(
        &desc.title,
        desc.file_extension.as_deref(),
        &desc.source_url,
    ))
}

/// `path`, or the first of `name (1).ext`, `name (2).ext`, ... that `taken`
/// does not reject.
pub fn first_free_path(path: PathBuf, taken: impl Fn(&Path) -> bool) -> PathBuf {
    if !taken(&path) {
        return path;
    }
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path.extension().map(|e| e.to_string_lossy().into_owned());
    let mut n = 1u32;
    loop {
        let name = match &ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = path.with_file_name(name);
        if !taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
