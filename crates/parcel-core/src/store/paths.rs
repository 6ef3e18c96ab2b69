//! On-disk naming: `<output>.partNNN`, `<output>.merged`, `<output>.part`,
//! `<output>.resume`.

use std::path::{Path, PathBuf};

/// Prefix of chunk temp file suffixes; the index follows, zero-padded to 3 digits.
pub const CHUNK_SUFFIX: &str = ".part";
pub const STAGING_SUFFIX: &str = ".merged";
pub const RESUME_SUFFIX: &str = ".resume";

fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut o = base.as_os_str().to_owned();
    o.push(suffix);
    PathBuf::from(o)
}

/// Temp file for chunk `index`. Zero padding keeps lexical and numeric order equal.
pub fn temp_chunk_path(base: &Path, index: usize) -> PathBuf {
    with_suffix(base, &format!("{CHUNK_SUFFIX}{index:03}"))
}

/// Staging file holding the merged, not yet verified output.
pub fn staging_path(base: &Path) -> PathBuf {
    with_suffix(base, STAGING_SUFFIX)
}

/// Partial file used by the single-stream path (appended to on resume).
pub fn partial_path(base: &Path) -> PathBuf {
    with_suffix(base, CHUNK_SUFFIX)
}

/// Record of the resource the temp files of `base` were downloaded from.
pub fn resume_record_path(base: &Path) -> PathBuf {
    with_suffix(base, RESUME_SUFFIX)
}

/// Every temp file of `base` present on disk: chunk parts, the single-stream
/// partial, the staging file and the resume record.
pub fn temp_files_for(base: &Path) -> Vec<PathBuf> {
    let Some(name) = base.file_name().map(|n| n.to_string_lossy().into_owned()) else {
        return Vec::new();
    };
    let dir = match base.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut out: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| {
            let file = e.file_name();
            let file = file.to_string_lossy();
            file.strip_prefix(name.as_str()).is_some_and(|rest| {
                rest == STAGING_SUFFIX
                    || rest == RESUME_SUFFIX
                    || rest
                        .strip_prefix(CHUNK_SUFFIX)
                        .is_some_and(|idx| idx.bytes().all(|b| b.is_ascii_digit()))
            })
        })
        .map(|e| e.path())
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_paths_are_zero_padded() {
        let base = Path::new("/tmp/file.iso");
        assert_eq!(temp_chunk_path(base, 0), Path::new("/tmp/file.iso.part000"));
        assert_eq!(temp_chunk_path(base, 7), Path::new("/tmp/file.iso.part007"));
        assert_eq!(temp_chunk_path(base, 15), Path::new("/tmp/file.iso.part015"));
    }

    #[test]
    fn lexical_order_matches_index_order() {
        let base = Path::new("out.bin");
        let mut names: Vec<String> = (0..16)
            .rev()
            .map(|i| temp_chunk_path(base, i).to_string_lossy().into_owned())
            .collect();
        names.sort();
        let expected: Vec<String> = (0..16)
            .map(|i| temp_chunk_path(base, i).to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn temp_files_found_by_scan() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("movie.mp4");
        for p in [
            temp_chunk_path(&base, 0),
            temp_chunk_path(&base, 12),
            partial_path(&base),
            staging_path(&base),
            resume_record_path(&base),
            base.clone(),
            dir.path().join("movie.mp4.partial-notes"),
            dir.path().join("other.mp4.part000"),
        ] {
            std::fs::write(p, b"x").unwrap();
        }
        let found = temp_files_for(&base);
        assert_eq!(
            found,
            vec![
                staging_path(&base),
                partial_path(&base),
                temp_chunk_path(&base, 0),
                temp_chunk_path(&base, 12),
                resume_record_path(&base),
            ]
        );
    }

    #[test]
    fn staging_and_partial() {
        assert_eq!(staging_path(Path::new("a.zip")), Path::new("a.zip.merged"));
        assert_eq!(partial_path(Path::new("a.zip")), Path::new("a.zip.part"));
    }
}
