//! Title to file-name sanitization.

/// Longest file name produced, in bytes. Leaves room for `.partNNN` / `.merged`
/// suffixes under the usual 255-byte limit.
pub const MAX_NAME_BYTES: usize = 200;

/// Names Windows refuses regardless of extension.
const RESERVED: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Makes a human title safe to use as a file name on any desktop filesystem.
///
/// - Replaces path separators, `<>:"|?*` and control characters with `_`
/// - Collapses runs of `_` and whitespace
/// - Trims leading/trailing spaces, dots and underscores
/// - Prefixes reserved device names (`CON`, `LPT1`, ...) with `_`
/// - Limits length to [`MAX_NAME_BYTES`] on a char boundary
///
/// Returns an empty string when nothing usable is left.
pub fn sanitize_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut prev: Option<char> = None;

    for c in title.chars() {
        let c = match c {
            '/' | '\\' | '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_whitespace() => ' ',
            c if c.is_control() => '_',
            c => c,
        };
        if (c == '_' || c == ' ') && prev == Some(c) {
            continue;
        }
        out.push(c);
        prev = Some(c);
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.' || c == '_');
    let mut name = if trimmed.len() > MAX_NAME_BYTES {
        let mut take = MAX_NAME_BYTES;
        while !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].trim_end().to_string()
    } else {
        trimmed.to_string()
    };

    let stem = name.split('.').next().unwrap_or_default();
    if RESERVED.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        name.insert(0, '_');
    }
    name
}
