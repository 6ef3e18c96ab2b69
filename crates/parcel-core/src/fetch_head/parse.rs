//! Parse HTTP response header lines into HeadResult.

use super::HeadResult;

/// Status code from a status line such as `HTTP/1.1 206 Partial Content`.
pub(crate) fn status_code(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("HTTP/")?;
    rest.split_whitespace().nth(1)?.parse().ok()
}

/// Value of the last header named `name` (case-insensitive).
pub(crate) fn header_value<'a>(lines: &'a [String], name: &str) -> Option<&'a str> {
    lines.iter().rev().find_map(|line| {
        let (n, v) = line.split_once(':')?;
        n.trim().eq_ignore_ascii_case(name).then(|| v.trim())
    })
}

/// Parse collected header lines into HeadResult.
pub(crate) fn parse_headers(lines: &[String]) -> HeadResult {
    let mut out = HeadResult::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            out.size = value.parse::<u64>().ok();
        } else if name.eq_ignore_ascii_case("accept-ranges") {
            out.supports_range = value
                .split(',')
                .any(|v| v.trim().eq_ignore_ascii_case("bytes"));
        } else if name.eq_ignore_ascii_case("etag") {
            out.etag = Some(value.trim_matches('"').to_string());
        } else if name.eq_ignore_ascii_case("last-modified") {
            out.last_modified = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("content-type") {
            out.content_type = Some(value.to_string());
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse_headers_content_length_and_ranges() {
        let r = parse_headers(&lines(&[
            "HTTP/1.1 200 OK",
            "Content-Length: 12345",
            "Accept-Ranges: bytes",
        ]));
        assert_eq!(r.size, Some(12345));
        assert!(r.supports_range);
        assert!(r.etag.is_none());
    }

    #[test]
    fn parse_headers_etag_last_modified_and_type() {
        let r = parse_headers(&lines(&[
            "ETag: \"abc-123\"",
            "Last-Modified: Wed, 21 Oct 2015 07:28:00 GMT",
            "Content-Type: application/octet-stream",
        ]));
        assert_eq!(r.etag.as_deref(), Some("abc-123"));
        assert_eq!(
            r.last_modified.as_deref(),
            Some("Wed, 21 Oct 2015 07:28:00 GMT")
        );
        assert_eq!(r.content_type.as_deref(), Some("application/octet-stream"));
    }

    #[test]
    fn parse_headers_no_ranges() {
        let r = parse_headers(&lines(&["Content-Length: 999", "Accept-Ranges: none"]));
        assert_eq!(r.size, Some(999));
        assert!(!r.supports_range);
    }

    #[test]
    fn status_line_parsing() {
        assert_eq!(status_code("HTTP/1.1 206 Partial Content"), Some(206));
        assert_eq!(status_code("HTTP/2 200"), Some(200));
        assert_eq!(status_code("Content-Length: 5"), None);
    }

    #[test]
    fn header_value_is_case_insensitive_and_last_wins() {
        let l = lines(&["content-range: bytes 0-1/2", "Content-Range: bytes 0-4/5"]);
        assert_eq!(header_value(&l, "Content-Range"), Some("bytes 0-4/5"));
        assert_eq!(header_value(&l, "ETag"), None);
    }
}
