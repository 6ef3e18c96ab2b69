//! Inclusive byte ranges and partitioning.

/// One inclusive byte range `[start, end]`; never empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// End offset (inclusive).
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(end >= start);
        Self { start, end }
    }

    /// Length in bytes: `end - start + 1`.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// HTTP Range header value: `bytes=start-end`.
    pub fn header_value(&self) -> String {
        format!("bytes={}-{}", self.start, self.end)
    }

    /// The part of this range left after `done` bytes, or None if complete.
    pub fn remaining(&self, done: u64) -> Option<ByteRange> {
        if done >= self.len() {
            None
        } else {
            Some(ByteRange::new(self.start + done, self.end))
        }
    }
}

/// Splits `[0, total_size)` into `count` contiguous inclusive ranges. The first
/// `total_size % count` ranges are one byte longer, so every byte is covered
/// exactly once. Returns an empty vec if either argument is 0; `count` is
/// clamped to `total_size` so no range is empty.
pub fn plan_chunks(total_size: u64, count: usize) -> Vec<ByteRange> {
    if total_size == 0 || count == 0 {
        return Vec::new();
    }

    let count = (count as u64).min(total_size);
    let base = total_size / count;
    let remainder = total_size % count;

    let mut out = Vec::with_capacity(count as usize);
    let mut offset = 0u64;
    for i in 0..count {
        let len = base + u64::from(i < remainder);
        out.push(ByteRange::new(offset, offset + len - 1));
        offset += len;
    }
    out
}

/// Parsed `Content-Range: bytes start-end/total` (total may be `*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: Option<u64>,
}

/// Parses a Content-Range value. Unsatisfied-range forms (`bytes */N`) yield None.
pub fn parse_content_range(value: &str) -> Option<ContentRange> {
    let value = value.trim();
    let rest = value
        .strip_prefix("bytes")
        .or_else(|| value.strip_prefix("Bytes"))?
        .trim_start();
    let (span, total) = rest.split_once('/')?;
    let (start, end) = span.trim().split_once('-')?;
    let start = start.trim().parse::<u64>().ok()?;
    let end = end.trim().parse::<u64>().ok()?;
    if end < start {
        return None;
    }
    let total = match total.trim() {
        "*" => None,
        t => Some(t.parse::<u64>().ok()?),
    };
    Some(ContentRange { start, end, total })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(size: u64, chunks: &[ByteRange]) {
        let mut next = 0u64;
        for c in chunks {
            assert_eq!(c.start, next, "gap or overlap at {}", c.start);
            assert!(c.end >= c.start);
            next = c.end + 1;
        }
        assert_eq!(next, size);
        assert_eq!(chunks.iter().map(ByteRange::len).sum::<u64>(), size);
    }

    #[test]
    fn plan_even() {
        let c = plan_chunks(1000, 4);
        assert_eq!(c.len(), 4);
        assert_eq!(c[0], ByteRange::new(0, 249));
        assert_eq!(c[1], ByteRange::new(250, 499));
        assert_eq!(c[3], ByteRange::new(750, 999));
    }

    #[test]
    fn plan_remainder_goes_to_first_chunks() {
        // 10/4 -> base 2, remainder 2: first 2 chunks get 3 bytes.
        let c = plan_chunks(10, 4);
        let lens: Vec<u64> = c.iter().map(ByteRange::len).collect();
        assert_eq!(lens, vec![3, 3, 2, 2]);
        assert_exact_cover(10, &c);
    }

    #[test]
    fn partition_complete_for_many_sizes() {
        let sizes = [1u64, 5, 17, 1000, 65_537, 10 * 1024 * 1024 + 3, 987_654_321];
        for &size in &sizes {
            for n in 4..=16 {
                let c = plan_chunks(size, n);
                assert_eq!(c.len() as u64, (n as u64).min(size));
                assert_exact_cover(size, &c);
            }
        }
    }

    #[test]
    fn plan_empty() {
        assert!(plan_chunks(0, 4).is_empty());
        assert!(plan_chunks(100, 0).is_empty());
    }

    #[test]
    fn header_and_remaining() {
        let r = ByteRange::new(100, 199);
        assert_eq!(r.header_value(), "bytes=100-199");
        assert_eq!(r.len(), 100);
        assert_eq!(r.remaining(40), Some(ByteRange::new(140, 199)));
        assert_eq!(r.remaining(100), None);
        assert_eq!(ByteRange::new(42, 42).header_value(), "bytes=42-42");
    }

    #[test]
    fn content_range_parsing() {
        assert_eq!(
            parse_content_range("bytes 0-99/1000"),
            Some(ContentRange {
                start: 0,
                end: 99,
                total: Some(1000)
            })
        );
        assert_eq!(
            parse_content_range(" bytes 5-5/*"),
            Some(ContentRange {
                start: 5,
                end: 5,
                total: None
            })
        );
        assert_eq!(parse_content_range("bytes */1000"), None);
        assert_eq!(parse_content_range("bytes 9-3/10"), None);
        assert_eq!(parse_content_range("items 0-1/2"), None);
    }
}
