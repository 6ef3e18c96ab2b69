//! Chunk count selection.

/// Roughly one chunk per MiB before clamping.
pub const CHUNK_TARGET_BYTES: u64 = 1024 * 1024;
pub const MIN_CHUNKS: usize = 4;
pub const MAX_CHUNKS: usize = 16;
/// Upper bound for an explicit override; chunk files are numbered with 3 digits.
pub const MAX_EXPLICIT_CHUNKS: usize = 999;

/// `clamp(ceil(size / 1 MiB), 4, 16)`, or the caller's override (at most
/// [`MAX_EXPLICIT_CHUNKS`]) when given. Never more chunks than bytes, never zero.
pub fn choose_chunk_count(total_size: u64, explicit: Option<usize>) -> usize {
    let n = match explicit {
        Some(n) if n > MAX_EXPLICIT_CHUNKS => {
            tracing::warn!("chunk count {n} capped at {MAX_EXPLICIT_CHUNKS}");
            MAX_EXPLICIT_CHUNKS
        }
        Some(n) => n.max(1),
        None => {
            let by_size = total_size.div_ceil(CHUNK_TARGET_BYTES);
            (by_size.min(MAX_CHUNKS as u64) as usize).clamp(MIN_CHUNKS, MAX_CHUNKS)
        }
    };
    if total_size == 0 {
        return n;
    }
    n.min(total_size.min(usize::MAX as u64) as usize)
}
