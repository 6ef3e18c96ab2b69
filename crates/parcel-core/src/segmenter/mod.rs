//! Range math and chunk planning.
//!
//! Responsible for:
//! - Choosing how many chunks a resource is split into.
//! - Splitting `[0, size)` into contiguous inclusive byte ranges.
//! - Range header formatting and Content-Range parsing.

mod count;
mod range;

pub use count::{
    choose_chunk_count, CHUNK_TARGET_BYTES, MAX_CHUNKS, MAX_EXPLICIT_CHUNKS, MIN_CHUNKS,
};
pub use range::{parse_content_range, plan_chunks, ByteRange, ContentRange};
