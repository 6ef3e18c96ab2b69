//! One ranged GET into a chunk writer, with strict 206 validation.

use std::cell::RefCell;
use std::str;

use tokio_util::sync::CancellationToken;

use super::options::RequestOptions;
use crate::error::TransferError;
use crate::fetch_head::{header_value, status_code};
use crate::segmenter::{parse_content_range, ByteRange};
use crate::store::ChunkWriter;

/// Response state shared by the header and write callbacks.
#[derive(Default)]
struct Response {
    headers: Vec<String>,
    validated: bool,
    received: u64,
    failure: Option<TransferError>,
}

impl Response {
    fn status(&self) -> Option<u32> {
        self.headers.first().and_then(|l| status_code(l))
    }
}

/// A response to `Range: bytes=start-end` is accepted only as
/// `206 Partial Content` with a Content-Range naming exactly `[start, end]`.
fn check_partial_response(
    headers: &[String],
    range: ByteRange,
) -> Result<(), TransferError> {
    let status = headers.first().and_then(|l| status_code(l)).unwrap_or(0);
    if status >= 400 {
        return Err(TransferError::Http(status));
    }
    if status != 206 {
        return Err(TransferError::Protocol(format!(
            "expected 206 for range {}-{}, got {status}",
            range.start, range.end
        )));
    }
    let value = header_value(headers, "Content-Range").ok_or_else(|| {
        TransferError::Protocol("206 response without Content-Range".to_string())
    })?;
    match parse_content_range(value) {
        Some(cr) if cr.start == range.start && cr.end == range.end => Ok(()),
        Some(cr) => Err(TransferError::Protocol(format!(
            "Content-Range {}-{} does not match requested {}-{}",
            cr.start, cr.end, range.start, range.end
        ))),
        None => Err(TransferError::Protocol(format!(
            "unparseable Content-Range {value:?}"
        ))),
    }
}

/// GET `range` of `url`, appending the body to `writer` and reporting each write
/// through `on_bytes`. Nothing is written until the response has been validated,
/// and never more than `range.len()` bytes. Blocking: run on the blocking pool.
pub(super) fn get_range(
    url: &str,
    opts: &RequestOptions,
    range: ByteRange,
    writer: &mut ChunkWriter,
    on_bytes: &(dyn Fn(u64) + Send + Sync),
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    let expected = range.len();
    let state = RefCell::new(Response::default());

    let mut easy = curl::easy::Easy::new();
    opts.apply(&mut easy, url)?;
    easy.range(&format!("{}-{}", range.start, range.end))?;
    easy.progress(true)?;

    let performed = {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                let mut st = state.borrow_mut();
                if line.starts_with("HTTP/") {
                    st.headers.clear();
                }
                if !line.is_empty() {
                    st.headers.push(line.to_string());
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            let mut st = state.borrow_mut();
            if cancel.is_cancelled() {
                st.failure = Some(TransferError::Cancelled);
                return Ok(0);
            }
            if !st.validated {
                if let Err(e) = check_partial_response(&st.headers, range) {
                    st.failure = Some(e);
                    return Ok(0);
                }
                st.validated = true;
            }
            let room = expected - st.received;
            let take = (data.len() as u64).min(room) as usize;
            if take > 0 {
                if let Err(e) = writer.write_all(&data[..take]) {
                    st.failure = Some(e);
                    return Ok(0);
                }
                st.received += take as u64;
                on_bytes(take as u64);
            }
            Ok(data.len())
        })?;
        transfer.progress_function(|_, _, _, _| !cancel.is_cancelled())?;
        transfer.perform()
    };

    let mut st = state.into_inner();
    if let Some(failure) = st.failure.take() {
        return Err(failure);
    }
    if let Err(e) = performed {
        if cancel.is_cancelled() {
            return Err(TransferError::Cancelled);
        }
        return Err(TransferError::Curl(e));
    }
    if !st.validated {
        // Empty body: the callbacks never saw data, so check the headers now.
        check_partial_response(&st.headers, range)?;
    }
    if st.received != expected {
        return Err(TransferError::PartialTransfer {
            expected,
            received: st.received,
        });
    }
    tracing::trace!(
        "range {}-{} of {url}: {} bytes (status {:?})",
        range.start,
        range.end,
        st.received,
        st.status()
    );
    Ok(st.received)
}
