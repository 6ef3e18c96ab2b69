//! Whole-resource GET appended to a partial file, resuming where it left off.

use std::cell::RefCell;
use std::str;

use tokio_util::sync::CancellationToken;

use super::options::RequestOptions;
use crate::error::TransferError;
use crate::fetch_head::{header_value, status_code};
use crate::segmenter::parse_content_range;
use crate::store::ChunkWriter;

#[derive(Default)]
struct Stream {
    headers: Vec<String>,
    validated: bool,
    /// Leading body bytes to drop (server restarted from 0 although we asked to resume).
    skip: u64,
    failure: Option<TransferError>,
}

/// Decide how to consume a response to a request starting at `offset`.
/// Returns how many leading body bytes must be discarded.
fn check_stream_response(headers: &[String], offset: u64) -> Result<u64, TransferError> {
    let status = headers.first().and_then(|l| status_code(l)).unwrap_or(0);
    if status >= 400 || status < 200 {
        return Err(TransferError::Http(status));
    }
    if offset == 0 {
        return Ok(0);
    }
    match status {
        206 => {
            let cr = header_value(headers, "Content-Range").and_then(parse_content_range);
            match cr {
                Some(cr) if cr.start == offset => Ok(0),
                _ => Err(TransferError::Protocol(format!(
                    "resume from {offset} answered with Content-Range {:?}",
                    header_value(headers, "Content-Range")
                ))),
            }
        }
        // Range ignored: the body starts at 0 and we already hold `offset` bytes.
        _ => Ok(offset),
    }
}

/// GET `url` into `writer`, continuing after the bytes it already holds.
/// Returns the file length on success. Blocking: run on the blocking pool.
pub(super) fn get_stream(
    url: &str,
    opts: &RequestOptions,
    writer: &mut ChunkWriter,
    expected_total: Option<u64>,
    on_bytes: &(dyn Fn(u64) + Send + Sync),
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    let offset = writer.len();
    let state = RefCell::new(Stream::default());

    let mut easy = curl::easy::Easy::new();
    opts.apply(&mut easy, url)?;
    if offset > 0 {
        easy.range(&format!("{offset}-"))?;
    } else if opts.compression {
        // Empty string: let libcurl offer every encoding it supports.
        easy.accept_encoding("")?;
    }
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
        transfer.write_function(|mut data| {
            let mut st = state.borrow_mut();
            if cancel.is_cancelled() {
                st.failure = Some(TransferError::Cancelled);
                return Ok(0);
            }
            if !st.validated {
                match check_stream_response(&st.headers, offset) {
                    Ok(skip) => {
                        if skip > 0 {
                            tracing::warn!("{url}: server ignored resume range; discarding {skip} bytes");
                        }
                        st.skip = skip;
                        st.validated = true;
                    }
                    Err(e) => {
                        st.failure = Some(e);
                        return Ok(0);
                    }
                }
            }
            let consumed = data.len();
            if st.skip > 0 {
                let drop = (data.len() as u64).min(st.skip) as usize;
                st.skip -= drop as u64;
                data = &data[drop..];
            }
            let take = match expected_total {
                Some(total) => (data.len() as u64).min(total.saturating_sub(writer.len())) as usize,
                None => data.len(),
            };
            if take > 0 {
                if let Err(e) = writer.write_all(&data[..take]) {
                    st.failure = Some(e);
                    return Ok(0);
                }
                on_bytes(take as u64);
            }
            Ok(consumed)
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
        check_stream_response(&st.headers, offset)?;
    }
    let len = writer.len();
    if let Some(total) = expected_total {
        if len != total {
            return Err(TransferError::PartialTransfer {
                expected: total,
                received: len,
            });
        }
    }
    Ok(len)
}
