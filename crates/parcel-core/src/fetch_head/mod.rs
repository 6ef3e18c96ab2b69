//! HTTP HEAD / metadata probing.
//!
//! Uses the curl crate (libcurl) to fetch response headers and confirm
//! `Content-Length`, `Accept-Ranges: bytes`, and capture ETag/Last-Modified
//! and Content-Type for the caller.

mod parse;

use std::str;

use crate::error::TransferError;
use crate::transfer::RequestOptions;

pub(crate) use parse::{header_value, parse_headers, status_code};

/// Result of a HEAD request: the headers needed to plan a download.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeadResult {
    /// Total size in bytes, if `Content-Length` is present.
    pub size: Option<u64>,
    /// True if server sent `Accept-Ranges: bytes`.
    pub supports_range: bool,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub content_type: Option<String>,
}

/// Performs a HEAD request and returns parsed metadata of the final response.
///
/// Follows redirects. Runs in the current thread; call from `spawn_blocking`
/// if used from async code.
pub fn probe(url: &str, opts: &RequestOptions) -> Result<HeadResult, TransferError> {
    let mut headers: Vec<String> = Vec::new();

    let mut easy = curl::easy::Easy::new();
    opts.apply(&mut easy, url)?;
    easy.nobody(true)?;

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                // A new status line starts the headers of the next (redirected) response.
                if line.starts_with("HTTP/") {
                    headers.clear();
                }
                headers.push(line.to_string());
            }
            true
        })?;
        transfer.perform()?;
    }

    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        return Err(TransferError::Http(code));
    }

    Ok(parse_headers(&headers))
}
