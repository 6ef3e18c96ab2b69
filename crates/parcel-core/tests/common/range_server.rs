//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body, one request per connection. Options make it
//! misbehave the ways real servers do: ignore ranges, answer with the wrong
//! Content-Range, fail the first requests, or dribble the body out slowly.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405.
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` even if ranges work.
    pub advertise_ranges: bool,
    /// Report a Content-Range one byte off from what was asked for.
    pub wrong_content_range: bool,
    /// Answer this many GETs with 503 before serving normally.
    pub fail_first_gets: usize,
    /// Pause between 16 KiB pieces of every GET body.
    pub piece_delay: Option<Duration>,
    /// ETag sent with HEAD responses.
    pub etag: Option<&'static str>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
            wrong_content_range: false,
            fail_first_gets: 0,
            piece_delay: None,
            etag: None,
        }
    }
}

/// Handle to a running server. The server lives until the process exits.
#[derive(Debug, Clone)]
pub struct RangeServer {
    pub url: String,
    gets: Arc<AtomicUsize>,
    heads: Arc<AtomicUsize>,
}

impl RangeServer {
    /// GET requests received so far (including failed ones).
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// HEAD requests received so far.
    pub fn heads(&self) -> usize {
        self.heads.load(Ordering::SeqCst)
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let gets = Arc::new(AtomicUsize::new(0));
    let heads = Arc::new(AtomicUsize::new(0));
    let counters = (Arc::clone(&gets), Arc::clone(&heads));
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            let (gets, heads) = (Arc::clone(&counters.0), Arc::clone(&counters.1));
            thread::spawn(move || handle(stream, &body, opts, &gets, &heads));
        }
    });
    RangeServer {
        url: format!("http://127.0.0.1:{port}/file.bin"),
        gets,
        heads,
    }
}

fn handle(
    mut stream: TcpStream,
    body: &[u8],
    opts: RangeServerOptions,
    gets: &AtomicUsize,
    heads: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;
    let accept_ranges = if opts.advertise_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if method.eq_ignore_ascii_case("HEAD") {
        heads.fetch_add(1, Ordering::SeqCst);
        let etag = opts
            .etag
            .map(|e| format!("ETag: \"{e}\"\r\n"))
            .unwrap_or_default();
        let response = if opts.head_allowed {
            format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {total}\r\n{accept_ranges}{etag}Connection: close\r\n\r\n"
            )
        } else {
            "HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
        };
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    let seen = gets.fetch_add(1, Ordering::SeqCst);
    if seen < opts.fail_first_gets {
        let _ = stream.write_all(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }

    let (status, content_range, slice) = match range.filter(|_| opts.support_ranges) {
        Some((start, end_incl)) => {
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl {
                ("416 Range Not Satisfiable", Some(format!("bytes */{total}")), &body[0..0])
            } else {
                let shown = if opts.wrong_content_range { start + 1 } else { start };
                (
                    "206 Partial Content",
                    Some(format!("bytes {shown}-{end_incl}/{total}")),
                    &body[start as usize..=end_incl as usize],
                )
            }
        }
        None => ("200 OK", None, body),
    };

    let content_range = content_range
        .map(|v| format!("Content-Range: {v}\r\n"))
        .unwrap_or_default();
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\n{content_range}{accept_ranges}Connection: close\r\n\r\n",
        slice.len()
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    match opts.piece_delay {
        None => {
            let _ = stream.write_all(slice);
        }
        Some(delay) => {
            for piece in slice.chunks(16 * 1024) {
                if stream.write_all(piece).is_err() {
                    return;
                }
                thread::sleep(delay);
            }
        }
    }
}

/// Returns (method, optional (start, end_inclusive) for `Range: bytes=X-Y`;
/// an open end is `u64::MAX`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((a, b)) = spec.split_once('-') {
                        let start = a.trim().parse::<u64>().unwrap_or(0);
                        let end = b.trim();
                        let end_incl = if end.is_empty() {
                            u64::MAX
                        } else {
                            end.parse::<u64>().unwrap_or(0)
                        };
                        range = Some((start, end_incl));
                    }
                }
            }
        }
    }
    (method, range)
}
