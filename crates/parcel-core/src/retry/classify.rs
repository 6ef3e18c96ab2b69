//! Map transfer failures onto retry policy error kinds.

use super::policy::ErrorKind;
use crate::error::TransferError;

/// Kind of an HTTP status answered to a request that needed success.
pub fn classify_http_status(code: u32) -> ErrorKind {
    match code {
        408 => ErrorKind::Timeout,
        429 | 503 => ErrorKind::Throttled,
        500..=599 => ErrorKind::Http5xx(code as u16),
        _ => ErrorKind::Other,
    }
}

/// Network-level curl failures are worth another attempt; setup errors
/// (bad URL, unsupported protocol, TLS certificate problems) are not.
pub fn classify_curl_error(e: &curl::Error) -> ErrorKind {
    if e.is_operation_timedout() {
        return ErrorKind::Timeout;
    }
    let transient = [
        e.is_couldnt_connect(),
        e.is_couldnt_resolve_host(),
        e.is_couldnt_resolve_proxy(),
        e.is_read_error(),
        e.is_recv_error(),
        e.is_send_error(),
        e.is_got_nothing(),
        e.is_partial_file(),
        e.is_ssl_connect_error(),
        e.is_http2_error(),
        e.is_http2_stream_error(),
    ];
    if transient.contains(&true) {
        ErrorKind::Connection
    } else {
        ErrorKind::Other
    }
}

pub fn classify(e: &TransferError) -> ErrorKind {
    match e {
        TransferError::Curl(ce) => classify_curl_error(ce),
        TransferError::Http(code) => classify_http_status(*code),
        TransferError::Protocol(_) => ErrorKind::Protocol,
        // A short body is a dropped connection as far as retrying goes.
        TransferError::PartialTransfer { .. } => ErrorKind::Connection,
        TransferError::Storage(_) | TransferError::Join(_) => ErrorKind::Other,
        TransferError::Cancelled => ErrorKind::Cancelled,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_kinds() {
        let cases = [
            (408, ErrorKind::Timeout),
            (429, ErrorKind::Throttled),
            (503, ErrorKind::Throttled),
            (500, ErrorKind::Http5xx(500)),
            (502, ErrorKind::Http5xx(502)),
            (403, ErrorKind::Other),
            (404, ErrorKind::Other),
            (416, ErrorKind::Other),
        ];
        for (code, kind) in cases {
            assert_eq!(classify_http_status(code), kind, "status {code}");
        }
    }

    #[test]
    fn curl_timeout_and_connect_failures() {
        // CURLE_OPERATION_TIMEDOUT = 28, CURLE_COULDNT_CONNECT = 7, CURLE_URL_MALFORMAT = 3
        assert_eq!(classify_curl_error(&curl::Error::new(28)), ErrorKind::Timeout);
        assert_eq!(classify_curl_error(&curl::Error::new(7)), ErrorKind::Connection);
        assert_eq!(classify_curl_error(&curl::Error::new(3)), ErrorKind::Other);
    }

    #[test]
    fn transfer_error_kinds() {
        assert_eq!(
            classify(&TransferError::Protocol("status 200".into())),
            ErrorKind::Protocol
        );
        assert_eq!(
            classify(&TransferError::PartialTransfer {
                expected: 10,
                received: 3
            }),
            ErrorKind::Connection
        );
        assert_eq!(classify(&TransferError::Http(503)), ErrorKind::Throttled);
        assert_eq!(classify(&TransferError::Cancelled), ErrorKind::Cancelled);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(classify(&TransferError::Storage(io)), ErrorKind::Other);
    }
}
