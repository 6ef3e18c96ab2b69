#![allow(dead_code)]

pub mod range_server;

use parcel_core::Settings;

/// Settings with short timeouts and fast retries for local servers.
pub fn fast_settings(download_dir: &std::path::Path) -> Settings {
    Settings {
        timeout_seconds: 5,
        retry_delay_ms: 10,
        max_retry_delay_ms: 40,
        download_dir: Some(download_dir.to_path_buf()),
        ..Settings::default()
    }
}

/// Deterministic, non-repeating-per-chunk test body.
pub fn body(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8 ^ (i / 251) as u8).collect()
}
