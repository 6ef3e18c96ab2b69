//! Checksum verification of assembled files.
//!
//! Digests are computed after merge, not inline with the transfer, to keep the
//! hot path free of hashing. The algorithm is inferred from the length of the
//! expected hex digest.

use md5::Md5;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::store::StoreError;

const BUF_SIZE: usize = 64 * 1024;

/// Metadata key holding the expected hex digest of a job's output.
pub const CHECKSUM_KEY: &str = "Checksum";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    /// 32 hex chars => MD5, anything else => SHA-256.
    pub fn infer(expected_hex: &str) -> Self {
        if expected_hex.trim().len() == 32 {
            ChecksumAlgorithm::Md5
        } else {
            ChecksumAlgorithm::Sha256
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "MD5",
            ChecksumAlgorithm::Sha256 => "SHA-256",
        }
    }
}

fn digest_reader<D: Digest>(mut r: impl Read, cancel: Option<&CancellationToken>) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        if cancel.map_or(false, |c| c.is_cancelled()) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"));
        }
        let n = r.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hex digest of a file. Reads in chunks to keep memory use bounded.
pub fn digest_path(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let f = File::open(path)?;
    match algorithm {
        ChecksumAlgorithm::Md5 => digest_reader::<Md5>(f, None),
        ChecksumAlgorithm::Sha256 => digest_reader::<Sha256>(f, None),
    }
}

/// Compute SHA-256 of a file and return the digest as lowercase hex.
pub fn sha256_path(path: &Path) -> io::Result<String> {
    digest_path(path, ChecksumAlgorithm::Sha256)
}

/// Compute MD5 of a file and return the digest as lowercase hex.
pub fn md5_path(path: &Path) -> io::Result<String> {
    digest_path(path, ChecksumAlgorithm::Md5)
}

/// Verifies `path` against `expected` (hex, any case). Runs on the current thread.
pub fn verify_path(
    path: &Path,
    expected: &str,
    cancel: &CancellationToken,
) -> Result<(), EngineError> {
    let expected = expected.trim();
    let algorithm = ChecksumAlgorithm::infer(expected);
    let f = File::open(path).map_err(|e| StoreError::io("open for checksum", path, e))?;
    let actual = match algorithm {
        ChecksumAlgorithm::Md5 => digest_reader::<Md5>(f, Some(cancel)),
        ChecksumAlgorithm::Sha256 => digest_reader::<Sha256>(f, Some(cancel)),
    };
    let actual = match actual {
        Ok(a) => a,
        Err(e) if e.kind() == io::ErrorKind::Interrupted => return Err(EngineError::Cancelled),
        Err(e) => return Err(StoreError::io("read for checksum", path, e).into()),
    };
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(EngineError::ChecksumMismatch {
            algorithm: algorithm.name(),
            expected: expected.to_ascii_lowercase(),
            actual,
        });
    }
    tracing::debug!("{} verified for {}", algorithm.name(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HELLO_SHA256: &str = "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03";
    const HELLO_MD5: &str = "b1946ac92492d2347c6235b4d2611184";

    fn hello_file() -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        f
    }

    #[test]
    fn sha256_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            sha256_path(f.path()).unwrap(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn known_digests() {
        let f = hello_file();
        assert_eq!(sha256_path(f.path()).unwrap(), HELLO_SHA256);
        assert_eq!(md5_path(f.path()).unwrap(), HELLO_MD5);
    }

    #[test]
    fn algorithm_inferred_from_length() {
        assert_eq!(ChecksumAlgorithm::infer(HELLO_MD5), ChecksumAlgorithm::Md5);
        assert_eq!(ChecksumAlgorithm::infer(HELLO_SHA256), ChecksumAlgorithm::Sha256);
        assert_eq!(ChecksumAlgorithm::infer("abc"), ChecksumAlgorithm::Sha256);
    }

    #[test]
    fn verify_is_case_insensitive() {
        let f = hello_file();
        let cancel = CancellationToken::new();
        verify_path(f.path(), &HELLO_SHA256.to_uppercase(), &cancel).unwrap();
        verify_path(f.path(), &HELLO_MD5.to_uppercase(), &cancel).unwrap();
    }

    #[test]
    fn verify_mismatch_reports_algorithm() {
        let f = hello_file();
        let wrong = "0".repeat(64);
        let err = verify_path(f.path(), &wrong, &CancellationToken::new()).unwrap_err();
        match err {
            EngineError::ChecksumMismatch {
                algorithm, actual, ..
            } => {
                assert_eq!(algorithm, "SHA-256");
                assert_eq!(actual, HELLO_SHA256);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
