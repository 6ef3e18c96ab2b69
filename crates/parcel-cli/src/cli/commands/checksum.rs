//! Checksum command: digest of a local file.

use anyhow::{Context, Result};
use parcel_core::checksum;
use std::path::Path;

/// Compute and print SHA-256 (or MD5) of the given file, `sha256sum` style.
pub async fn run_checksum(path: &Path, md5: bool) -> Result<()> {
    let owned = path.to_path_buf();
    let digest = tokio::task::spawn_blocking(move || {
        if md5 {
            checksum::md5_path(&owned)
        } else {
            checksum::sha256_path(&owned)
        }
    })
    .await?
    .with_context(|| format!("read {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
