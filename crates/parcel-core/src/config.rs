use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Engine settings loaded from `~/.config/parcel/config.toml`.
///
/// Every field has a default, so a partial file is accepted. A settings value is
/// shared read-only by all running jobs; edits only affect work created afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Maximum concurrent chunk transfers per job.
    pub max_concurrent_chunks: usize,
    /// Maximum jobs downloading at once.
    pub max_concurrent_jobs: usize,
    /// Bytes read per I/O operation.
    pub buffer_size: usize,
    /// Connect timeout, and how long a transfer may stall before it is aborted.
    pub timeout_seconds: u64,
    /// Retries per chunk fetch, and the manual retry bound per job.
    pub max_retries: u32,
    /// Base delay for exponential backoff, in milliseconds.
    pub retry_delay_ms: u64,
    /// Upper bound on backoff delay, in milliseconds.
    pub max_retry_delay_ms: u64,
    /// Maximum concurrent HTTP connections across all jobs.
    pub connection_limit: usize,
    pub enable_connection_pooling: bool,
    /// Send `Accept-Encoding` on single-stream GETs. Ranged GETs never ask for compression.
    pub enable_compression: bool,
    /// Retry wrong-status / wrong-Content-Range responses like transient errors.
    pub retry_protocol_errors: bool,
    /// Resources smaller than this are fetched with a single stream.
    pub single_stream_threshold: u64,
    /// Root for computed output paths (None = current directory).
    pub download_dir: Option<PathBuf>,
    /// Host suffixes whose URLs are always handed to the external strategy.
    pub cloud_hosts: Vec<String>,
    /// Program and arguments for the external strategy; `{url}` and `{output}` are substituted.
    pub external_command: Vec<String>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_concurrent_chunks: 8,
            max_concurrent_jobs: 3,
            buffer_size: 64 * 1024,
            timeout_seconds: 30,
            max_retries: 5,
            retry_delay_ms: 1000,
            max_retry_delay_ms: 16_000,
            connection_limit: 32,
            enable_connection_pooling: true,
            enable_compression: false,
            retry_protocol_errors: false,
            single_stream_threshold: 1024 * 1024,
            download_dir: None,
            cloud_hosts: Vec::new(),
            external_command: Vec::new(),
            user_agent: concat!("parcel/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Settings {
    /// Backoff policy derived from the retry fields.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
            max_delay: Duration::from_millis(self.max_retry_delay_ms.max(self.retry_delay_ms)),
            retry_protocol_errors: self.retry_protocol_errors,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    /// Directory computed output paths are placed under.
    pub fn download_root(&self) -> PathBuf {
        self.download_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load settings from `path`. Errors on unreadable or malformed files.
    pub fn load_from(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let cfg: Settings =
            toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
        Ok(cfg)
    }

    /// Settings rendered as pretty TOML, the format of the config file.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write settings to `path` as pretty TOML, creating the parent directory.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let toml = self.to_toml()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write config {}", path.display()))?;
        Ok(())
    }

    /// Save to the default config path.
    pub fn save(&self) -> Result<PathBuf> {
        let path = config_path()?;
        self.save_to(&path)?;
        Ok(path)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("parcel")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load settings from the default path. Never fails: a missing, unreadable or
/// invalid file yields the built-in defaults.
pub fn load_or_default() -> Settings {
    let path = match config_path() {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("no config directory ({e:#}); using defaults");
            return Settings::default();
        }
    };
    load_from_or_default(&path)
}

/// Like [`load_or_default`] for an explicit path.
pub fn load_from_or_default(path: &Path) -> Settings {
    if !path.exists() {
        tracing::debug!("no config at {}; using defaults", path.display());
        return Settings::default();
    }
    match Settings::load_from(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("ignoring config {}: {e:#}", path.display());
            Settings::default()
        }
    }
}
