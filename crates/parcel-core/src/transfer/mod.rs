//! HTTP transfer client: HEAD probes, ranged GETs and single-stream GETs.
//!
//! libcurl handles are blocking, so each attempt runs on tokio's blocking pool.
//! Every request holds one slot of the shared [`ConnectionBudget`] while it is
//! on the wire and goes through [`run_with_retry`] as a whole.

mod budget;
mod options;
mod ranged;
mod single;

pub use budget::ConnectionBudget;
pub use options::RequestOptions;

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::TransferError;
use crate::fetch_head::{self, HeadResult};
use crate::retry::{run_with_retry, RetryPolicy};
use crate::segmenter::ByteRange;
use crate::store::{existing_len, ChunkWriter};

/// Callback receiving the size of every buffer written to disk.
pub type ProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

/// Issues requests for one job. Cheap to clone; clones share the connection budget.
#[derive(Debug, Clone)]
pub struct TransferClient {
    opts: Arc<RequestOptions>,
    policy: RetryPolicy,
    budget: ConnectionBudget,
}

async fn blocking<T, F>(f: F) -> Result<T, TransferError>
where
    F: FnOnce() -> Result<T, TransferError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

impl TransferClient {
    /// Client for `settings` with its own budget of `connection_limit` slots.
    pub fn new(settings: &Settings, headers: HashMap<String, String>) -> Self {
        Self::with_budget(
            settings,
            headers,
            ConnectionBudget::new(settings.connection_limit),
        )
    }

    /// Client drawing connections from a budget shared with other clients.
    pub fn with_budget(
        settings: &Settings,
        headers: HashMap<String, String>,
        budget: ConnectionBudget,
    ) -> Self {
        Self {
            opts: Arc::new(RequestOptions::from_settings(settings, headers)),
            policy: settings.retry_policy(),
            budget,
        }
    }

    pub fn options(&self) -> &RequestOptions {
        &self.opts
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// HEAD `url` and return size, range support and cache validators.
    pub async fn probe_metadata(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<HeadResult, TransferError> {
        let label = format!("HEAD {url}");
        let meta = run_with_retry(&self.policy, cancel, &label, |_| {
            let url = url.to_string();
            let opts = Arc::clone(&self.opts);
            async move {
                let _conn = self.budget.acquire(cancel).await?;
                blocking(move || fetch_head::probe(&url, &opts)).await
            }
        })
        .await?;
        tracing::debug!(
            "probe {url}: size={:?} ranges={} etag={:?}",
            meta.size,
            meta.supports_range,
            meta.etag
        );
        Ok(meta)
    }

    /// Content length reported by HEAD, 0 when the server does not say.
    pub async fn probe_length(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        Ok(self.probe_metadata(url, cancel).await?.size.unwrap_or(0))
    }

    /// Whether HEAD advertises `Accept-Ranges: bytes`.
    pub async fn probe_range_support(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, TransferError> {
        Ok(self.probe_metadata(url, cancel).await?.supports_range)
    }

    /// Fetch the inclusive `range` of `url` into `dest`.
    ///
    /// Bytes already in `dest` count as done: each attempt (including retries)
    /// asks only for what is still missing, so `on_bytes` sees every byte once.
    /// Returns the number of bytes this call added to the file.
    pub async fn fetch_range(
        &self,
        url: &str,
        range: ByteRange,
        dest: &Path,
        on_bytes: ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        let before = existing_len(dest).min(range.len());
        let label = format!("{} [{}-{}]", dest.display(), range.start, range.end);
        run_with_retry(&self.policy, cancel, &label, |_| {
            let url = url.to_string();
            let opts = Arc::clone(&self.opts);
            let dest = dest.to_path_buf();
            let on_bytes = Arc::clone(&on_bytes);
            let cancel = cancel.clone();
            async move {
                let _conn = self.budget.acquire(&cancel).await?;
                blocking(move || {
                    let mut writer = ChunkWriter::resume(&dest, range.len())?;
                    if let Some(rest) = range.remaining(writer.len()) {
                        ranged::get_range(&url, &opts, rest, &mut writer, on_bytes.as_ref(), &cancel)?;
                        writer.sync()?;
                    }
                    Ok(())
                })
                .await
            }
        })
        .await?;
        Ok(range.len() - before)
    }

    /// Fetch the whole of `url` into `dest` with one stream.
    ///
    /// With `resume`, bytes already in `dest` are kept and the request starts
    /// after them; otherwise the file is truncated first. Retries always continue
    /// from the bytes written so far. Returns the final file length.
    pub async fn fetch_single(
        &self,
        url: &str,
        dest: &Path,
        resume: bool,
        expected_total: Option<u64>,
        on_bytes: ProgressFn,
        cancel: &CancellationToken,
    ) -> Result<u64, TransferError> {
        let label = dest.display().to_string();
        run_with_retry(&self.policy, cancel, &label, |attempt| {
            let url = url.to_string();
            let opts = Arc::clone(&self.opts);
            let dest = dest.to_path_buf();
            let on_bytes = Arc::clone(&on_bytes);
            let cancel = cancel.clone();
            let fresh = !resume && attempt == 0;
            async move {
                let _conn = self.budget.acquire(&cancel).await?;
                blocking(move || {
                    let mut writer = if fresh {
                        ChunkWriter::create(&dest)?
                    } else {
                        ChunkWriter::resume(&dest, expected_total.unwrap_or(u64::MAX))?
                    };
                    if expected_total.is_some_and(|t| writer.len() >= t) {
                        return Ok(writer.len());
                    }
                    let len = single::get_stream(
                        &url,
                        &opts,
                        &mut writer,
                        expected_total,
                        on_bytes.as_ref(),
                        &cancel,
                    )?;
                    writer.sync()?;
                    Ok(len)
                })
                .await
            }
        })
        .await
    }
}
