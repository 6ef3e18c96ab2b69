//! Chunked download of one resource.
//!
//! Probes the size, splits it into inclusive ranges, fetches every range into
//! its own temp file with bounded parallelism, then merges the files in index
//! order, verifies the optional checksum and promotes the result. Leftover
//! chunk files are reused only when their resume record matches the probe.

mod assemble;

pub use assemble::{assemble, ensure_space};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{EngineError, TransferError};
use crate::fetch_head::HeadResult;
use crate::job::{Chunk, ChunkStatus, Job, JobProgress};
use crate::safe_resume::{claim_parts, ResumeRecord};
use crate::segmenter::{choose_chunk_count, plan_chunks, ByteRange};
use crate::store::{ensure_directory, existing_len, temp_chunk_path};
use crate::transfer::{ProgressFn, TransferClient};

/// Runs chunked downloads for one job. The chunk permit pool is created per
/// [`run_chunked`](ChunkPlanner::run_chunked) call, so the bound applies per job;
/// the client's connection budget bounds all jobs together.
pub struct ChunkPlanner {
    client: TransferClient,
    progress: Arc<JobProgress>,
    max_concurrent_chunks: usize,
    buffer_size: usize,
}

impl ChunkPlanner {
    pub fn new(
        client: TransferClient,
        progress: Arc<JobProgress>,
        max_concurrent_chunks: usize,
        buffer_size: usize,
    ) -> Self {
        Self {
            client,
            progress,
            max_concurrent_chunks: max_concurrent_chunks.max(1),
            buffer_size,
        }
    }

    /// Download `url` to `output` in parallel ranges. Returns the final state of
    /// every chunk.
    pub async fn run_chunked(
        &self,
        url: &str,
        output: &Path,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, EngineError> {
        let meta = self.client.probe_metadata(url, cancel).await?;
        self.run_chunked_with_meta(url, &meta, output, job, cancel).await
    }

    /// [`run_chunked`](Self::run_chunked) with the HEAD result already in hand.
    ///
    /// Existing chunk files are resumed only when their resume record matches
    /// `meta` and the planned chunk count; otherwise they are deleted first.
    pub async fn run_chunked_with_meta(
        &self,
        url: &str,
        meta: &HeadResult,
        output: &Path,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<Vec<Chunk>, EngineError> {
        let size = meta.size.unwrap_or(0);
        if size == 0 {
            return Err(EngineError::SizeUnknown {
                url: url.to_string(),
            });
        }
        if let Some(expected) = job.expected_size.filter(|&e| e != size) {
            tracing::warn!("{url}: expected {expected} bytes, server reports {size}");
        }

        let count = choose_chunk_count(size, job.chunk_count);
        let chunks: Vec<Chunk> = plan_chunks(size, count)
            .into_iter()
            .enumerate()
            .map(|(i, r)| Chunk::new(i, r))
            .collect();
        let parts: Vec<PathBuf> = (0..chunks.len())
            .map(|i| temp_chunk_path(output, i))
            .collect();

        let dir = output
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        ensure_directory(dir)?;
        claim_parts(output, &parts, &ResumeRecord::new(url, meta, chunks.len()))?;

        let on_disk: Vec<u64> = chunks
            .iter()
            .zip(&parts)
            .map(|(c, p)| existing_len(p).min(c.len()))
            .collect();
        let resumed: u64 = on_disk.iter().sum();
        // Remaining chunk bytes plus the staging copy made while the parts still exist.
        ensure_space(dir, size - resumed + size)?;

        self.progress.set_total(size);
        self.progress.start_at(resumed);
        tracing::info!(
            "{url}: {size} bytes in {} chunks (max {} parallel), {resumed} bytes on disk",
            chunks.len(),
            self.max_concurrent_chunks
        );

        let chunks = self.fetch_all(url, chunks, &parts, &on_disk, cancel).await;

        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let failed: Vec<&Chunk> = chunks
            .iter()
            .filter(|c| c.status != ChunkStatus::Completed)
            .collect();
        if let Some(first) = failed.first() {
            return Err(EngineError::ChunksFailed {
                failed: failed.len(),
                total: chunks.len(),
                first: format!(
                    "chunk {}: {}",
                    first.index,
                    first.error.as_deref().unwrap_or("did not complete")
                ),
            });
        }

        assemble(
            parts,
            output,
            Some(size),
            job.checksum().map(str::to_string),
            self.buffer_size,
            cancel,
        )
        .await?;
        Ok(chunks)
    }

    /// Fetch every chunk, at most `max_concurrent_chunks` at a time. Each task owns
    /// its chunk and hands it back when done; results are returned in index order.
    async fn fetch_all(
        &self,
        url: &str,
        chunks: Vec<Chunk>,
        parts: &[PathBuf],
        on_disk: &[u64],
        cancel: &CancellationToken,
    ) -> Vec<Chunk> {
        let permits = Arc::new(Semaphore::new(self.max_concurrent_chunks));
        let mut tasks = JoinSet::new();
        let ranges: Vec<ByteRange> = chunks.iter().map(Chunk::range).collect();
        let mut slots: Vec<Option<Chunk>> = vec![None; chunks.len()];

        for ((mut chunk, part), &already) in chunks.into_iter().zip(parts).zip(on_disk) {
            let client = self.client.clone();
            let progress = Arc::clone(&self.progress);
            let permits = Arc::clone(&permits);
            let cancel = cancel.clone();
            let url = url.to_string();
            let part = part.clone();

            tasks.spawn(async move {
                let _permit = tokio::select! {
                    _ = cancel.cancelled() => {
                        chunk.mark_failed(TransferError::Cancelled.to_string());
                        return chunk;
                    }
                    p = permits.acquire_owned() => match p {
                        Ok(p) => p,
                        Err(_) => {
                            chunk.mark_failed(TransferError::Cancelled.to_string());
                            return chunk;
                        }
                    },
                };
                chunk.mark_started();
                let counter = Arc::new(AtomicU64::new(already));
                let on_bytes: ProgressFn = {
                    let counter = Arc::clone(&counter);
                    Arc::new(move |n| {
                        counter.fetch_add(n, Ordering::AcqRel);
                        progress.add(n);
                    })
                };
                let res = client
                    .fetch_range(&url, chunk.range(), &part, on_bytes, &cancel)
                    .await;
                chunk.downloaded = counter.load(Ordering::Acquire);
                match res {
                    Ok(_) => {
                        tracing::debug!("chunk {} done ({} bytes)", chunk.index, chunk.len());
                        chunk.mark_completed();
                    }
                    Err(e) => {
                        if !matches!(e, TransferError::Cancelled) {
                            tracing::warn!("chunk {} failed: {e}", chunk.index);
                        }
                        chunk.mark_failed(e.to_string());
                    }
                }
                chunk
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(chunk) => {
                    let i = chunk.index;
                    slots[i] = Some(chunk);
                }
                Err(e) => tracing::error!("chunk task panicked: {e}"),
            }
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(i, c)| {
                c.unwrap_or_else(|| {
                    // Only a panicked task leaves its slot empty.
                    let mut lost = Chunk::new(i, ranges[i]);
                    lost.mark_failed("chunk task panicked".to_string());
                    lost
                })
            })
            .collect()
    }
}
