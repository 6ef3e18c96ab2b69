use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::JobRun;
use crate::error::{EngineError, TransferError};
use crate::planner::assemble;
use crate::store::{ensure_directory, temp_chunk_path};
use crate::transfer::ProgressFn;

/// Download every segment URL into its own part file (bounded by
/// `max_concurrent_chunks`), then concatenate them in list order.
///
/// Segment sizes are not probed, so the job total stays unknown until the
/// output has been assembled.
pub(super) async fn run(run: &JobRun) -> Result<(), EngineError> {
    let urls = &run.job.segment_urls;
    if urls.is_empty() {
        return Err(EngineError::NoSegments);
    }
    let output = run.output();
    ensure_directory(run.output_dir())?;
    let parts: Vec<PathBuf> = (0..urls.len()).map(|i| temp_chunk_path(output, i)).collect();

    run.progress.set_total(0);
    run.progress.start_at(0);
    tracing::info!("{}: {} segments", output.display(), urls.len());

    let permits = Arc::new(Semaphore::new(run.settings.max_concurrent_chunks.max(1)));
    let mut tasks = JoinSet::new();
    for (index, (url, part)) in urls.iter().zip(&parts).enumerate() {
        let client = run.client.clone();
        let permits = Arc::clone(&permits);
        let cancel = run.cancel.clone();
        let progress = Arc::clone(&run.progress);
        let url = url.clone();
        let part = part.clone();
        tasks.spawn(async move {
            let _permit = tokio::select! {
                _ = cancel.cancelled() => return (index, Err(TransferError::Cancelled)),
                p = permits.acquire_owned() => match p {
                    Ok(p) => p,
                    Err(_) => return (index, Err(TransferError::Cancelled)),
                },
            };
            let on_bytes: ProgressFn = Arc::new(move |n| progress.add(n));
            let res = client
                .fetch_single(&url, &part, false, None, on_bytes, &cancel)
                .await;
            (index, res)
        });
    }

    let mut failures: Vec<(usize, String)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((_, Ok(_))) => {}
            Ok((index, Err(e))) => {
                if !matches!(e, TransferError::Cancelled) {
                    tracing::warn!("segment {index} failed: {e}");
                }
                failures.push((index, e.to_string()));
            }
            Err(e) => failures.push((usize::MAX, format!("segment task panicked: {e}"))),
        }
    }

    if run.cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    if !failures.is_empty() {
        failures.sort();
        let (index, first) = &failures[0];
        return Err(EngineError::ChunksFailed {
            failed: failures.len(),
            total: urls.len(),
            first: format!("segment {index}: {first}"),
        });
    }

    let size = assemble(
        parts,
        output,
        None,
        run.job.checksum().map(str::to_string),
        run.settings.buffer_size,
        &run.cancel,
    )
    .await?;
    run.progress.set_total(size);
    Ok(())
}
