use super::{single, JobRun};
use crate::error::EngineError;
use crate::planner::ChunkPlanner;

/// Chunked when ranges are supported and the size is known and at least
/// `single_stream_threshold`; single-stream otherwise.
pub(super) async fn run(run: &JobRun) -> Result<(), EngineError> {
    let url = run.job.source_url.as_str();
    let meta = run.client.probe_metadata(url, &run.cancel).await?;
    let size = meta.size.unwrap_or(0);

    if meta.supports_range && size > 0 && size >= run.settings.single_stream_threshold {
        let planner = ChunkPlanner::new(
            run.client.clone(),
            run.progress.clone(),
            run.settings.max_concurrent_chunks,
            run.settings.buffer_size,
        );
        planner
            .run_chunked_with_meta(url, &meta, run.output(), &run.job, &run.cancel)
            .await?;
        return Ok(());
    }

    tracing::debug!(
        "{url}: single stream (ranges={}, size={size})",
        meta.supports_range
    );
    single::run(run, &meta).await
}
