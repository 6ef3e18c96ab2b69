use std::sync::Arc;

use super::JobRun;
use crate::checksum::verify_path;
use crate::error::EngineError;
use crate::fetch_head::HeadResult;
use crate::planner::ensure_space;
use crate::safe_resume::{claim_parts, ResumeRecord};
use crate::store::{
    check_not_locked, cleanup, ensure_directory, existing_len, finalize, partial_path,
    resume_record_path, safe_delete,
};
use crate::transfer::ProgressFn;

/// Stream the whole resource into `<output>.part`, then verify and promote it.
/// An existing partial file is resumed when the server advertises ranges and
/// the file's resume record matches `meta`.
pub(super) async fn run(run: &JobRun, meta: &HeadResult) -> Result<(), EngineError> {
    let url = run.job.source_url.as_str();
    let output = run.output();
    let partial = partial_path(output);
    ensure_directory(run.output_dir())?;

    let record = ResumeRecord::new(url, meta, 0);
    let kept = claim_parts(output, std::slice::from_ref(&partial), &record)?;
    let on_disk = existing_len(&partial);
    let resume = kept
        && meta.supports_range
        && on_disk > 0
        && meta.size.map_or(true, |s| on_disk <= s);
    let already = if resume { on_disk } else { 0 };
    if resume {
        tracing::info!("{url}: resuming single stream at byte {already}");
    }

    if let Some(total) = meta.size {
        ensure_space(run.output_dir(), total - already)?;
        run.progress.set_total(total);
    }
    run.progress.start_at(already);

    let progress = Arc::clone(&run.progress);
    let on_bytes: ProgressFn = Arc::new(move |n| progress.add(n));
    let len = run
        .client
        .fetch_single(url, &partial, resume, meta.size, on_bytes, &run.cancel)
        .await?;
    if meta.size.is_none() {
        run.progress.set_total(len);
    }

    if let Some(expected) = run.job.checksum().map(str::to_string) {
        let path = partial.clone();
        let cancel = run.cancel.clone();
        let verified = tokio::task::spawn_blocking(move || verify_path(&path, &expected, &cancel)).await?;
        if let Err(e) = verified {
            if matches!(e, EngineError::ChecksumMismatch { .. }) {
                let _ = safe_delete(&partial);
            }
            return Err(e);
        }
    }

    if run.cancel.is_cancelled() {
        return Err(EngineError::Cancelled);
    }
    check_not_locked(output)?;
    finalize(&partial, output)?;
    cleanup(&[resume_record_path(output)]);
    tracing::info!("saved {} ({len} bytes)", output.display());
    Ok(())
}
