//! One run of one job: wait for the previous run to stop, pick the strategy,
//! drive it while publishing progress, then record the outcome.

use std::sync::Arc;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::{Inner, PROGRESS_INTERVAL};
use crate::error::EngineError;
use crate::job::{Job, JobProgress};
use crate::strategy::{self, JobRun};
use crate::transfer::TransferClient;

pub(super) struct RunContext {
    pub(super) inner: Arc<Inner>,
    pub(super) generation: u64,
    pub(super) progress: Arc<JobProgress>,
    pub(super) run_lock: Arc<tokio::sync::Mutex<()>>,
    pub(super) cancel: CancellationToken,
}

pub(super) async fn run_job(ctx: RunContext, job: Job) {
    let RunContext {
        inner,
        generation,
        progress,
        run_lock,
        cancel,
    } = ctx;
    let id = job.id;

    let _running = tokio::select! {
        _ = cancel.cancelled() => {
            inner.finish(id, generation, Err(EngineError::Cancelled));
            return;
        }
        guard = run_lock.lock_owned() => guard,
    };

    let strategy = strategy::select(job.kind, &job.source_url, &inner.settings.cloud_hosts);
    let client = TransferClient::with_budget(&inner.settings, job.headers.clone(), inner.budget.clone());
    let run = JobRun {
        job,
        settings: Arc::clone(&inner.settings),
        client,
        progress,
        cancel,
    };

    let work = strategy.run(&run);
    tokio::pin!(work);
    let mut ticker = tokio::time::interval(PROGRESS_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let result = loop {
        tokio::select! {
            r = &mut work => break r,
            _ = ticker.tick() => inner.report_progress(id, generation),
        }
    };
    inner.finish(id, generation, result);
}
