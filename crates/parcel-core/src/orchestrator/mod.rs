//! Job orchestrator: queue, active set, job permit pool and lifecycle events.
//!
//! All bookkeeping lives in one mutex-guarded [`State`] that is never held
//! across an await. Jobs run as spawned tasks; each run carries a generation
//! number so a run that was paused or cancelled cannot overwrite the status of
//! whatever happened to the job afterwards.

mod error;
mod events;
mod handle;
mod run;

pub use error::OrchestratorError;
pub use events::JobEvent;
pub use handle::JobHandle;

use chrono::Utc;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::EngineError;
use crate::job::{Job, JobDescriptor, JobId, JobProgress, JobStatus};
use crate::naming::{first_free_path, output_path_for};
use crate::store::{cleanup, temp_files_for};
use crate::transfer::ConnectionBudget;

/// How often `Progress` events are published for a downloading job.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(250);

const EVENT_CAPACITY: usize = 1024;

struct JobEntry {
    job: Job,
    progress: Arc<JobProgress>,
    /// Held by a run for its whole lifetime; a new run (or temp-file cleanup)
    /// waits here until the previous run has fully stopped.
    run_lock: Arc<tokio::sync::Mutex<()>>,
    generation: u64,
}

impl JobEntry {
    fn snapshot(&self) -> Job {
        let mut job = self.job.clone();
        job.downloaded_bytes = self.progress.downloaded();
        let total = self.progress.total();
        if total > 0 {
            job.total_size = total;
        }
        job
    }

    fn sync_counters(&mut self) {
        self.job.downloaded_bytes = self.progress.downloaded();
        let total = self.progress.total();
        if total > 0 {
            self.job.total_size = total;
        }
    }

    /// Whether this job still owns the temp files under its output path.
    fn holds_output(&self) -> bool {
        !matches!(self.job.status, JobStatus::Completed | JobStatus::Cancelled)
    }
}

struct ActiveRun {
    cancel: CancellationToken,
    /// None when started outside the bound by `start_now`.
    _permit: Option<OwnedSemaphorePermit>,
}

#[derive(Default)]
struct State {
    jobs: HashMap<JobId, JobEntry>,
    /// Submission order, for listing.
    order: Vec<JobId>,
    queue: VecDeque<JobId>,
    active: HashMap<JobId, ActiveRun>,
    /// Outputs of cancelled or cleared jobs whose temp files are still being deleted.
    releasing: HashSet<PathBuf>,
    dispatching: bool,
}

impl State {
    /// True while some job may still write `path` or its temp files.
    fn output_claimed(&self, path: &Path) -> bool {
        self.releasing.contains(path)
            || self
                .jobs
                .values()
                .any(|e| e.holds_output() && e.job.output_path == path)
    }
}

struct Inner {
    settings: Arc<Settings>,
    budget: ConnectionBudget,
    job_permits: Arc<Semaphore>,
    state: Mutex<State>,
    events: broadcast::Sender<JobEvent>,
    shutdown: CancellationToken,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: JobEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Start the dispatch loop unless it is already running or there is nothing to do.
    fn ensure_dispatcher(self: &Arc<Self>, st: &mut State) {
        if st.dispatching || st.queue.is_empty() || self.shutdown.is_cancelled() {
            return;
        }
        st.dispatching = true;
        tokio::spawn(dispatch_loop(Arc::clone(self)));
    }

    /// Delete the temp files of `output` once the run holding `run_lock` has
    /// stopped. The path stays claimed until then.
    fn release_output(
        self: &Arc<Self>,
        st: &mut State,
        output: PathBuf,
        run_lock: Arc<tokio::sync::Mutex<()>>,
    ) {
        st.releasing.insert(output.clone());
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            let _stopped = run_lock.lock().await;
            cleanup(&temp_files_for(&output));
            inner.state().releasing.remove(&output);
        });
    }

    /// Mark `id` Downloading and spawn its run.
    fn launch(self: &Arc<Self>, st: &mut State, id: JobId, permit: Option<OwnedSemaphorePermit>) {
        let Some(entry) = st.jobs.get_mut(&id) else {
            return;
        };
        entry.generation += 1;
        entry.job.status = JobStatus::Downloading;
        entry.job.started_at = Some(Utc::now());
        entry.job.finished_at = None;
        entry.job.last_error = None;

        let cancel = self.shutdown.child_token();
        let job = entry.snapshot();
        let ctx = run::RunContext {
            inner: Arc::clone(self),
            generation: entry.generation,
            progress: Arc::clone(&entry.progress),
            run_lock: Arc::clone(&entry.run_lock),
            cancel: cancel.clone(),
        };
        st.active.insert(
            id,
            ActiveRun {
                cancel,
                _permit: permit,
            },
        );
        tracing::info!("job {id}: started ({})", job.source_url);
        self.emit(JobEvent::Started(job.clone()));
        tokio::spawn(run::run_job(ctx, job));
    }

    /// Record the outcome of run `generation` of `id`. Ignored when the job has
    /// moved on (paused, cancelled, cleared or restarted) since that run began.
    fn finish(&self, id: JobId, generation: u64, result: Result<(), EngineError>) {
        let mut guard = self.state();
        let st = &mut *guard;
        let Some(entry) = st.jobs.get_mut(&id) else {
            return;
        };
        if entry.generation != generation || entry.job.status != JobStatus::Downloading {
            if let Err(e) = &result {
                if !e.is_cancelled() {
                    tracing::debug!("job {id}: superseded run ended with: {e}");
                }
            }
            return;
        }
        st.active.remove(&id);
        entry.sync_counters();

        match result {
            Ok(()) => {
                entry.job.status = JobStatus::Completed;
                entry.job.finished_at = Some(Utc::now());
                tracing::info!("job {id}: completed -> {}", entry.job.output_path.display());
                self.emit(JobEvent::Completed(entry.snapshot()));
            }
            Err(e) if e.is_cancelled() && self.shutdown.is_cancelled() => {
                // Engine shutdown: keep temp files so the job can resume later.
                entry.job.status = JobStatus::Paused;
                tracing::info!("job {id}: paused by shutdown");
                self.emit(JobEvent::Paused(id));
            }
            Err(e) if e.is_cancelled() => {
                entry.job.status = JobStatus::Cancelled;
                entry.job.finished_at = Some(Utc::now());
                self.emit(JobEvent::Cancelled(id));
            }
            Err(e) => {
                let error = e.to_string();
                entry.job.status = JobStatus::Failed;
                entry.job.finished_at = Some(Utc::now());
                entry.job.last_error = Some(error.clone());
                tracing::warn!("job {id}: failed: {error}");
                self.emit(JobEvent::Failed {
                    job: entry.snapshot(),
                    error,
                });
            }
        }
    }

    /// Publish a progress event if run `generation` is still the job's active run.
    fn report_progress(&self, id: JobId, generation: u64) {
        let st = self.state();
        let Some(entry) = st.jobs.get(&id) else {
            return;
        };
        if entry.generation == generation && entry.job.status == JobStatus::Downloading {
            self.emit(JobEvent::Progress {
                id,
                downloaded: entry.progress.downloaded(),
                total: entry.progress.total(),
            });
        }
    }
}

/// Single scheduler: waits for a job permit (blocking itself, never callers),
/// then starts the next queued job. Exits when the queue is empty.
async fn dispatch_loop(inner: Arc<Inner>) {
    loop {
        let permit = tokio::select! {
            _ = inner.shutdown.cancelled() => None,
            p = Arc::clone(&inner.job_permits).acquire_owned() => p.ok(),
        };
        let mut st = inner.state();
        let Some(permit) = permit else {
            st.dispatching = false;
            return;
        };
        match st.queue.pop_front() {
            Some(id) => inner.launch(&mut st, id, Some(permit)),
            None => {
                st.dispatching = false;
                return;
            }
        }
    }
}

/// The engine's front door. Cheap to clone; clones share all state.
///
/// Must be used from within a tokio runtime: submitting work spawns tasks.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    pub fn new(settings: Settings) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let inner = Inner {
            job_permits: Arc::new(Semaphore::new(settings.max_concurrent_jobs.max(1))),
            budget: ConnectionBudget::new(settings.connection_limit),
            settings: Arc::new(settings),
            state: Mutex::new(State::default()),
            events,
            shutdown: CancellationToken::new(),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Receive lifecycle and progress events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.events.subscribe()
    }

    /// Create a Pending job for `desc` and queue it. Returns immediately.
    ///
    /// No two unfinished jobs share an output path: an explicit path already
    /// held by another job is rejected, a computed one gets a ` (n)` suffix.
    pub fn submit(&self, desc: JobDescriptor) -> Result<JobHandle, OrchestratorError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(OrchestratorError::ShutDown);
        }
        let mut st = self.inner.state();
        let output = output_path_for(&desc, &self.inner.settings.download_root());
        let output = if desc.output_path.is_some() {
            if st.output_claimed(&output) {
                return Err(OrchestratorError::OutputInUse(output));
            }
            output
        } else {
            first_free_path(output, |p| st.output_claimed(p))
        };
        let job = Job::new(desc, output);
        let id = job.id;

        let progress = Arc::new(JobProgress::new());
        progress.set_total(job.total_size);
        let entry = JobEntry {
            job,
            progress,
            run_lock: Arc::new(tokio::sync::Mutex::new(())),
            generation: 0,
        };
        tracing::info!("job {id}: queued -> {}", entry.job.output_path.display());
        self.inner.emit(JobEvent::Added(entry.snapshot()));
        st.jobs.insert(id, entry);
        st.order.push(id);
        st.queue.push_back(id);
        self.inner.ensure_dispatcher(&mut st);
        Ok(JobHandle::new(id, self.clone()))
    }

    pub fn job(&self, id: JobId) -> Option<Job> {
        self.inner.state().jobs.get(&id).map(JobEntry::snapshot)
    }

    /// All jobs in submission order.
    pub fn jobs(&self) -> Vec<Job> {
        let st = self.inner.state();
        st.order
            .iter()
            .filter_map(|id| st.jobs.get(id).map(JobEntry::snapshot))
            .collect()
    }

    pub fn handle(&self, id: JobId) -> Option<JobHandle> {
        self.inner
            .state()
            .jobs
            .contains_key(&id)
            .then(|| JobHandle::new(id, self.clone()))
    }

    /// Jobs currently running.
    pub fn active_count(&self) -> usize {
        self.inner.state().active.len()
    }

    /// Queued job ids in dispatch order.
    pub fn queued(&self) -> Vec<JobId> {
        self.inner.state().queue.iter().copied().collect()
    }

    /// Start a Pending or Paused job right away, ahead of the queue. Uses a free
    /// job permit when there is one; otherwise the job runs outside the bound.
    pub fn start_now(&self, id: JobId) -> Result<(), OrchestratorError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(OrchestratorError::ShutDown);
        }
        let mut guard = self.inner.state();
        let st = &mut *guard;
        let status = st
            .jobs
            .get(&id)
            .ok_or(OrchestratorError::NotFound(id))?
            .job
            .status;
        match status {
            JobStatus::Pending | JobStatus::Paused => {}
            JobStatus::Downloading => return Ok(()),
            status => {
                return Err(OrchestratorError::InvalidState {
                    id,
                    status,
                    op: "start",
                })
            }
        }
        st.queue.retain(|q| *q != id);
        let permit = Arc::clone(&self.inner.job_permits).try_acquire_owned().ok();
        if permit.is_none() {
            tracing::debug!("job {id}: starting outside the job limit");
        }
        self.inner.launch(st, id, permit);
        Ok(())
    }

    /// Stop a Downloading (or still queued) job and keep its temp files.
    /// The job's permit is released at once; the running transfer is told to
    /// stop through its cancellation token.
    pub fn pause(&self, id: JobId) -> Result<(), OrchestratorError> {
        let mut guard = self.inner.state();
        let st = &mut *guard;
        let entry = st.jobs.get_mut(&id).ok_or(OrchestratorError::NotFound(id))?;
        match entry.job.status {
            JobStatus::Downloading | JobStatus::Pending => {}
            status => {
                return Err(OrchestratorError::InvalidState {
                    id,
                    status,
                    op: "pause",
                })
            }
        }
        entry.job.status = JobStatus::Paused;
        entry.sync_counters();
        st.queue.retain(|q| *q != id);
        if let Some(run) = st.active.remove(&id) {
            run.cancel.cancel();
        }
        tracing::info!("job {id}: paused");
        self.inner.emit(JobEvent::Paused(id));
        Ok(())
    }

    /// Put a Paused job back in the queue.
    pub fn resume(&self, id: JobId) -> Result<(), OrchestratorError> {
        let mut guard = self.inner.state();
        let st = &mut *guard;
        let entry = st.jobs.get_mut(&id).ok_or(OrchestratorError::NotFound(id))?;
        if entry.job.status != JobStatus::Paused {
            return Err(OrchestratorError::InvalidState {
                id,
                status: entry.job.status,
                op: "resume",
            });
        }
        entry.job.status = JobStatus::Pending;
        st.queue.push_back(id);
        tracing::info!("job {id}: resumed");
        self.inner.emit(JobEvent::Requeued(id));
        self.inner.ensure_dispatcher(st);
        Ok(())
    }

    /// Cancel a job that has not finished and delete its temp files.
    pub fn cancel(&self, id: JobId) -> Result<(), OrchestratorError> {
        let mut guard = self.inner.state();
        let st = &mut *guard;
        let entry = st.jobs.get_mut(&id).ok_or(OrchestratorError::NotFound(id))?;
        if entry.job.status.is_finished() {
            return Err(OrchestratorError::InvalidState {
                id,
                status: entry.job.status,
                op: "cancel",
            });
        }
        entry.job.status = JobStatus::Cancelled;
        entry.job.finished_at = Some(Utc::now());
        entry.sync_counters();
        let (output, run_lock) = (entry.job.output_path.clone(), Arc::clone(&entry.run_lock));
        self.inner.release_output(st, output, run_lock);
        st.queue.retain(|q| *q != id);
        if let Some(run) = st.active.remove(&id) {
            run.cancel.cancel();
        }
        tracing::info!("job {id}: cancelled");
        self.inner.emit(JobEvent::Cancelled(id));
        Ok(())
    }

    /// Re-queue a Failed job. Rejected once it has been retried `max_retries` times.
    pub fn retry(&self, id: JobId) -> Result<(), OrchestratorError> {
        if self.inner.shutdown.is_cancelled() {
            return Err(OrchestratorError::ShutDown);
        }
        let max_retries = self.inner.settings.max_retries;
        let mut guard = self.inner.state();
        let st = &mut *guard;
        let entry = st.jobs.get_mut(&id).ok_or(OrchestratorError::NotFound(id))?;
        if entry.job.status != JobStatus::Failed {
            return Err(OrchestratorError::InvalidState {
                id,
                status: entry.job.status,
                op: "retry",
            });
        }
        if entry.job.retry_count >= max_retries {
            return Err(OrchestratorError::RetryLimitReached {
                id,
                retries: entry.job.retry_count,
            });
        }
        entry.job.retry_count += 1;
        entry.job.status = JobStatus::Pending;
        entry.job.finished_at = None;
        st.queue.push_back(id);
        tracing::info!("job {id}: retry {} of {max_retries}", entry.job.retry_count);
        self.inner.emit(JobEvent::Requeued(id));
        self.inner.ensure_dispatcher(st);
        Ok(())
    }

    /// Forget Completed, Failed and Cancelled jobs. Returns how many were removed.
    pub fn clear_finished(&self) -> usize {
        let mut guard = self.inner.state();
        let st = &mut *guard;
        let before = st.jobs.len();
        st.jobs.retain(|_, e| !e.job.status.is_finished());
        let jobs = &st.jobs;
        st.order.retain(|id| jobs.contains_key(id));
        before - st.jobs.len()
    }

    /// Cancel everything still running or queued, delete its temp files and
    /// forget every job. Returns how many jobs were removed.
    pub fn clear_all(&self) -> usize {
        let mut guard = self.inner.state();
        let st = &mut *guard;
        for (id, run) in st.active.drain() {
            run.cancel.cancel();
            self.inner.emit(JobEvent::Cancelled(id));
        }
        let unfinished: Vec<_> = st
            .jobs
            .values()
            .filter(|e| !e.job.status.is_finished())
            .map(|e| (e.job.output_path.clone(), Arc::clone(&e.run_lock)))
            .collect();
        for (output, run_lock) in unfinished {
            self.inner.release_output(st, output, run_lock);
        }
        st.queue.clear();
        st.order.clear();
        let removed = st.jobs.len();
        st.jobs.clear();
        removed
    }

    /// Stop the engine: no new work is accepted, running jobs are stopped and
    /// left Paused with their temp files. Returns once every run has ended.
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let locks: Vec<_> = self
            .inner
            .state()
            .jobs
            .values()
            .map(|e| Arc::clone(&e.run_lock))
            .collect();
        for lock in locks {
            let _stopped = lock.lock().await;
        }
        tracing::info!("engine shut down");
    }
}
