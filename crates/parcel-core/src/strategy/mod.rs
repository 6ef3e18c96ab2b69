//! Transfer strategies: a closed set, chosen once per job.
//!
//! [`select`] is pure: it looks only at the declared kind and the URL's host.
//! Whether a direct job goes chunked or single-stream is decided by the
//! direct strategy itself after probing.

mod direct;
mod external;
mod segments;
mod single;

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::EngineError;
use crate::job::{Job, JobKind, JobProgress};
use crate::transfer::TransferClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// One URL: chunked when the server supports ranges and the resource is
    /// large enough, single-stream otherwise.
    Direct,
    /// Ordered segment URLs concatenated into one file.
    Segments,
    /// Delegated to the configured external program.
    External,
}

/// Strategy for a job of `kind` fetching `url`. A URL whose host matches one of
/// `cloud_hosts` (exactly or as a subdomain) always goes external.
pub fn select(kind: JobKind, url: &str, cloud_hosts: &[String]) -> Strategy {
    if is_cloud_host(url, cloud_hosts) {
        return Strategy::External;
    }
    match kind {
        JobKind::Direct => Strategy::Direct,
        JobKind::Segmented => Strategy::Segments,
        JobKind::External => Strategy::External,
    }
}

fn is_cloud_host(url: &str, cloud_hosts: &[String]) -> bool {
    let Some(host) = url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
    else {
        return false;
    };
    cloud_hosts.iter().any(|h| {
        let h = h.trim().trim_start_matches('.').to_ascii_lowercase();
        !h.is_empty() && (host == h || host.ends_with(&format!(".{h}")))
    })
}

/// Everything a strategy needs for one run of one job.
pub struct JobRun {
    /// Snapshot taken when the run started.
    pub job: Job,
    pub settings: Arc<Settings>,
    pub client: TransferClient,
    pub progress: Arc<JobProgress>,
    pub cancel: CancellationToken,
}

impl JobRun {
    pub fn output(&self) -> &Path {
        &self.job.output_path
    }

    /// Directory the output (and its temp files) live in.
    pub fn output_dir(&self) -> &Path {
        self.job
            .output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl Strategy {
    pub async fn run(self, run: &JobRun) -> Result<(), EngineError> {
        tracing::debug!("job {}: {:?} strategy", run.job.id, self);
        match self {
            Strategy::Direct => direct::run(run).await,
            Strategy::Segments => segments::run(run).await,
            Strategy::External => external::run(run).await,
        }
    }
}
