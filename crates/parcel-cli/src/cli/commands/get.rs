//! `parcel get` – submit downloads and follow them to the end.

use anyhow::{anyhow, bail, Result};
use parcel_core::{JobDescriptor, JobEvent, JobId, JobStatus, Orchestrator, Settings};
use std::collections::HashSet;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;

#[derive(Debug, Clone, Default)]
pub struct GetArgs {
    pub urls: Vec<String>,
    pub output: Option<PathBuf>,
    pub chunks: Option<usize>,
    pub checksum: Option<String>,
    pub headers: Vec<String>,
    pub json: bool,
}

/// Split `Name: value` (or `Name:value`) into a trimmed pair.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("header {raw:?} is not in `Name: value` form"))?;
    let name = name.trim();
    if name.is_empty() {
        bail!("header {raw:?} has an empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Build one descriptor per URL. With several URLs, `--output` names a directory.
fn descriptors(args: &GetArgs, settings: &mut Settings) -> Result<Vec<JobDescriptor>> {
    let headers = args
        .headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<Result<Vec<_>>>()?;
    if args.urls.len() > 1 {
        if let Some(dir) = &args.output {
            settings.download_dir = Some(dir.clone());
        }
        if args.checksum.is_some() {
            bail!("--checksum applies to a single URL");
        }
    }

    let mut out = Vec::with_capacity(args.urls.len());
    for url in &args.urls {
        url::Url::parse(url).map_err(|e| anyhow!("invalid URL {url:?}: {e}"))?;
        let mut desc = JobDescriptor::direct(url.as_str());
        if args.urls.len() == 1 {
            if let Some(path) = &args.output {
                desc = desc.with_output(path.clone());
            }
        }
        if let Some(hex) = &args.checksum {
            desc = desc.with_checksum(hex.clone());
        }
        if let Some(n) = args.chunks {
            desc = desc.with_chunk_count(n);
        }
        for (name, value) in &headers {
            desc = desc.with_header(name.clone(), value.clone());
        }
        out.push(desc);
    }
    Ok(out)
}

fn mib(bytes: u64) -> f64 {
    bytes as f64 / 1_048_576.0
}

fn short(id: JobId) -> String {
    id.to_string().chars().take(8).collect()
}

/// Submit every URL, print progress until all jobs end, and fail if any did.
/// Ctrl-C stops the engine and keeps partial files for a later run.
pub async fn run_get(mut settings: Settings, args: GetArgs) -> Result<()> {
    let descs = descriptors(&args, &mut settings)?;
    let engine = Orchestrator::new(settings);
    let mut events = engine.subscribe();

    let mut pending: HashSet<JobId> = HashSet::new();
    let mut ids = Vec::new();
    for desc in descs {
        let handle = engine.submit(desc)?;
        pending.insert(handle.id());
        ids.push(handle.id());
    }

    let interrupted = loop {
        if pending.is_empty() {
            break false;
        }
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break true,
            ev = events.recv() => ev,
        };
        match event {
            Ok(ev) => {
                if !args.json {
                    print_event(&ev);
                }
                match ev {
                    JobEvent::Completed(job) | JobEvent::Failed { job, .. } => {
                        pending.remove(&job.id);
                    }
                    JobEvent::Cancelled(id) => {
                        pending.remove(&id);
                    }
                    _ => {}
                }
            }
            Err(RecvError::Lagged(n)) => {
                tracing::debug!("missed {n} events");
                pending.retain(|id| engine.job(*id).is_some_and(|j| !j.status.is_finished()));
            }
            Err(RecvError::Closed) => break false,
        }
    };

    if interrupted {
        eprintln!("interrupted; stopping downloads (partial files are kept)");
        engine.shutdown().await;
    }

    let jobs: Vec<_> = ids.iter().filter_map(|id| engine.job(*id)).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
    }
    if interrupted {
        bail!("interrupted");
    }
    let failed = jobs
        .iter()
        .filter(|j| j.status != JobStatus::Completed)
        .count();
    if failed > 0 {
        bail!("{failed} of {} download(s) did not complete", jobs.len());
    }
    Ok(())
}

fn print_event(ev: &JobEvent) {
    match ev {
        JobEvent::Added(job) => println!("[{}] queued {}", short(job.id), job.source_url),
        JobEvent::Started(job) => {
            println!("[{}] -> {}", short(job.id), job.output_path.display())
        }
        JobEvent::Progress {
            id,
            downloaded,
            total,
        } => {
            if *total > 0 {
                let pct = *downloaded as f64 / *total as f64 * 100.0;
                println!(
                    "[{}] {:.1} / {:.1} MiB ({:.1}%)",
                    short(*id),
                    mib(*downloaded),
                    mib(*total),
                    pct
                );
            } else {
                println!("[{}] {:.1} MiB", short(*id), mib(*downloaded));
            }
        }
        JobEvent::Paused(id) => println!("[{}] paused", short(*id)),
        JobEvent::Requeued(id) => println!("[{}] requeued", short(*id)),
        JobEvent::Completed(job) => println!(
            "[{}] done: {} ({:.1} MiB)",
            short(job.id),
            job.output_path.display(),
            mib(job.downloaded_bytes)
        ),
        JobEvent::Failed { job, error } => eprintln!("[{}] failed: {error}", short(job.id)),
        JobEvent::Cancelled(id) => println!("[{}] cancelled", short(*id)),
    }
}
