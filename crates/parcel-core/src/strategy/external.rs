use std::process::Stdio;

use tokio::process::Command;

use super::JobRun;
use crate::checksum::verify_path;
use crate::error::EngineError;
use crate::store::{ensure_directory, existing_len, safe_delete};

/// Substitute `{url}` and `{output}` in every argument of `template`.
fn command_line(template: &[String], url: &str, output: &str) -> Vec<String> {
    template
        .iter()
        .map(|a| a.replace("{url}", url).replace("{output}", output))
        .collect()
}

/// Run the configured external program and wait for it. Cancellation kills it.
/// The program must leave the finished file at the job's output path.
pub(super) async fn run(run: &JobRun) -> Result<(), EngineError> {
    let output = run.output();
    let argv = command_line(
        &run.settings.external_command,
        &run.job.source_url,
        &output.to_string_lossy(),
    );
    let Some((program, args)) = argv.split_first() else {
        return Err(EngineError::External(
            "no external handler configured".to_string(),
        ));
    };
    ensure_directory(run.output_dir())?;

    tracing::info!("job {}: handing {} to {program}", run.job.id, run.job.source_url);
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| EngineError::External(format!("spawn {program}: {e}")))?;

    let status = tokio::select! {
        _ = run.cancel.cancelled() => {
            if let Err(e) = child.kill().await {
                tracing::warn!("kill {program}: {e}");
            }
            return Err(EngineError::Cancelled);
        }
        status = child.wait() => status
            .map_err(|e| EngineError::External(format!("wait for {program}: {e}")))?,
    };
    if !status.success() {
        return Err(EngineError::External(format!("{program} exited with {status}")));
    }
    if !output.is_file() {
        return Err(EngineError::External(format!(
            "{program} did not produce {}",
            output.display()
        )));
    }

    let size = existing_len(output);
    run.progress.set_total(size);
    run.progress.start_at(size);

    if let Some(expected) = run.job.checksum().map(str::to_string) {
        let path = output.to_path_buf();
        let cancel = run.cancel.clone();
        let verified =
            tokio::task::spawn_blocking(move || verify_path(&path, &expected, &cancel)).await?;
        if let Err(e) = verified {
            if matches!(e, EngineError::ChecksumMismatch { .. }) {
                let _ = safe_delete(output);
            }
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_substituted_in_every_argument() {
        let t: Vec<String> = ["fetcher", "--out={output}", "{url}", "-v"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            command_line(&t, "https://x.test/f", "/dl/f.bin"),
            vec!["fetcher", "--out=/dl/f.bin", "https://x.test/f", "-v"]
        );
    }
}
