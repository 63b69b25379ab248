//! Job control commands: `start`, `stop`, `watch`, `rerun-failed`, `download-failed`.

use anyhow::{bail, Context, Result};
use deed_desk_core::models::JobKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::client::{HttpJobClient, JobClient};
use crate::config::Config;
use crate::progress::{progress_events, ProgressMode};
use crate::scheduler::spawn_supervisor;
use crate::supervisor::{Board, JobSupervisor, StartRequest};

/// Start one job and print the pipeline's reply.
pub async fn run_start(config: &Config, request: StartRequest) -> Result<()> {
    let kind = request.kind();
    let client = Arc::new(HttpJobClient::new(&config.api)?);
    let mut supervisor = JobSupervisor::new(client);
    let reply = supervisor
        .start(request)
        .await
        .with_context(|| format!("Failed to start {}", kind))?;
    println!("{}: {}", kind, reply.message);
    Ok(())
}

pub async fn run_stop(config: &Config, kind: JobKind) -> Result<()> {
    let client = Arc::new(HttpJobClient::new(&config.api)?);
    let mut supervisor = JobSupervisor::new(client);
    let reply = supervisor
        .stop(kind)
        .await
        .with_context(|| format!("Failed to stop {}", kind))?;
    println!("{}: {}", kind, reply.message);
    Ok(())
}

/// Run the supervisor loop and report progress until both jobs are idle.
///
/// Stops early on Ctrl-C or when `timeout` elapses.
pub async fn run_watch(config: &Config, mode: ProgressMode, timeout: Option<Duration>) -> Result<()> {
    let client = Arc::new(HttpJobClient::new(&config.api)?);
    let handle = spawn_supervisor(JobSupervisor::new(client), config.polling.clone());
    let reporter = mode.reporter();

    let first = handle.refresh().await;
    if first.last_poll.is_none() {
        handle.shutdown().await;
        bail!("Could not reach the pipeline API at {}", config.api.base_url);
    }
    for event in progress_events(None, &first) {
        reporter.report(&event);
    }

    let mut rx = handle.subscribe();
    rx.borrow_and_update();
    let mut prev: Board = first;
    let deadline = timeout.map(|t| tokio::time::Instant::now() + t);

    while prev.any_running() {
        let sleep = async {
            match deadline {
                Some(d) => tokio::time::sleep_until(d).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let next = rx.borrow_and_update().clone();
                for event in progress_events(Some(&prev), &next) {
                    reporter.report(&event);
                }
                prev = next;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = sleep => {
                info!("watch timed out");
                break;
            }
        }
    }

    handle.shutdown().await;
    if !prev.any_running() {
        println!("All jobs idle.");
    }
    Ok(())
}

/// Move failed PDFs back to the upload folder.
pub async fn run_rerun_failed(config: &Config) -> Result<()> {
    let client = HttpJobClient::new(&config.api)?;
    let reply = client.rerun_failed().await?;
    if !reply.success {
        bail!("{}", reply.message);
    }
    println!("{}", reply.message);
    Ok(())
}

/// Save the ZIP of failed PDFs to `output`.
pub async fn run_download_failed(config: &Config, output: &Path) -> Result<()> {
    let client = HttpJobClient::new(&config.api)?;
    let bytes = client.download_failed().await?;
    std::fs::write(output, &bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("Wrote {} bytes to {}", bytes.len(), output.display());
    Ok(())
}
