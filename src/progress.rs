//! Job progress reporting for `deeds watch`.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.
//! Events are derived by diffing consecutive [`Board`]s published by the
//! supervisor loop: a running kind whose counters moved reports progress, and
//! a kind that dropped from running to idle reports completion.

use deed_desk_core::models::JobKind;
use std::io::Write;

use crate::supervisor::{Board, JobState};

/// A single progress event for one job kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobProgressEvent {
    /// The job runs and its counters changed.
    Progress(JobState),
    /// The job went from running to idle.
    Finished {
        kind: JobKind,
        processed: u64,
        failed: u64,
        total: u64,
    },
}

/// Events between two consecutive boards. `prev` is `None` for the first board.
pub fn progress_events(prev: Option<&Board>, next: &Board) -> Vec<JobProgressEvent> {
    let mut events = Vec::new();
    for kind in JobKind::ALL {
        let now = next.job(kind);
        let before = prev.map(|b| b.job(kind));
        match before {
            Some(b) if b.is_running && !now.is_running => events.push(JobProgressEvent::Finished {
                kind,
                processed: now.processed,
                failed: now.failed,
                total: now.total,
            }),
            Some(b) if b == now => {}
            _ if now.is_running => events.push(JobProgressEvent::Progress(now.clone())),
            _ => {}
        }
    }
    events
}

/// Reports job progress. Implementations write to stderr (human or JSON).
pub trait JobProgressReporter: Send + Sync {
    fn report(&self, event: &JobProgressEvent);
}

/// Human-friendly progress on stderr: "extraction  running  1,234 / 5,000 processed  (2 failed, 4 workers)".
pub struct StderrProgress;

impl JobProgressReporter for StderrProgress {
    fn report(&self, event: &JobProgressEvent) {
        let line = match event {
            JobProgressEvent::Progress(state) => format!(
                "{:<10}  running  {} / {} processed  ({} failed, {} workers)\n",
                state.kind.as_str(),
                format_number(state.processed),
                format_number(state.total),
                format_number(state.failed),
                state.active_worker_count
            ),
            JobProgressEvent::Finished {
                kind,
                processed,
                failed,
                total,
            } => format!(
                "{:<10}  finished  {} / {} processed  ({} failed)\n",
                kind.as_str(),
                format_number(*processed),
                format_number(*total),
                format_number(*failed)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JobProgressReporter for JsonProgress {
    fn report(&self, event: &JobProgressEvent) {
        let obj = match event {
            JobProgressEvent::Progress(state) => serde_json::json!({
                "event": "progress",
                "kind": state.kind,
                "processed": state.processed,
                "failed": state.failed,
                "total": state.total,
                "active_workers": state.active_worker_count,
            }),
            JobProgressEvent::Finished {
                kind,
                processed,
                failed,
                total,
            } => serde_json::json!({
                "event": "finished",
                "kind": kind,
                "processed": processed,
                "failed": failed,
                "total": total,
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl JobProgressReporter for NoProgress {
    fn report(&self, _event: &JobProgressEvent) {}
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// `--json` wins; otherwise human progress when stderr is a TTY, else off.
    pub fn select(json: bool) -> Self {
        if json {
            ProgressMode::Json
        } else if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn JobProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
