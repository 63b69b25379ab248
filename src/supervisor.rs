//! Job Supervisor: local job state kept consistent with the remote pipeline.
//!
//! Each job kind is tracked from two independent sources:
//!
//! - **intent**: the local optimistic flag, set as soon as a start or stop
//!   request returns, before any poll confirms it;
//! - **snapshot**: the last stats report from the pipeline.
//!
//! While an intent is pending it decides the running state; the next
//! successful poll clears it and the snapshot decides from then on. So a
//! start shows `Running` immediately, a poll that finds the job finished
//! drops it back to `Idle`, and a poll that finds an externally started job
//! picks it up as `Running`.
//!
//! ```text
//!   Idle --start() ok-----------> Running
//!   Running --poll(): stopped---> Idle
//!   Running --stop()------------> Idle     (whatever the reply)
//!   Idle --poll(): running------> Running
//! ```
//!
//! Poll failures are logged and swallowed; start/stop failures are returned.

use chrono::{DateTime, Utc};
use deed_desk_core::models::{FolderStats, JobKind, JobStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::client::{ActionReply, JobClient};
use crate::config::PollingConfig;
use crate::error::{ApiError, DashboardError};

pub const OCR_WORKERS_RANGE: (u32, u32) = (1, 20);
pub const LLM_WORKERS_RANGE: (u32, u32) = (1, 20);
pub const STAGE2_QUEUE_RANGE: (u32, u32) = (1, 10);
pub const OCR_PAGE_WORKERS_RANGE: (u32, u32) = (1, 8);

/// Worker counts and pipeline tuning for an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionSettings {
    #[serde(default = "default_workers")]
    pub ocr_workers: u32,
    #[serde(default = "default_workers")]
    pub llm_workers: u32,
    /// Bounded queue between the OCR and LLM stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage2_queue_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_ocr_multiprocessing: Option<bool>,
    /// Page-level OCR workers per PDF.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ocr_page_workers: Option<u32>,
}

fn default_workers() -> u32 {
    5
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            ocr_workers: default_workers(),
            llm_workers: default_workers(),
            stage2_queue_size: Some(2),
            enable_ocr_multiprocessing: Some(true),
            ocr_page_workers: Some(2),
        }
    }
}

fn check_range(field: &'static str, value: u32, (min, max): (u32, u32)) -> Result<(), DashboardError> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(DashboardError::InvalidSetting {
            field,
            value,
            min,
            max,
        })
    }
}

impl ExtractionSettings {
    pub fn validate(&self) -> Result<(), DashboardError> {
        check_range("ocr_workers", self.ocr_workers, OCR_WORKERS_RANGE)?;
        check_range("llm_workers", self.llm_workers, LLM_WORKERS_RANGE)?;
        if let Some(size) = self.stage2_queue_size {
            check_range("stage2_queue_size", size, STAGE2_QUEUE_RANGE)?;
        }
        if let Some(workers) = self.ocr_page_workers {
            check_range("ocr_page_workers", workers, OCR_PAGE_WORKERS_RANGE)?;
        }
        Ok(())
    }
}

/// Per-request changes on top of the configured [`ExtractionSettings`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtractionOverrides {
    #[serde(default)]
    pub ocr_workers: Option<u32>,
    #[serde(default)]
    pub llm_workers: Option<u32>,
    #[serde(default)]
    pub stage2_queue_size: Option<u32>,
    #[serde(default)]
    pub enable_ocr_multiprocessing: Option<bool>,
    #[serde(default)]
    pub ocr_page_workers: Option<u32>,
}

impl ExtractionOverrides {
    pub fn apply(&self, base: &ExtractionSettings) -> ExtractionSettings {
        ExtractionSettings {
            ocr_workers: self.ocr_workers.unwrap_or(base.ocr_workers),
            llm_workers: self.llm_workers.unwrap_or(base.llm_workers),
            stage2_queue_size: self.stage2_queue_size.or(base.stage2_queue_size),
            enable_ocr_multiprocessing: self
                .enable_ocr_multiprocessing
                .or(base.enable_ocr_multiprocessing),
            ocr_page_workers: self.ocr_page_workers.or(base.ocr_page_workers),
        }
    }
}

/// What to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartRequest {
    Extraction(ExtractionSettings),
    /// The vision job takes no tuning parameters.
    Vision,
}

impl StartRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            StartRequest::Extraction(_) => JobKind::Extraction,
            StartRequest::Vision => JobKind::Vision,
        }
    }

    pub fn validate(&self) -> Result<(), DashboardError> {
        match self {
            StartRequest::Extraction(settings) => settings.validate(),
            StartRequest::Vision => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobPhase {
    Idle,
    Running,
}

/// Local view of one job kind.
#[derive(Debug, Clone)]
pub struct JobTrack {
    kind: JobKind,
    intent: Option<bool>,
    snapshot: Option<JobStats>,
}

impl JobTrack {
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            intent: None,
            snapshot: None,
        }
    }

    pub fn kind(&self) -> JobKind {
        self.kind
    }

    pub fn is_running(&self) -> bool {
        match self.intent {
            Some(running) => running,
            None => self.snapshot.as_ref().is_some_and(|s| s.is_running),
        }
    }

    pub fn phase(&self) -> JobPhase {
        if self.is_running() {
            JobPhase::Running
        } else {
            JobPhase::Idle
        }
    }

    /// An optimistic intent not yet confirmed by a poll.
    pub fn pending_intent(&self) -> Option<bool> {
        self.intent
    }

    pub fn snapshot(&self) -> Option<&JobStats> {
        self.snapshot.as_ref()
    }

    fn mark_started(&mut self) {
        self.intent = Some(true);
    }

    fn mark_stopped(&mut self) {
        self.intent = Some(false);
    }

    fn reconcile(&mut self, snapshot: JobStats) {
        if self.intent == Some(true) && !snapshot.is_running {
            debug!(kind = %self.kind, "remote reports job finished; clearing optimistic start");
        }
        self.intent = None;
        self.snapshot = Some(snapshot);
    }

    pub fn state(&self) -> JobState {
        let stats = self.snapshot.clone().unwrap_or_default();
        let running = self.is_running();
        JobState {
            kind: self.kind,
            phase: self.phase(),
            is_running: running,
            processed: stats.processed,
            failed: stats.failed,
            total: stats.total,
            active_worker_count: if running { stats.active_workers } else { 0 },
        }
    }
}

/// Per-kind state exposed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobState {
    pub kind: JobKind,
    pub phase: JobPhase,
    pub is_running: bool,
    pub processed: u64,
    pub failed: u64,
    pub total: u64,
    pub active_worker_count: u32,
}

/// Everything the dashboard shows about the pipeline at one moment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Board {
    pub extraction: JobState,
    pub vision: JobState,
    pub folders: Option<FolderStats>,
    pub last_poll: Option<DateTime<Utc>>,
}

impl Board {
    pub fn job(&self, kind: JobKind) -> &JobState {
        match kind {
            JobKind::Extraction => &self.extraction,
            JobKind::Vision => &self.vision,
        }
    }

    pub fn any_running(&self) -> bool {
        self.extraction.is_running || self.vision.is_running
    }
}

/// How often the scheduler should tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// A job runs: poll job stats at the short interval.
    Active(Duration),
    /// Nothing runs: only peripheral information at the long interval.
    Ambient(Duration),
}

impl Cadence {
    pub fn interval(&self) -> Duration {
        match self {
            Cadence::Active(d) | Cadence::Ambient(d) => *d,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Cadence::Active(_))
    }
}

/// Owns both job tracks and talks to the pipeline through a [`JobClient`].
pub struct JobSupervisor<C: ?Sized> {
    client: Arc<C>,
    extraction: JobTrack,
    vision: JobTrack,
    folders: Option<FolderStats>,
    last_poll: Option<DateTime<Utc>>,
}

impl<C: JobClient + ?Sized> JobSupervisor<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            extraction: JobTrack::new(JobKind::Extraction),
            vision: JobTrack::new(JobKind::Vision),
            folders: None,
            last_poll: None,
        }
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn track(&self, kind: JobKind) -> &JobTrack {
        match kind {
            JobKind::Extraction => &self.extraction,
            JobKind::Vision => &self.vision,
        }
    }

    fn track_mut(&mut self, kind: JobKind) -> &mut JobTrack {
        match kind {
            JobKind::Extraction => &mut self.extraction,
            JobKind::Vision => &mut self.vision,
        }
    }

    pub fn state(&self, kind: JobKind) -> JobState {
        self.track(kind).state()
    }

    pub fn any_running(&self) -> bool {
        self.extraction.is_running() || self.vision.is_running()
    }

    pub fn board(&self) -> Board {
        Board {
            extraction: self.extraction.state(),
            vision: self.vision.state(),
            folders: self.folders.clone(),
            last_poll: self.last_poll,
        }
    }

    /// Polling guard, evaluated after every state change.
    pub fn cadence(&self, polling: &PollingConfig) -> Cadence {
        if self.any_running() {
            Cadence::Active(polling.active_interval())
        } else {
            Cadence::Ambient(polling.ambient_interval())
        }
    }

    /// Ask the pipeline to start a job.
    ///
    /// On acceptance the job is `Running` immediately. A refusal leaves the
    /// local state untouched and returns the remote message verbatim.
    pub async fn start(&mut self, request: StartRequest) -> Result<ActionReply, DashboardError> {
        request.validate()?;
        let kind = request.kind();

        let reply = self
            .client
            .start_job(kind, &request)
            .await
            .map_err(|e| DashboardError::RejectedAction(e.message))?;

        if !reply.success {
            info!(%kind, message = %reply.message, "start refused");
            return Err(DashboardError::RejectedAction(reply.message));
        }

        self.track_mut(kind).mark_started();
        info!(%kind, message = %reply.message, "job started");
        Ok(reply)
    }

    /// Ask the pipeline to stop a job.
    ///
    /// The job is `Idle` locally afterwards whatever the pipeline answered;
    /// a failed request is still returned to the caller.
    pub async fn stop(&mut self, kind: JobKind) -> Result<ActionReply, DashboardError> {
        let result = self.client.stop_job(kind).await;
        self.track_mut(kind).mark_stopped();

        match result {
            Ok(reply) => {
                info!(%kind, message = %reply.message, "job stopped");
                Ok(reply)
            }
            Err(e) => {
                info!(%kind, error = %e, "stop request failed; job marked idle");
                Err(DashboardError::RejectedAction(e.message))
            }
        }
    }

    /// Fetch one kind's stats and reconcile its track.
    ///
    /// A failure is logged and leaves the track as it was.
    pub async fn poll(&mut self, kind: JobKind) -> Result<JobState, DashboardError> {
        let result = self.client.get_stats(kind).await;
        self.apply_poll(kind, result)
    }

    /// Fetch both kinds' stats concurrently and reconcile both tracks.
    ///
    /// Failures are logged and swallowed; the returned board reflects
    /// whatever could be applied.
    pub async fn poll_all(&mut self) -> Board {
        let client = Arc::clone(&self.client);
        let (extraction, vision) = tokio::join!(
            client.get_stats(JobKind::Extraction),
            client.get_stats(JobKind::Vision)
        );
        let _ = self.apply_poll(JobKind::Extraction, extraction);
        let _ = self.apply_poll(JobKind::Vision, vision);
        self.board()
    }

    /// Refresh the peripheral folder counts.
    pub async fn refresh_folders(&mut self) -> Result<FolderStats, DashboardError> {
        match self.client.folder_stats().await {
            Ok(folders) => {
                self.folders = Some(folders.clone());
                Ok(folders)
            }
            Err(e) => {
                warn!(error = %e, "folder stats fetch failed");
                Err(DashboardError::TransientFetch(e.message))
            }
        }
    }

    fn apply_poll(
        &mut self,
        kind: JobKind,
        result: Result<JobStats, ApiError>,
    ) -> Result<JobState, DashboardError> {
        match result {
            Ok(stats) => {
                debug!(
                    %kind,
                    running = stats.is_running,
                    processed = stats.processed,
                    total = stats.total,
                    "polled"
                );
                self.track_mut(kind).reconcile(stats);
                self.last_poll = Some(Utc::now());
                Ok(self.state(kind))
            }
            Err(e) => {
                warn!(%kind, error = %e, "stats poll failed; keeping last known state");
                Err(DashboardError::TransientFetch(e.message))
            }
        }
    }
}
