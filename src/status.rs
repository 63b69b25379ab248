//! Pipeline status and host health overview.
//!
//! Used by `deeds status` and `deeds system` to show, at a glance, whether
//! either batch job is running, how far it got, and what is waiting in the
//! pipeline's folders.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use deed_desk_core::models::{FolderStats, SystemInfo};
use std::fmt::Write;
use std::sync::Arc;

use crate::client::{HttpJobClient, JobClient};
use crate::config::Config;
use crate::progress::format_number;
use crate::supervisor::{Board, JobState, JobSupervisor};

/// Run the status command: poll both jobs once and print the board.
pub async fn run_status(config: &Config, json: bool) -> Result<()> {
    let client = Arc::new(HttpJobClient::new(&config.api)?);
    let mut supervisor = JobSupervisor::new(client);
    supervisor.poll_all().await;
    let _ = supervisor.refresh_folders().await;
    let board = supervisor.board();

    if board.last_poll.is_none() {
        bail!("Could not reach the pipeline API at {}", config.api.base_url);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
    } else {
        print!("{}", render_board(&board));
    }
    Ok(())
}

/// Run the system command: print host and model backend health.
pub async fn run_system(config: &Config, json: bool) -> Result<()> {
    let client = HttpJobClient::new(&config.api)?;
    let info = client.system_info().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", render_system(&info));
    }
    Ok(())
}

pub fn render_board(board: &Board) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Deed Desk: pipeline status");
    let _ = writeln!(out, "==========================");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  {:<12} {:<8} {:>10} {:>8} {:>10} {:>8}",
        "KIND", "STATE", "PROCESSED", "FAILED", "TOTAL", "WORKERS"
    );
    let _ = writeln!(out, "  {}", "-".repeat(61));
    for state in [&board.extraction, &board.vision] {
        let _ = writeln!(out, "{}", job_line(state));
    }

    if let Some(folders) = &board.folders {
        let _ = writeln!(out);
        out.push_str(&render_folders(folders));
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "  Last poll:   {}", format_poll_time(board.last_poll));
    out
}

fn job_line(state: &JobState) -> String {
    let phase = if state.is_running { "running" } else { "idle" };
    format!(
        "  {:<12} {:<8} {:>10} {:>8} {:>10} {:>8}",
        state.kind.as_str(),
        phase,
        format_number(state.processed),
        format_number(state.failed),
        format_number(state.total),
        state.active_worker_count
    )
}

fn render_folders(folders: &FolderStats) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "  Folders:");
    let _ = writeln!(out, "    newly uploaded     {:>8}", format_number(folders.newly_uploaded));
    let _ = writeln!(out, "    processed          {:>8}", format_number(folders.processed));
    let _ = writeln!(out, "    failed             {:>8}", format_number(folders.failed));
    let _ = writeln!(out, "    left over reg fee  {:>8}", format_number(folders.left_over_reg_fee));
    out
}

fn format_poll_time(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

pub fn render_system(info: &SystemInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Deed Desk: pipeline host");
    let _ = writeln!(out, "========================");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "  CUDA:        {} ({} device{})",
        yes_no(info.cuda_available),
        info.cuda_device_count,
        if info.cuda_device_count == 1 { "" } else { "s" }
    );
    let _ = writeln!(out, "  Poppler:     {}", yes_no(info.poppler_available));
    let _ = writeln!(out, "  Tesseract:   {}", yes_no(info.tesseract_available));
    let _ = writeln!(out, "  Ollama:      {}", yes_no(info.ollama_connected));
    let _ = writeln!(out, "  YOLO model:  {}", yes_no(info.yolo_model_loaded));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervisor::JobPhase;
    use deed_desk_core::models::JobKind;

    fn idle(kind: JobKind) -> JobState {
        JobState {
            kind,
            phase: JobPhase::Idle,
            is_running: false,
            processed: 0,
            failed: 0,
            total: 0,
            active_worker_count: 0,
        }
    }

    #[test]
    fn board_lists_both_kinds_and_folders() {
        let board = Board {
            extraction: JobState {
                phase: JobPhase::Running,
                is_running: true,
                processed: 1234,
                total: 5000,
                failed: 2,
                active_worker_count: 4,
                ..idle(JobKind::Extraction)
            },
            vision: idle(JobKind::Vision),
            folders: Some(FolderStats {
                newly_uploaded: 12,
                ..FolderStats::default()
            }),
            last_poll: None,
        };
        let text = render_board(&board);
        assert!(text.contains("extraction"));
        assert!(text.contains("running"));
        assert!(text.contains("1,234"));
        assert!(text.contains("vision"));
        assert!(text.contains("newly uploaded"));
        assert!(text.contains("Last poll:   never"));
    }

    #[test]
    fn system_pluralizes_devices() {
        let info = SystemInfo {
            cuda_available: true,
            cuda_device_count: 1,
            ..SystemInfo::default()
        };
        let text = render_system(&info);
        assert!(text.contains("yes (1 device)"));
        assert!(text.contains("Ollama:      no"));
    }
}
