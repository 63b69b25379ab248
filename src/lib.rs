//! # Deed Desk
//!
//! Supervisor and spreadsheet-style report for a remote sale-deed
//! extraction pipeline.
//!
//! The pipeline runs two long batch jobs (text/OCR extraction and vision
//! extraction) and stores one record per deed. Deed Desk starts and stops
//! those jobs, keeps a local view of their progress consistent with the
//! pipeline through adaptive polling, and renders the deeds as a flat
//! buyer/seller grid or an xlsx export.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │  JobClient   │──▶│  Supervisor  │──▶│  Scheduler   │──▶ watch::Receiver<Board>
//! │ (HTTP / mock)│   │ intent+snap  │   │ select! loop │
//! └──────┬───────┘   └──────────────┘   └──────────────┘
//!        │
//!        └──▶ documents ──▶ deed_desk_core (flatten, group, search, export)
//!                                 │
//!                      ┌──────────┴──────────┐
//!                      ▼                     ▼
//!                 ┌──────────┐         ┌──────────┐
//!                 │   CLI    │         │  Bridge  │
//!                 │ (deeds)  │         │  (axum)  │
//!                 └──────────┘         └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! deeds status                          # poll both jobs once
//! deeds start extraction --ocr-workers 8
//! deeds watch                           # follow progress until idle
//! deeds table --search "ravi" --page 2
//! deeds export --from 2024-01-01 --to 2024-03-31 --output q1.xlsx
//! deeds serve                           # HTTP bridge for the UI shell
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`client`] | Remote pipeline API client |
//! | [`supervisor`] | Job state machine |
//! | [`scheduler`] | Adaptive polling loop |
//! | [`workbook`] | xlsx export writer |
//! | [`serve`] | HTTP bridge for the UI shell |
//! | [`progress`] | Job progress reporting |
//! | [`status`], [`jobs`], [`table`] | CLI commands |

pub mod client;
pub mod config;
pub mod error;
pub mod jobs;
pub mod progress;
pub mod scheduler;
pub mod serve;
pub mod status;
pub mod supervisor;
pub mod table;
pub mod workbook;

#[cfg(test)]
mod testing;
