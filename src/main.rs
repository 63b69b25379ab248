//! # Deed Desk CLI (`deeds`)
//!
//! The `deeds` binary drives the remote sale-deed pipeline: it starts and
//! stops the extraction and vision jobs, follows their progress, prints the
//! flattened deed table, writes xlsx exports, and serves the HTTP bridge
//! used by the UI shell.
//!
//! ## Usage
//!
//! ```bash
//! deeds --config ./config/deeds.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `deeds status` | Poll both jobs once and print their state |
//! | `deeds start extraction` | Start the OCR + LLM extraction job |
//! | `deeds start vision` | Start the vision extraction job |
//! | `deeds stop <kind>` | Stop a job |
//! | `deeds watch` | Follow progress until both jobs are idle |
//! | `deeds table` | Print one page of the buyer/seller grid |
//! | `deeds export` | Write an xlsx export |
//! | `deeds rerun-failed` | Move failed PDFs back to the upload folder |
//! | `deeds download-failed` | Save a ZIP of failed PDFs |
//! | `deeds system` | Show pipeline host health |
//! | `deeds serve` | Start the HTTP bridge |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `deed_desk=info`).

use clap::{Parser, Subcommand};
use deed_desk::config;
use deed_desk::progress::ProgressMode;
use deed_desk::supervisor::{ExtractionOverrides, StartRequest};
use deed_desk::{jobs, serve, status, table};
use deed_desk_core::export::DateRange;
use deed_desk_core::models::JobKind;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Deed Desk CLI: supervise the sale-deed extraction pipeline and export
/// its records.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/deeds.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "deeds",
    about = "Deed Desk: supervise the sale-deed extraction pipeline and export its records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/deeds.toml")]
    config: PathBuf,

    /// Machine-readable output: JSON on stdout, JSON progress lines on stderr.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll both jobs once and print their state and folder counts.
    Status,

    /// Start a batch job.
    Start {
        #[command(subcommand)]
        job: StartJob,
    },

    /// Stop a batch job (`extraction` or `vision`).
    ///
    /// The job is treated as stopped locally whatever the pipeline answers.
    Stop {
        kind: JobKind,
    },

    /// Follow job progress until both jobs are idle.
    Watch {
        /// Give up after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print one page of the flattened buyer/seller grid.
    Table {
        /// Case-insensitive match on document id, buyer/seller names, and property address.
        #[arg(long, default_value = "")]
        search: String,

        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: usize,
    },

    /// Write an xlsx export with one row per buyer/seller.
    Export {
        /// Only documents created on or after this date (YYYY-MM-DD).
        #[arg(long)]
        from: Option<String>,

        /// Only documents created on or before this date (YYYY-MM-DD).
        #[arg(long)]
        to: Option<String>,

        /// Output file.
        #[arg(long, default_value = "sale_deeds_export.xlsx")]
        output: PathBuf,

        /// Download the pipeline's own spreadsheet instead of building one locally.
        #[arg(long)]
        server: bool,
    },

    /// Move failed PDFs back into the upload folder.
    RerunFailed,

    /// Save a ZIP archive of failed PDFs.
    DownloadFailed {
        #[arg(long, default_value = "failed_pdfs.zip")]
        output: PathBuf,
    },

    /// Show pipeline host and model backend health.
    System,

    /// Start the HTTP bridge for the UI shell on `[server].bind`.
    Serve,
}

#[derive(Subcommand)]
enum StartJob {
    /// Text/OCR + LLM extraction. Flags override `[jobs.extraction]`.
    Extraction {
        /// OCR workers (1-20).
        #[arg(long)]
        ocr_workers: Option<u32>,

        /// LLM workers (1-20).
        #[arg(long)]
        llm_workers: Option<u32>,

        /// Queue size between the OCR and LLM stages (1-10).
        #[arg(long)]
        stage2_queue_size: Option<u32>,

        /// Enable page-level OCR multiprocessing.
        #[arg(long)]
        ocr_multiprocessing: Option<bool>,

        /// Page-level OCR workers per PDF (1-8).
        #[arg(long)]
        ocr_page_workers: Option<u32>,
    },

    /// Vision extraction of registration fee tables.
    Vision,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("deed_desk=info,deeds=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Status => {
            status::run_status(&cfg, cli.json).await?;
        }
        Commands::Start { job } => {
            let request = match job {
                StartJob::Extraction {
                    ocr_workers,
                    llm_workers,
                    stage2_queue_size,
                    ocr_multiprocessing,
                    ocr_page_workers,
                } => {
                    let overrides = ExtractionOverrides {
                        ocr_workers,
                        llm_workers,
                        stage2_queue_size,
                        enable_ocr_multiprocessing: ocr_multiprocessing,
                        ocr_page_workers,
                    };
                    StartRequest::Extraction(overrides.apply(&cfg.jobs.extraction))
                }
                StartJob::Vision => StartRequest::Vision,
            };
            jobs::run_start(&cfg, request).await?;
        }
        Commands::Stop { kind } => {
            jobs::run_stop(&cfg, kind).await?;
        }
        Commands::Watch { timeout } => {
            let mode = ProgressMode::select(cli.json);
            jobs::run_watch(&cfg, mode, timeout.map(Duration::from_secs)).await?;
        }
        Commands::Table { search, page } => {
            table::run_table(&cfg, &search, page, cli.json).await?;
        }
        Commands::Export {
            from,
            to,
            output,
            server,
        } => {
            let range = DateRange::parse(from.as_deref(), to.as_deref())?;
            table::run_export(&cfg, &range, &output, server).await?;
        }
        Commands::RerunFailed => {
            jobs::run_rerun_failed(&cfg).await?;
        }
        Commands::DownloadFailed { output } => {
            jobs::run_download_failed(&cfg, &output).await?;
        }
        Commands::System => {
            status::run_system(&cfg, cli.json).await?;
        }
        Commands::Serve => {
            serve::run_server(&cfg).await?;
        }
    }

    Ok(())
}
