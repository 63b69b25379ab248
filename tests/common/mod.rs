//! In-process stand-in for the sale-deed pipeline API.
//!
//! Jobs advance by one processed file per stats request while running and
//! stop by themselves once every pending PDF is processed.

#![allow(dead_code)]

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Default, Clone, Copy)]
pub struct JobSim {
    pub running: bool,
    pub processed: u64,
    pub total: u64,
}

#[derive(Default)]
pub struct PipelineState {
    pub extraction: JobSim,
    pub vision: JobSim,
    pub pending_pdfs: u64,
    pub documents: Vec<Value>,
    pub last_start_body: Option<Value>,
    pub start_calls: u64,
    pub stats_calls: u64,
}

#[derive(Clone, Copy)]
enum Sim {
    Extraction,
    Vision,
}

impl Sim {
    fn already_running(self) -> &'static str {
        match self {
            Sim::Extraction => "Batch processing already running",
            Sim::Vision => "Vision processing already running",
        }
    }

    fn not_running(self) -> &'static str {
        match self {
            Sim::Extraction => "No batch processing is running",
            Sim::Vision => "No vision processing is running",
        }
    }
}

impl PipelineState {
    fn job(&mut self, sim: Sim) -> &mut JobSim {
        match sim {
            Sim::Extraction => &mut self.extraction,
            Sim::Vision => &mut self.vision,
        }
    }
}

type Shared = Arc<Mutex<PipelineState>>;

/// Processed PDFs a started vision job works through.
const VISION_BACKLOG: u64 = 100;

pub struct MockPipeline {
    pub base_url: String,
    pub state: Shared,
}

impl MockPipeline {
    /// Serve the mock on an ephemeral port of the current runtime.
    pub async fn start(pending_pdfs: u64) -> Self {
        let state: Shared = Arc::new(Mutex::new(PipelineState {
            pending_pdfs,
            documents: sample_documents(),
            ..PipelineState::default()
        }));

        let app = Router::new()
            .route(
                "/process/start",
                post(|s: State<Shared>, body: Bytes| start_job(s, Sim::Extraction, body)),
            )
            .route(
                "/vision/start",
                post(|s: State<Shared>, body: Bytes| start_job(s, Sim::Vision, body)),
            )
            .route("/process/stop", post(|s: State<Shared>| stop_job(s, Sim::Extraction)))
            .route("/vision/stop", post(|s: State<Shared>| stop_job(s, Sim::Vision)))
            .route("/process/stats", get(|s: State<Shared>| stats(s, Sim::Extraction)))
            .route("/vision/stats", get(|s: State<Shared>| stats(s, Sim::Vision)))
            .route("/documents", get(documents))
            .route("/export/excel", get(|| async { b"server-xlsx".to_vec() }))
            .route("/system/folders", get(folders))
            .route("/system/info", get(system_info))
            .route("/process/rerun-failed", post(rerun_failed))
            .route(
                "/process/download-failed",
                get(|| async { b"PK\x05\x06failed".to_vec() }),
            )
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        MockPipeline {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn set_running(&self, vision: bool, total: u64) {
        let mut state = self.state.lock().unwrap();
        let job = if vision {
            &mut state.vision
        } else {
            &mut state.extraction
        };
        *job = JobSim {
            running: true,
            processed: 0,
            total,
        };
    }

    pub fn extraction(&self) -> JobSim {
        self.state.lock().unwrap().extraction
    }

    pub fn vision(&self) -> JobSim {
        self.state.lock().unwrap().vision
    }

    pub fn last_start_body(&self) -> Option<Value> {
        self.state.lock().unwrap().last_start_body.clone()
    }

    pub fn start_calls(&self) -> u64 {
        self.state.lock().unwrap().start_calls
    }

    /// Config TOML pointing at this mock with fast polling.
    pub fn config_toml(&self) -> String {
        format!(
            r#"[api]
base_url = "{}"
timeout_secs = 5
document_batch = 2

[polling]
active_interval_ms = 20
ambient_interval_ms = 200

[table]
page_size = 4
"#,
            self.base_url
        )
    }
}

async fn start_job(State(state): State<Shared>, sim: Sim, body: Bytes) -> Response {
    let mut state = state.lock().unwrap();
    state.start_calls += 1;
    state.last_start_body = serde_json::from_slice(&body).ok();

    if state.job(sim).running {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": sim.already_running()})),
        )
            .into_response();
    }
    let pending = state.pending_pdfs;
    let (message, total) = match sim {
        // Vision works off the processed folder and never checks for uploads.
        Sim::Vision => (
            "Started vision processing for registration fee extraction".to_string(),
            VISION_BACKLOG,
        ),
        Sim::Extraction if pending == 0 => {
            return Json(json!({
                "success": false,
                "message": "No PDF files found in newly_uploaded folder"
            }))
            .into_response();
        }
        Sim::Extraction => (format!("Batch processing started for {} files", pending), pending),
    };
    *state.job(sim) = JobSim {
        running: true,
        processed: 0,
        total,
    };
    Json(json!({"success": true, "message": message})).into_response()
}

async fn stop_job(State(state): State<Shared>, sim: Sim) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let job = state.job(sim);
    if !job.running {
        return Json(json!({"success": false, "message": sim.not_running()}));
    }
    job.running = false;
    Json(json!({"success": true, "message": "Stop signal sent"}))
}

async fn stats(State(state): State<Shared>, sim: Sim) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.stats_calls += 1;
    let job = state.job(sim);
    if job.running {
        job.processed += 1;
        if job.processed >= job.total {
            job.running = false;
        }
    }
    let mut body = json!({
        "total": job.total,
        "processed": job.processed,
        "successful": job.processed,
        "failed": 0,
        "is_running": job.running,
        "active_workers": if job.running { 3 } else { 0 },
        "current_file": null,
    });
    if matches!(sim, Sim::Extraction) {
        body["ocr_workers"] = json!(5);
        body["llm_workers"] = json!(5);
    }
    Json(body)
}

#[derive(Deserialize)]
struct Paging {
    #[serde(default)]
    skip: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    100
}

async fn documents(State(state): State<Shared>, Query(paging): Query<Paging>) -> Json<Vec<Value>> {
    let state = state.lock().unwrap();
    Json(
        state
            .documents
            .iter()
            .skip(paging.skip)
            .take(paging.limit)
            .cloned()
            .collect(),
    )
}

async fn folders(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({
        "newly_uploaded": state.pending_pdfs,
        "processed": 4,
        "failed": 1,
        "left_over_reg_fee": 0
    }))
}

async fn system_info() -> Json<Value> {
    Json(json!({
        "cuda_available": false,
        "cuda_device_count": 0,
        "poppler_available": true,
        "tesseract_available": true,
        "ollama_connected": true,
        "yolo_model_loaded": false
    }))
}

async fn rerun_failed() -> Json<Value> {
    Json(json!({"success": true, "message": "Moved 1 failed files to newly_uploaded"}))
}

/// Four deeds, six flat rows: DOC001 expands to three, the rest to one each.
pub fn sample_documents() -> Vec<Value> {
    vec![
        json!({
            "document_id": "DOC001",
            "transaction_date": "2024-02-09",
            "registration_office": "Mysuru North",
            "created_at": "2024-02-10T09:30:00",
            "property_details": {
                "schedule_c_property_address": "12 Temple Road, Mysuru",
                "schedule_c_property_name": "Lakshmi Nivas",
                "sale_consideration": "Rs. 22,67,565/-",
                "registration_fee": 4500.0,
                "stamp_duty_fee": 1250.5
            },
            "buyers": [{"name": "Ravi Kumar"}, {"name": "Meena Ravi"}],
            "sellers": [
                {"name": "Asha", "property_share": "1/3"},
                {"name": "Bhaskar", "property_share": "1/3"},
                {"name": "Chitra", "property_share": "1/3"}
            ]
        }),
        json!({
            "document_id": "DOC002",
            "created_at": "2024-03-15T18:00:00",
            "property_details": {"schedule_c_property_address": "Plot 7, Hebbal"},
            "buyers": [{"name": "Imran"}],
            "sellers": [{"name": "Gowri"}]
        }),
        json!({"document_id": "DOC003"}),
        json!({
            "document_id": "DOC004",
            "created_at": "2024-04-01T08:00:00",
            "buyers": [{"name": "Zoya"}]
        }),
    ]
}
