//! HTTP bridge for the surrounding UI shell.
//!
//! The shell renders; this server owns the job supervisor and the table
//! pipeline and hands out ready-to-draw state.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/jobs` | Current [`Board`] |
//! | `POST` | `/jobs/{kind}/start` | Start a job; optional JSON [`ExtractionOverrides`] |
//! | `POST` | `/jobs/{kind}/stop` | Stop a job |
//! | `GET`  | `/table?search=&page=` | [`DisplayModel`] for one page; omitted parameters keep the last query |
//! | `GET`  | `/export.xlsx?from=&to=` | Export workbook |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "rejected", "message": "Batch processing already running" } }
//! ```
//!
//! Error codes: `bad_request` (400), `invalid_setting` (400), `rejected` (409),
//! `transient_fetch` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser-hosted shell
//! can call the bridge directly.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use deed_desk_core::export::DateRange;
use deed_desk_core::models::JobKind;
use deed_desk_core::search::TableQuery;
use deed_desk_core::view::{compute_display_model, DisplayModel};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::client::{fetch_all_documents, ActionReply, HttpJobClient, JobClient};
use crate::config::Config;
use crate::error::DashboardError;
use crate::scheduler::{spawn_supervisor, SupervisorHandle};
use crate::supervisor::{Board, ExtractionOverrides, JobSupervisor, StartRequest};
use crate::workbook::{build_export_workbook, MIME_XLSX};

#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    client: Arc<dyn JobClient>,
    supervisor: Arc<SupervisorHandle>,
    /// The shell's current search term and page.
    query: Arc<Mutex<TableQuery>>,
}

/// Starts the bridge server on `[server].bind` against the configured pipeline.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let client: Arc<dyn JobClient> = Arc::new(HttpJobClient::new(&config.api)?);
    let app = router(config, client);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!(bind = %config.server.bind, api = %config.api.base_url, "bridge listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Build the bridge router around `client`.
///
/// Spawns the supervisor loop, so it must be called inside a Tokio runtime.
/// The loop lives as long as the router.
pub fn router(config: &Config, client: Arc<dyn JobClient>) -> Router {
    let state = app_state(config, client);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/jobs", get(handle_jobs))
        .route("/jobs/{kind}/start", post(handle_start))
        .route("/jobs/{kind}/stop", post(handle_stop))
        .route("/table", get(handle_table))
        .route("/export.xlsx", get(handle_export))
        .layer(cors)
        .with_state(state)
}

fn app_state(config: &Config, client: Arc<dyn JobClient>) -> AppState {
    let supervisor = spawn_supervisor(JobSupervisor::new(client.clone()), config.polling.clone());
    AppState {
        config: Arc::new(config.clone()),
        client,
        supervisor: Arc::new(supervisor),
        query: Arc::new(Mutex::new(TableQuery::default())),
    }
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal",
        message: message.into(),
    }
}

impl From<DashboardError> for AppError {
    fn from(err: DashboardError) -> Self {
        let (status, code) = match &err {
            DashboardError::RejectedAction(_) => (StatusCode::CONFLICT, "rejected"),
            DashboardError::InvalidSetting { .. } => (StatusCode::BAD_REQUEST, "invalid_setting"),
            DashboardError::TransientFetch(_) => (StatusCode::BAD_GATEWAY, "transient_fetch"),
        };
        AppError {
            status,
            code,
            message: err.to_string(),
        }
    }
}

fn parse_kind(raw: &str) -> Result<JobKind, AppError> {
    raw.parse::<JobKind>().map_err(|e| bad_request(e.to_string()))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ Jobs ============

async fn handle_jobs(State(state): State<AppState>) -> Json<Board> {
    Json(state.supervisor.board())
}

#[derive(Serialize)]
struct ActionResponse {
    message: String,
}

impl From<ActionReply> for ActionResponse {
    fn from(reply: ActionReply) -> Self {
        Self {
            message: reply.message,
        }
    }
}

/// Handler for `POST /jobs/{kind}/start`.
///
/// An empty body starts extraction with the configured settings; a JSON
/// body overrides individual fields. Vision ignores the body.
async fn handle_start(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<Json<ActionResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    let request = match kind {
        JobKind::Vision => StartRequest::Vision,
        JobKind::Extraction => {
            let overrides: ExtractionOverrides = if body.iter().all(u8::is_ascii_whitespace) {
                ExtractionOverrides::default()
            } else {
                serde_json::from_slice(&body)
                    .map_err(|e| bad_request(format!("invalid start body: {}", e)))?
            };
            StartRequest::Extraction(overrides.apply(&state.config.jobs.extraction))
        }
    };

    let reply = state.supervisor.start(request).await?;
    Ok(Json(reply.into()))
}

async fn handle_stop(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<Json<ActionResponse>, AppError> {
    let kind = parse_kind(&kind)?;
    let reply = state.supervisor.stop(kind).await?;
    Ok(Json(reply.into()))
}

// ============ GET /table ============

#[derive(Deserialize)]
struct TableParams {
    search: Option<String>,
    page: Option<usize>,
}

/// Handler for `GET /table`.
///
/// A new search term sends the table back to page 1 unless `page` is also
/// given.
async fn handle_table(
    State(state): State<AppState>,
    Query(params): Query<TableParams>,
) -> Result<Json<DisplayModel>, AppError> {
    let query = {
        let mut query = state
            .query
            .lock()
            .map_err(|_| internal("table query lock poisoned"))?;
        if let Some(term) = params.search {
            query.set_search_term(term);
        }
        if let Some(page) = params.page {
            query.set_page(page);
        }
        query.clone()
    };

    let documents = fetch_all_documents(state.client.as_ref(), state.config.api.document_batch)
        .await
        .map_err(|e| {
            warn!(error = %e, "document listing failed");
            DashboardError::TransientFetch(e.message)
        })?;

    let model = compute_display_model(&documents, &query, &state.config.table.options());
    Ok(Json(model))
}

// ============ GET /export.xlsx ============

#[derive(Deserialize)]
struct ExportParams {
    from: Option<String>,
    to: Option<String>,
}

async fn handle_export(
    State(state): State<AppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AppError> {
    let range = DateRange::parse(params.from.as_deref(), params.to.as_deref())
        .map_err(|e| bad_request(format!("{:#}", e)))?;

    let documents = fetch_all_documents(state.client.as_ref(), state.config.api.document_batch)
        .await
        .map_err(|e| DashboardError::TransientFetch(e.message))?;

    let bytes = build_export_workbook(&documents, &range).map_err(|e| internal(e.to_string()))?;
    info!(documents = documents.len(), bytes = bytes.len(), "export built");

    Ok((
        [
            (header::CONTENT_TYPE, MIME_XLSX),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sale_deeds_export.xlsx\"",
            ),
        ],
        bytes,
    )
        .into_response())
}
