//! Remote Job Client: the pipeline API as seen from the dashboard.
//!
//! [`JobClient`] is the seam the supervisor and table pipeline consume;
//! [`HttpJobClient`] implements it over `reqwest`. Tests substitute their own
//! implementation or point the HTTP client at an in-process mock.
//!
//! # Routes
//!
//! | Method | Path | Used by |
//! |--------|------|---------|
//! | `POST` | `/process/start`, `/vision/start` | [`JobClient::start_job`] |
//! | `POST` | `/process/stop`, `/vision/stop` | [`JobClient::stop_job`] |
//! | `GET`  | `/process/stats`, `/vision/stats` | [`JobClient::get_stats`] |
//! | `GET`  | `/documents?skip=&limit=` | [`JobClient::list_documents`] |
//! | `GET`  | `/export/excel` | [`JobClient::export_excel`] |
//! | `GET`  | `/system/folders` | [`JobClient::folder_stats`] |
//! | `GET`  | `/system/info` | [`JobClient::system_info`] |
//! | `POST` | `/process/rerun-failed` | [`JobClient::rerun_failed`] |
//! | `GET`  | `/process/download-failed` | [`JobClient::download_failed`] |

use async_trait::async_trait;
use deed_desk_core::models::{Document, FolderStats, JobKind, JobStats, SystemInfo};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::supervisor::StartRequest;

/// Reply to a start/stop style action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReply {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

fn default_success() -> bool {
    true
}

impl ActionReply {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn refused(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Operations the dashboard needs from the remote pipeline.
#[async_trait]
pub trait JobClient: Send + Sync {
    async fn start_job(&self, kind: JobKind, request: &StartRequest) -> Result<ActionReply, ApiError>;

    async fn stop_job(&self, kind: JobKind) -> Result<ActionReply, ApiError>;

    async fn get_stats(&self, kind: JobKind) -> Result<JobStats, ApiError>;

    async fn list_documents(&self, offset: usize, limit: usize) -> Result<Vec<Document>, ApiError>;

    /// Server-generated spreadsheet, unrelated to the locally built workbook.
    async fn export_excel(&self) -> Result<Vec<u8>, ApiError>;

    async fn folder_stats(&self) -> Result<FolderStats, ApiError>;

    async fn system_info(&self) -> Result<SystemInfo, ApiError>;

    /// Move failed PDFs back into the upload folder.
    async fn rerun_failed(&self) -> Result<ActionReply, ApiError>;

    /// ZIP archive of the failed PDFs.
    async fn download_failed(&self) -> Result<Vec<u8>, ApiError>;
}

/// Pull every document by paging through [`JobClient::list_documents`].
///
/// Stops at the first page shorter than `batch`.
pub async fn fetch_all_documents<C: JobClient + ?Sized>(
    client: &C,
    batch: usize,
) -> Result<Vec<Document>, ApiError> {
    let batch = batch.max(1);
    let mut documents = Vec::new();
    loop {
        let page = client.list_documents(documents.len(), batch).await?;
        let short = page.len() < batch;
        documents.extend(page);
        if short {
            break;
        }
    }
    debug!(count = documents.len(), "fetched documents");
    Ok(documents)
}

/// [`JobClient`] over HTTP.
pub struct HttpJobClient {
    base_url: String,
    http: reqwest::Client,
}

impl HttpJobClient {
    pub fn new(config: &ApiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = check_status(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }

    async fn send_bytes(&self, request: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let response = check_status(request.send().await?).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Turn a non-2xx response into an [`ApiError`] carrying the server's message.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ApiError::http(status.as_u16(), error_detail(&body, status)))
}

/// The `detail` string of an error body, falling back to the raw text.
fn error_detail(body: &str, status: reqwest::StatusCode) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string));
    match detail {
        Some(d) => d,
        None if !body.trim().is_empty() => body.trim().to_string(),
        None => format!("pipeline API returned {}", status),
    }
}

#[async_trait]
impl JobClient for HttpJobClient {
    async fn start_job(&self, kind: JobKind, request: &StartRequest) -> Result<ActionReply, ApiError> {
        let url = self.url(&format!("{}/start", kind.route_prefix()));
        let builder = match request {
            StartRequest::Extraction(settings) => self.http.post(url).json(settings),
            StartRequest::Vision => self.http.post(url),
        };
        self.send_json(builder).await
    }

    async fn stop_job(&self, kind: JobKind) -> Result<ActionReply, ApiError> {
        let url = self.url(&format!("{}/stop", kind.route_prefix()));
        self.send_json(self.http.post(url)).await
    }

    async fn get_stats(&self, kind: JobKind) -> Result<JobStats, ApiError> {
        let url = self.url(&format!("{}/stats", kind.route_prefix()));
        self.send_json(self.http.get(url)).await
    }

    async fn list_documents(&self, offset: usize, limit: usize) -> Result<Vec<Document>, ApiError> {
        let request = self
            .http
            .get(self.url("documents"))
            .query(&[("skip", offset), ("limit", limit)]);
        self.send_json(request).await
    }

    async fn export_excel(&self) -> Result<Vec<u8>, ApiError> {
        self.send_bytes(self.http.get(self.url("export/excel"))).await
    }

    async fn folder_stats(&self) -> Result<FolderStats, ApiError> {
        self.send_json(self.http.get(self.url("system/folders"))).await
    }

    async fn system_info(&self) -> Result<SystemInfo, ApiError> {
        self.send_json(self.http.get(self.url("system/info"))).await
    }

    async fn rerun_failed(&self) -> Result<ActionReply, ApiError> {
        self.send_json(self.http.post(self.url("process/rerun-failed")))
            .await
    }

    async fn download_failed(&self) -> Result<Vec<u8>, ApiError> {
        self.send_bytes(self.http.get(self.url("process/download-failed")))
            .await
    }
}
