//! In-memory [`JobClient`] for unit tests.

use async_trait::async_trait;
use deed_desk_core::models::{Document, FolderStats, JobKind, JobStats, SystemInfo};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::client::{ActionReply, JobClient};
use crate::error::ApiError;
use crate::supervisor::StartRequest;

pub fn running_stats(processed: u64, total: u64) -> JobStats {
    JobStats {
        total,
        processed,
        successful: processed,
        is_running: true,
        active_workers: 1,
        ..JobStats::default()
    }
}

pub struct MockClient {
    stats: Mutex<HashMap<JobKind, Result<JobStats, ApiError>>>,
    start_reply: Mutex<Result<ActionReply, ApiError>>,
    stop_reply: Mutex<Result<ActionReply, ApiError>>,
    folders: Mutex<Result<FolderStats, ApiError>>,
    documents: Mutex<Vec<Document>>,
    stats_calls: Mutex<HashMap<JobKind, usize>>,
    start_requests: Mutex<Vec<StartRequest>>,
    folder_calls: Mutex<usize>,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            stats: Mutex::new(HashMap::new()),
            start_reply: Mutex::new(Ok(ActionReply::ok("Batch processing started"))),
            stop_reply: Mutex::new(Ok(ActionReply::ok("Stop signal sent"))),
            folders: Mutex::new(Ok(FolderStats::default())),
            documents: Mutex::new(Vec::new()),
            stats_calls: Mutex::new(HashMap::new()),
            start_requests: Mutex::new(Vec::new()),
            folder_calls: Mutex::new(0),
        }
    }

    pub fn set_stats(&self, kind: JobKind, stats: Result<JobStats, ApiError>) {
        self.stats.lock().unwrap().insert(kind, stats);
    }

    pub fn set_start_reply(&self, reply: Result<ActionReply, ApiError>) {
        *self.start_reply.lock().unwrap() = reply;
    }

    pub fn set_stop_reply(&self, reply: Result<ActionReply, ApiError>) {
        *self.stop_reply.lock().unwrap() = reply;
    }

    pub fn set_folders(&self, folders: Result<FolderStats, ApiError>) {
        *self.folders.lock().unwrap() = folders;
    }

    pub fn set_documents(&self, documents: Vec<Document>) {
        *self.documents.lock().unwrap() = documents;
    }

    pub fn stats_calls(&self, kind: JobKind) -> usize {
        self.stats_calls
            .lock()
            .unwrap()
            .get(&kind)
            .copied()
            .unwrap_or(0)
    }

    pub fn start_calls(&self) -> usize {
        self.start_requests.lock().unwrap().len()
    }

    pub fn last_start(&self) -> Option<StartRequest> {
        self.start_requests.lock().unwrap().last().cloned()
    }

    pub fn folder_calls(&self) -> usize {
        *self.folder_calls.lock().unwrap()
    }
}

#[async_trait]
impl JobClient for MockClient {
    async fn start_job(&self, _kind: JobKind, request: &StartRequest) -> Result<ActionReply, ApiError> {
        self.start_requests.lock().unwrap().push(request.clone());
        self.start_reply.lock().unwrap().clone()
    }

    async fn stop_job(&self, _kind: JobKind) -> Result<ActionReply, ApiError> {
        self.stop_reply.lock().unwrap().clone()
    }

    async fn get_stats(&self, kind: JobKind) -> Result<JobStats, ApiError> {
        *self.stats_calls.lock().unwrap().entry(kind).or_insert(0) += 1;
        self.stats
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Ok(JobStats::default()))
    }

    async fn list_documents(&self, offset: usize, limit: usize) -> Result<Vec<Document>, ApiError> {
        let docs = self.documents.lock().unwrap();
        Ok(docs.iter().skip(offset).take(limit).cloned().collect())
    }

    async fn export_excel(&self) -> Result<Vec<u8>, ApiError> {
        Ok(b"PK".to_vec())
    }

    async fn folder_stats(&self) -> Result<FolderStats, ApiError> {
        *self.folder_calls.lock().unwrap() += 1;
        self.folders.lock().unwrap().clone()
    }

    async fn system_info(&self) -> Result<SystemInfo, ApiError> {
        Ok(SystemInfo::default())
    }

    async fn rerun_failed(&self) -> Result<ActionReply, ApiError> {
        Ok(ActionReply::ok("Moved 0 failed files"))
    }

    async fn download_failed(&self) -> Result<Vec<u8>, ApiError> {
        Ok(Vec::new())
    }
}
