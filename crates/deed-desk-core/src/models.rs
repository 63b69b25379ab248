//! Core data models shared by the table pipeline and the job supervisor.
//!
//! Documents are snapshots produced by the remote extraction pipeline. They
//! are only ever read here; nothing in this crate mutates a fetched record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// A processed sale deed: one property, N buyers, M sellers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Unique key assigned by the pipeline (usually the PDF stem).
    pub document_id: String,
    #[serde(default)]
    pub transaction_date: Option<String>,
    #[serde(default)]
    pub registration_office: Option<String>,
    /// Creation timestamp as emitted by the pipeline (no zone).
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub updated_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub property_details: Option<PropertyDetails>,
    #[serde(default)]
    pub buyers: Vec<Person>,
    #[serde(default)]
    pub sellers: Vec<Person>,
}

impl Document {
    /// Creates an empty document with only its identifier set.
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            transaction_date: None,
            registration_office: None,
            created_at: None,
            updated_at: None,
            property_details: None,
            buyers: Vec::new(),
            sellers: Vec::new(),
        }
    }

    /// Schedule C address of the property, if one was extracted.
    pub fn property_address(&self) -> Option<&str> {
        self.property_details
            .as_ref()
            .and_then(|p| p.schedule_c_property_address.as_deref())
    }

    /// Number of flat rows this document expands to: `max(buyers, sellers, 1)`.
    pub fn slot_count(&self) -> usize {
        self.buyers.len().max(self.sellers.len()).max(1)
    }
}

/// Property schedule and transaction amounts of a deed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDetails {
    #[serde(default, deserialize_with = "de_amount")]
    pub schedule_b_area: Option<f64>,
    #[serde(default)]
    pub schedule_c_property_name: Option<String>,
    #[serde(default)]
    pub schedule_c_property_address: Option<String>,
    #[serde(default, deserialize_with = "de_amount")]
    pub schedule_c_property_area: Option<f64>,
    #[serde(default)]
    pub paid_in_cash_mode: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "de_amount")]
    pub sale_consideration: Option<f64>,
    #[serde(default, deserialize_with = "de_amount")]
    pub stamp_duty_fee: Option<f64>,
    #[serde(default, deserialize_with = "de_amount")]
    pub registration_fee: Option<f64>,
    #[serde(default, deserialize_with = "de_amount")]
    pub guidance_value: Option<f64>,
}

/// A buyer or seller of a deed.
///
/// Buyers and sellers share one shape; `property_share` is only populated
/// for sellers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub aadhaar_number: Option<String>,
    #[serde(default)]
    pub pan_card_number: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub pincode: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub secondary_phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub property_share: Option<String>,
}

impl Person {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Which side of the transaction a person is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersonRole {
    Buyer,
    Seller,
}

impl PersonRole {
    /// Single-letter code used in the `USER_TYPE` export column.
    pub fn code(&self) -> &'static str {
        match self {
            PersonRole::Buyer => "B",
            PersonRole::Seller => "S",
        }
    }
}

/// The two independent long-running batch jobs of the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Text/OCR + LLM extraction over uploaded PDFs.
    Extraction,
    /// Vision-model extraction of registration fee tables.
    Vision,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::Extraction, JobKind::Vision];

    /// Route prefix of this job kind on the pipeline API.
    pub fn route_prefix(&self) -> &'static str {
        match self {
            JobKind::Extraction => "process",
            JobKind::Vision => "vision",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Extraction => "extraction",
            JobKind::Vision => "vision",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "extraction" | "process" | "ocr" => Ok(JobKind::Extraction),
            "vision" => Ok(JobKind::Vision),
            other => anyhow::bail!("Unknown job kind: '{}'. Use extraction or vision.", other),
        }
    }
}

/// Remote snapshot of one job kind, as reported by the stats endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobStats {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub successful: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub is_running: bool,
    #[serde(default)]
    pub active_workers: u32,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub ocr_workers: Option<u32>,
    #[serde(default)]
    pub llm_workers: Option<u32>,
}

/// File counts in the pipeline's working folders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FolderStats {
    #[serde(default)]
    pub newly_uploaded: u64,
    #[serde(default)]
    pub processed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub left_over_reg_fee: u64,
}

/// Health of the pipeline host and its model backends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    #[serde(default)]
    pub cuda_available: bool,
    #[serde(default)]
    pub cuda_device_count: u32,
    #[serde(default)]
    pub poppler_available: bool,
    #[serde(default)]
    pub tesseract_available: bool,
    #[serde(default)]
    pub ollama_connected: bool,
    #[serde(default)]
    pub yolo_model_loaded: bool,
}

/// Parse an amount that may be a number or a currency string like `"Rs. 22,67,565/-"`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut s = raw.trim();
    if let Some(rest) = s.strip_prefix("Rs").or_else(|| s.strip_prefix("rs")) {
        s = rest.trim_start_matches('.').trim_start();
    }
    let s = s.trim_end_matches("/-").trim_end_matches('/');
    let cleaned: String = s
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn de_amount<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => parse_amount(&s),
        _ => None,
    })
}
