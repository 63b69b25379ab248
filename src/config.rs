//! TOML configuration parsing and validation.
//!
//! ```toml
//! [api]
//! base_url = "http://localhost:8000/api"
//!
//! [polling]
//! active_interval_ms = 2000
//! ambient_interval_ms = 30000
//!
//! [table]
//! page_size = 20
//! grouping = "per_page"
//!
//! [jobs.extraction]
//! ocr_workers = 5
//! llm_workers = 5
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{Context, Result};
use deed_desk_core::grouping::GroupingMode;
use deed_desk_core::view::TableOptions;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::supervisor::ExtractionSettings;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub table: TableConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Page size used when pulling the full document list.
    #[serde(default = "default_document_batch")]
    pub document_batch: usize,
}

fn default_timeout_secs() -> u64 {
    30
}
fn default_document_batch() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_active_interval_ms")]
    pub active_interval_ms: u64,
    #[serde(default = "default_ambient_interval_ms")]
    pub ambient_interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            active_interval_ms: default_active_interval_ms(),
            ambient_interval_ms: default_ambient_interval_ms(),
        }
    }
}

impl PollingConfig {
    pub fn active_interval(&self) -> Duration {
        Duration::from_millis(self.active_interval_ms)
    }

    pub fn ambient_interval(&self) -> Duration {
        Duration::from_millis(self.ambient_interval_ms)
    }
}

fn default_active_interval_ms() -> u64 {
    2000
}
fn default_ambient_interval_ms() -> u64 {
    30_000
}

#[derive(Debug, Deserialize, Clone)]
pub struct TableConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub grouping: GroupingMode,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            grouping: GroupingMode::default(),
        }
    }
}

impl TableConfig {
    pub fn options(&self) -> TableOptions {
        TableOptions {
            page_size: self.page_size,
            grouping: self.grouping,
        }
    }
}

fn default_page_size() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct JobsConfig {
    /// Defaults for `start extraction`; CLI flags and bridge requests override them.
    #[serde(default)]
    pub extraction: ExtractionSettings,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

impl Config {
    /// A config pointing at `base_url` with every other setting at its default.
    pub fn minimal(base_url: impl Into<String>) -> Self {
        Self {
            api: ApiConfig {
                base_url: base_url.into(),
                timeout_secs: default_timeout_secs(),
                document_batch: default_document_batch(),
            },
            polling: PollingConfig::default(),
            table: TableConfig::default(),
            jobs: JobsConfig::default(),
            server: ServerConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        let url = self.api.base_url.trim();
        if url.is_empty() {
            anyhow::bail!("api.base_url must not be empty");
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            anyhow::bail!("api.base_url must start with http:// or https://");
        }
        if self.api.timeout_secs == 0 {
            anyhow::bail!("api.timeout_secs must be > 0");
        }
        if self.api.document_batch == 0 {
            anyhow::bail!("api.document_batch must be > 0");
        }

        if self.polling.active_interval_ms == 0 {
            anyhow::bail!("polling.active_interval_ms must be > 0");
        }
        if self.polling.ambient_interval_ms < self.polling.active_interval_ms {
            anyhow::bail!("polling.ambient_interval_ms must be >= polling.active_interval_ms");
        }

        if self.table.page_size == 0 {
            anyhow::bail!("table.page_size must be > 0");
        }

        self.jobs
            .extraction
            .validate()
            .map_err(|e| anyhow::anyhow!("jobs.extraction: {}", e))?;

        Ok(())
    }
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config = parse_config("[api]\nbase_url = \"http://localhost:8000/api\"\n").unwrap();
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.polling.active_interval(), Duration::from_secs(2));
        assert_eq!(config.polling.ambient_interval(), Duration::from_secs(30));
        assert_eq!(config.table.page_size, 20);
        assert_eq!(config.table.grouping, GroupingMode::PerPage);
        assert_eq!(config.jobs.extraction.ocr_workers, 5);
        assert_eq!(config.server.bind, "127.0.0.1:7341");
    }

    #[test]
    fn full_file_parses() {
        let config = parse_config(
            r#"
[api]
base_url = "https://pipeline.local/api"
timeout_secs = 5
document_batch = 50

[polling]
active_interval_ms = 500
ambient_interval_ms = 10000

[table]
page_size = 15
grouping = "global"

[jobs.extraction]
ocr_workers = 8
llm_workers = 3
stage2_queue_size = 4
enable_ocr_multiprocessing = false
ocr_page_workers = 2

[server]
bind = "0.0.0.0:9000"
"#,
        )
        .unwrap();
        assert_eq!(config.table.grouping, GroupingMode::Global);
        assert_eq!(config.jobs.extraction.llm_workers, 3);
        assert_eq!(config.jobs.extraction.stage2_queue_size, Some(4));
        assert_eq!(config.table.options().page_size, 15);
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "[api]\nbase_url = \"\"\n",
            "[api]\nbase_url = \"ftp://x\"\n",
            "[api]\nbase_url = \"http://x\"\ntimeout_secs = 0\n",
            "[api]\nbase_url = \"http://x\"\n[table]\npage_size = 0\n",
            "[api]\nbase_url = \"http://x\"\n[polling]\nactive_interval_ms = 5000\nambient_interval_ms = 100\n",
            "[api]\nbase_url = \"http://x\"\n[jobs.extraction]\nocr_workers = 21\n",
            "[api]\nbase_url = \"http://x\"\n[table]\ngrouping = \"sideways\"\n",
        ];
        for case in cases {
            assert!(parse_config(case).is_err(), "accepted: {}", case);
        }
    }

    #[test]
    fn shipped_example_parses() {
        let config = parse_config(include_str!("../config/deeds.example.toml")).unwrap();
        assert_eq!(config.jobs.extraction, ExtractionSettings::default());
        assert_eq!(config.table.grouping, GroupingMode::PerPage);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = load_config(Path::new("/nonexistent/deeds.toml")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/deeds.toml"));
    }
}
