//! Output types for index tools
//!
//! Tool methods return these serialized as JSON strings; tests deserialize
//! them back for type-safe assertions.

use serde::{Deserialize, Serialize};

use crate::index::coordinator::IndexStatus;
use crate::index::error::IndexError;
use crate::index::pipeline::UpdateReport;
use crate::index::types::{Crate, CrateVersion};

const SERIALIZE_FAILED: &str = r#"{"status":"error","error":"Failed to serialize response"}"#;

/// One published version of a crate
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VersionOutput {
    pub version: String,
    pub yanked: bool,
    pub features: Vec<String>,
}

impl From<&CrateVersion> for VersionOutput {
    fn from(version: &CrateVersion) -> Self {
        Self {
            version: version.version().to_string(),
            yanked: version.is_yanked(),
            features: version.features().to_vec(),
        }
    }
}

/// Output from get_crate
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "status")]
pub enum GetCrateOutput {
    #[serde(rename = "found")]
    Found {
        #[serde(rename = "crate")]
        crate_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        latest_version: Option<String>,
        versions: Vec<VersionOutput>,
    },
    #[serde(rename = "not_found")]
    NotFound {
        #[serde(rename = "crate")]
        crate_name: String,
        message: String,
    },
    #[serde(rename = "error")]
    Error { error: String, retryable: bool },
}

impl GetCrateOutput {
    pub fn found(krate: &Crate, include_yanked: bool) -> Self {
        GetCrateOutput::Found {
            crate_name: krate.name().to_string(),
            latest_version: krate.latest_version().map(|v| v.version().to_string()),
            versions: krate
                .versions()
                .iter()
                .filter(|v| include_yanked || !v.is_yanked())
                .map(VersionOutput::from)
                .collect(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| SERIALIZE_FAILED.to_string())
    }

    pub fn is_found(&self) -> bool {
        matches!(self, GetCrateOutput::Found { .. })
    }
}

/// Output from list_crate_names
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "status")]
pub enum ListCrateNamesOutput {
    #[serde(rename = "success")]
    Success {
        names: Vec<String>,
        total: usize,
        offset: usize,
        has_more: bool,
    },
    #[serde(rename = "error")]
    Error { error: String, retryable: bool },
}

impl ListCrateNamesOutput {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| SERIALIZE_FAILED.to_string())
    }
}

/// Output from index_status
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct IndexStatusOutput {
    #[serde(flatten)]
    pub status: IndexStatus,
    /// Human-readable size of the store file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_size: Option<String>,
}

impl IndexStatusOutput {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| SERIALIZE_FAILED.to_string())
    }
}

/// Summary of a finished update
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct UpdateSummary {
    pub previous: String,
    pub head: String,
    pub full_reindex: bool,
    pub files: usize,
    pub crates_written: usize,
    pub files_failed: usize,
    pub elapsed_ms: u64,
}

impl From<&UpdateReport> for UpdateSummary {
    fn from(report: &UpdateReport) -> Self {
        Self {
            previous: report.previous.to_string(),
            head: report.head.to_string(),
            full_reindex: report.full_reindex,
            files: report.files,
            crates_written: report.crates_written,
            files_failed: report.files_failed,
            elapsed_ms: report.elapsed.as_millis() as u64,
        }
    }
}

/// Output from refresh_index
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "status")]
pub enum RefreshIndexOutput {
    /// Update started in the background
    #[serde(rename = "scheduled")]
    Scheduled { message: String },
    #[serde(rename = "completed")]
    Completed { report: UpdateSummary },
    /// Nothing to do or nothing could be started
    #[serde(rename = "not_scheduled")]
    NotScheduled { message: String },
    #[serde(rename = "error")]
    Error { error: String },
}

impl RefreshIndexOutput {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| SERIALIZE_FAILED.to_string())
    }
}

/// Render a query error, flagging the ones worth retrying
pub fn error_fields(error: &IndexError) -> (String, bool) {
    (error.to_string(), error.is_transient())
}
