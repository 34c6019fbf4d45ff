use rmcp::schemars;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::index::coordinator::CratesLocalIndex;
use crate::index::outputs::{
    GetCrateOutput, IndexStatusOutput, ListCrateNamesOutput, RefreshIndexOutput, UpdateSummary,
    error_fields,
};
use crate::index::utils::format_bytes;

const DEFAULT_LIST_LIMIT: usize = 100;
const MAX_LIST_LIMIT: usize = 10_000;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetCrateParams {
    #[schemars(description = "The name of the crate (case-insensitive)")]
    pub crate_name: String,
    #[schemars(description = "Include yanked versions in the result (default: true)")]
    pub include_yanked: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListCrateNamesParams {
    #[schemars(description = "Only return names starting with this prefix")]
    pub prefix: Option<String>,
    #[schemars(description = "Maximum number of names to return (default: 100)")]
    pub limit: Option<usize>,
    #[schemars(description = "Starting position for pagination (default: 0)")]
    pub offset: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RefreshIndexParams {
    #[schemars(description = "Wait for the update to finish before returning (default: false)")]
    pub wait: Option<bool>,
}

#[derive(Clone)]
pub struct IndexTools {
    index: CratesLocalIndex,
}

impl IndexTools {
    pub fn new(index: CratesLocalIndex) -> Self {
        Self { index }
    }

    pub fn get_crate(&self, params: GetCrateParams) -> String {
        let include_yanked = params.include_yanked.unwrap_or(true);
        let output = match self.index.get_crate(&params.crate_name) {
            Ok(Some(krate)) => GetCrateOutput::found(&krate, include_yanked),
            Ok(None) => GetCrateOutput::NotFound {
                message: format!(
                    "Crate '{}' is not in the local registry index",
                    params.crate_name
                ),
                crate_name: params.crate_name,
            },
            Err(e) => {
                let (error, retryable) = error_fields(&e);
                GetCrateOutput::Error { error, retryable }
            }
        };
        output.to_json()
    }

    pub fn list_crate_names(&self, params: ListCrateNamesParams) -> String {
        let names = match self.index.get_all_crate_names() {
            Ok(names) => names,
            Err(e) => {
                let (error, retryable) = error_fields(&e);
                return ListCrateNamesOutput::Error { error, retryable }.to_json();
            }
        };

        let prefix = params.prefix.map(|p| p.to_ascii_lowercase());
        let matching: Vec<String> = match &prefix {
            Some(prefix) => names
                .into_iter()
                .filter(|name| name.starts_with(prefix.as_str()))
                .collect(),
            None => names,
        };

        let total = matching.len();
        let offset = params.offset.unwrap_or(0);
        let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT);
        let page: Vec<String> = matching.into_iter().skip(offset).take(limit).collect();

        ListCrateNamesOutput::Success {
            has_more: offset + page.len() < total,
            names: page,
            total,
            offset,
        }
        .to_json()
    }

    pub fn index_status(&self) -> String {
        let status = self.index.status();
        IndexStatusOutput {
            store_size: status.store_bytes.map(format_bytes),
            status,
        }
        .to_json()
    }

    pub async fn refresh_index(&self, params: RefreshIndexParams) -> String {
        let Some(handle) = self.index.update_if_needed() else {
            let message = if self.index.is_updating() {
                "An update is already running"
            } else if !self.index.status().available {
                "The crates index store is unavailable; reopening it in the background"
            } else {
                "The crates index is up to date or the registry head could not be resolved"
            };
            return RefreshIndexOutput::NotScheduled {
                message: message.to_string(),
            }
            .to_json();
        };

        if !params.wait.unwrap_or(false) {
            return RefreshIndexOutput::Scheduled {
                message: "Update started in the background; poll index_status for progress"
                    .to_string(),
            }
            .to_json();
        }

        let output = match handle.await {
            Ok(Ok(report)) => RefreshIndexOutput::Completed {
                report: UpdateSummary::from(&report),
            },
            Ok(Err(e)) => RefreshIndexOutput::Error {
                error: format!("{e:#}"),
            },
            Err(e) => RefreshIndexOutput::Error {
                error: format!("Update task failed: {e}"),
            },
        };
        output.to_json()
    }
}
