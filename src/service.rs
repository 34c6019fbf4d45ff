use rmcp::{
    ServerHandler,
    handler::server::{router::tool::ToolRouter, tool::Parameters},
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use crate::index::CratesLocalIndex;
use crate::index::tools::{GetCrateParams, IndexTools, ListCrateNamesParams, RefreshIndexParams};

#[derive(Clone)]
pub struct CratesIndexService {
    index_tools: IndexTools,
    tool_router: ToolRouter<Self>,
}

impl CratesIndexService {
    pub fn new(index: CratesLocalIndex) -> Self {
        Self {
            index_tools: IndexTools::new(index),
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl CratesIndexService {
    #[tool(
        description = "Look up a crate in the local Cargo registry index. Returns every published version with its yanked flag and feature names, plus the latest non-yanked version. Works offline from the registry clone Cargo maintains. If the index is being updated the result is an error marked retryable."
    )]
    pub async fn get_crate(&self, params: Parameters<GetCrateParams>) -> String {
        self.index_tools.get_crate(params.0)
    }

    #[tool(
        description = "List crate names known to the local registry index, sorted alphabetically. Use prefix to narrow the list and limit/offset to paginate; the registry holds well over a hundred thousand crates."
    )]
    pub async fn list_crate_names(&self, params: Parameters<ListCrateNamesParams>) -> String {
        self.index_tools.list_crate_names(params.0)
    }

    #[tool(
        description = "Report the state of the local registry index: whether it is idle or updating, whether the store is available, the registry commit it reflects, when it was last updated and how many crates it holds."
    )]
    pub async fn index_status(&self) -> String {
        self.index_tools.index_status()
    }

    #[tool(
        description = "Bring the index up to date with the registry clone after a `cargo update` or `cargo fetch`. Updates are incremental: only files changed since the indexed commit are re-read. Set wait to true to block until the update finishes and get its report."
    )]
    pub async fn refresh_index(&self, params: Parameters<RefreshIndexParams>) -> String {
        self.index_tools.refresh_index(params.0).await
    }
}

#[tool_handler(router = self.tool_router)]
impl ServerHandler for CratesIndexService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation::from_build_env(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(
                "MCP server exposing the local Cargo registry index. Use get_crate to read a crate's versions, yanked flags and features without network access. Use list_crate_names with a prefix to discover crates. Use index_status to check whether the index is ready, and refresh_index after the registry clone changes. Errors marked retryable mean an update is in progress.".to_string(),
            ),
            ..Default::default()
        }
    }
}
