use rmcp::{
    ErrorData,
    model::{CallToolResult, Content},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};

use crate::SpGraphMcp;

/// Payload listing the MCP commands this server offers.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct HelpCommands {
    pub commands: Vec<String>,
}

impl Default for HelpCommands {
    fn default() -> Self {
        Self {
            commands: vec![
                "help - List MCP commands offered by this server.".to_string(),
                "health - Returns 'ok'.".to_string(),
                "metadata_retrieve - File metadata for every item in the SharePoint library, one JSON object per line."
                    .to_string(),
                "entity_retrieve - Relationships around the graph chunks most similar to `query`, one `A - TYPE -> B` per line."
                    .to_string(),
            ],
        }
    }
}

#[tool_router(router = tool_router_context, vis = "pub")]
impl SpGraphMcp {
    #[tool(description = "List the MCP commands offered by this server.")]
    async fn help(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::json(HelpCommands::default())?]))
    }
}
