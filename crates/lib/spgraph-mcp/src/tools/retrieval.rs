use rmcp::{
    ErrorData,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ErrorCode},
    schemars,
    tool,
    tool_router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{SpGraphMcp, helpers};

/// Parameters for semantic entity retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct EntityRetrieveParams {
    /// The natural language search query for entities.
    pub query: String,
}

#[tool_router(router = tool_router_retrieval, vis = "pub")]
impl SpGraphMcp {
    #[tool(description = "Returns structured metadata from the SharePoint document library for use in LLM context, one JSON object per line.")]
    async fn metadata_retrieve(&self) -> Result<CallToolResult, ErrorData> {
        info!("metadata_retrieve called");
        let report = self
            .control()
            .retrieve_metadata()
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::text(report.text)]))
    }

    #[tool(description = "Query the knowledge graph using semantic similarity to find relevant entities and their relationships.")]
    async fn entity_retrieve(
        &self,
        Parameters(params): Parameters<EntityRetrieveParams>,
    ) -> Result<CallToolResult, ErrorData> {
        if params.query.trim().is_empty() {
            return Err(helpers::mcp_err(ErrorCode::INVALID_PARAMS, "query is required"));
        }
        info!(query_len = params.query.len(), "entity_retrieve called");
        let report = self
            .control()
            .retrieve_entities(&params.query)
            .await
            .map_err(helpers::map_err)?;
        Ok(CallToolResult::success(vec![Content::text(report.render())]))
    }
}
