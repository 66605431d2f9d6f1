//! MCP server implementation for spgraph-mcp.
//!
//! This crate wires the retrieval control plane into rmcp tool handlers and
//! exposes the MCP-facing surface: `metadata_retrieve`, `entity_retrieve`,
//! plus `health` and `help`.

mod helpers;
mod tools;
pub mod server;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use rmcp::{
    ErrorData,
    ServerHandler,
    handler::server::tool::ToolRouter,
    tool,
    tool_handler,
    tool_router,
};
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use spgraph_core::control::SpGraphControlPlane;

pub use tools::retrieval::EntityRetrieveParams;

const SERVER_INSTRUCTIONS: &str = r"spgraph-mcp provides retrieval tools over a SharePoint document library and a Neo4j knowledge graph.

Tools:
- `metadata_retrieve` returns file metadata for every item in the configured SharePoint library,
  one JSON object per line.
- `entity_retrieve` takes a natural language `query`, finds the most similar document chunks in the
  graph's vector index and returns the relationships around them as `A - TYPE -> B` lines.
  It returns `No relevant entities found.` when no chunk is similar enough and
  `No relationships found` when matching chunks have no connected entities.
- `help` lists the tools; `health` returns `ok`.";

/// MCP server wrapper around the control plane and tool routers.
#[derive(Clone)]
pub struct SpGraphMcp {
    tool_router: ToolRouter<Self>,
    control: Arc<SpGraphControlPlane>,
}

impl SpGraphMcp {
    /// Creates a new server owning the control plane.
    #[must_use]
    pub fn new(control: SpGraphControlPlane) -> Self {
        Self::with_control(Arc::new(control))
    }

    /// Creates a new server using a shared control plane.
    #[must_use]
    pub fn with_control(control: Arc<SpGraphControlPlane>) -> Self {
        let tool_router = Self::tool_router_core()
            + Self::tool_router_retrieval()
            + Self::tool_router_context();
        Self {
            tool_router,
            control,
        }
    }

    pub(crate) fn control(&self) -> &SpGraphControlPlane {
        &self.control
    }
}

#[tool_router(router = tool_router_core, vis = "pub")]
impl SpGraphMcp {
    #[tool(description = "Health check. Returns 'ok'.")]
    async fn health(&self) -> Result<CallToolResult, ErrorData> {
        Ok(CallToolResult::success(vec![Content::text("ok")]))
    }
}

#[tool_handler]
impl ServerHandler for SpGraphMcp {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(SERVER_INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}
