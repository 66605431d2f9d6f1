//! Daemon entry point for the spgraph MCP server.
//!
//! Loads configuration from arguments, the environment and an optional `.env`
//! file, builds the SharePoint, Neo4j and embeddings clients, and serves MCP
//! over streamable HTTP (or stdio when enabled).

mod config;
mod services;

use std::sync::Arc;

use spgraph_mcp::server::{serve_stdio, serve_streamable_http};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::config::{SpGraphConfig, load_env_file};
use crate::services::build_control_plane;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_file = load_env_file(None);
    let config = SpGraphConfig::from_args()?;
    init_tracing(&config.log_filter);
    env_file.log();

    info!(
        library = %config.sharepoint.library_name,
        neo4j = %config.neo4j.uri,
        database = %config.neo4j.database,
        vector_index = %config.retrieval.vector_index,
        "starting spgraph-mcpd"
    );
    debug!(llm_configured = config.llm.is_configured(), "chat model settings");

    let control = Arc::new(build_control_plane(&config)?);
    if config.enable_stdio {
        serve_stdio(control).await
    } else {
        serve_streamable_http(control, config.mcp_http).await
    }
}

/// Logs go to stderr so stdio transport keeps stdout for protocol frames.
fn init_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
