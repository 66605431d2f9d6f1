//! MCP server runners for spgraph-mcp.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::routing::get;
use rmcp::serve_server;
use rmcp::transport::io::stdio;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig,
    StreamableHttpService,
    session::local::LocalSessionManager,
};
use spgraph_core::control::SpGraphControlPlane;
use tracing::info;

use crate::SpGraphMcp;

pub const DEFAULT_MCP_HTTP_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_SSE_KEEP_ALIVE_SECS: u64 = 15;
const SSE_RETRY: Duration = Duration::from_secs(3);

/// Configuration for the MCP streamable HTTP server.
#[derive(Debug, Clone)]
pub struct McpHttpServerConfig {
    pub addr: SocketAddr,
    pub stateful_mode: bool,
    pub sse_keep_alive: Option<Duration>,
}

impl McpHttpServerConfig {
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            stateful_mode: true,
            sse_keep_alive: Some(Duration::from_secs(DEFAULT_SSE_KEEP_ALIVE_SECS)),
        }
    }

    #[must_use]
    pub const fn with_stateful_mode(mut self, stateful_mode: bool) -> Self {
        self.stateful_mode = stateful_mode;
        self
    }

    #[must_use]
    pub const fn with_sse_keep_alive(mut self, sse_keep_alive: Option<Duration>) -> Self {
        self.sse_keep_alive = sse_keep_alive;
        self
    }
}

/// Serves the MCP server over stdio.
///
/// # Errors
/// Returns any transport or server error.
pub async fn serve_stdio(
    control: Arc<SpGraphControlPlane>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service = SpGraphMcp::with_control(control);
    let (stdin, stdout) = stdio();
    info!("serving MCP over stdio");
    let running = serve_server(service, (stdin, stdout)).await?;
    let _ = running.waiting().await?;
    Ok(())
}

/// Serves the MCP server using streamable HTTP transport at `/mcp`, with a
/// plain `/health` route beside it. Stops on Ctrl+C.
///
/// # Errors
/// Returns any listener or server error.
pub async fn serve_streamable_http(
    control: Arc<SpGraphControlPlane>,
    config: McpHttpServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let service: StreamableHttpService<SpGraphMcp, LocalSessionManager> =
        StreamableHttpService::new(
            move || Ok(SpGraphMcp::with_control(control.clone())),
            Arc::new(LocalSessionManager::default()),
            StreamableHttpServerConfig {
                sse_keep_alive: config.sse_keep_alive,
                sse_retry: Some(SSE_RETRY),
                stateful_mode: config.stateful_mode,
                ..Default::default()
            },
        );

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .nest_service("/mcp", service);
    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(addr = %config.addr, "serving MCP over streamable HTTP at /mcp");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}
