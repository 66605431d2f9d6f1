use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{ArgAction, Parser, builder::BoolishValueParser};
use spgraph_core::control::RetrievalOptions;
use spgraph_core::services::neo4j::DEFAULT_DATABASE;
use spgraph_core::services::sharepoint::DEFAULT_STS_URL;
use spgraph_core::services::{EmbeddingConfig, Neo4jConfig, SharePointConfig};
use spgraph_mcp::server::{
    DEFAULT_MCP_HTTP_ADDR,
    DEFAULT_SSE_KEEP_ALIVE_SECS,
    McpHttpServerConfig,
};
use spgraph_store::schema::{DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K, DEFAULT_VECTOR_INDEX};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Parser, Debug)]
#[command(name = "spgraph-mcpd", version, about = "spgraph MCP daemon.")]
struct CliArgs {
    #[arg(long, env = "SHAREPOINT_SITE_URL")]
    sharepoint_site_url: Option<String>,

    #[arg(long, env = "SHAREPOINT_USERNAME")]
    sharepoint_username: Option<String>,

    #[arg(long, env = "SHAREPOINT_PASSWORD", hide_env_values = true)]
    sharepoint_password: Option<String>,

    #[arg(long, env = "SHAREPOINT_LIBRARY_NAME")]
    sharepoint_library_name: Option<String>,

    #[arg(long, env = "SHAREPOINT_STS_URL", default_value = DEFAULT_STS_URL)]
    sharepoint_sts_url: String,

    #[arg(long, env = "NEO4J_URI")]
    neo4j_uri: Option<String>,

    #[arg(long, env = "NEO4J_USER")]
    neo4j_user: Option<String>,

    #[arg(long, env = "NEO4J_PASSWORD", hide_env_values = true)]
    neo4j_password: Option<String>,

    #[arg(long, env = "NEO4J_DATABASE", default_value = DEFAULT_DATABASE)]
    neo4j_database: String,

    #[arg(long, env = "EMBEDDING_MODEL_ENDPOINT")]
    embedding_endpoint: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL_KEY", hide_env_values = true)]
    embedding_key: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL_API_VERSION")]
    embedding_api_version: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL_DEPLOYMENT_NAME")]
    embedding_deployment: Option<String>,

    #[arg(long, env = "EMBEDDING_MODEL_CHUNK_SIZE")]
    embedding_chunk_size: Option<usize>,

    #[arg(long, env = "EMBEDDING_MODEL_DIMENSION")]
    embedding_dimension: Option<usize>,

    #[arg(long, env = "EMBEDDING_MODEL_CHUNK_OVERLAP")]
    embedding_chunk_overlap: Option<usize>,

    #[arg(long, env = "LLM_API_VERSION")]
    llm_api_version: Option<String>,

    #[arg(long, env = "LLM_DEPLOYMENT_NAME")]
    llm_deployment: Option<String>,

    #[arg(long, env = "LLM_API_KEY", hide_env_values = true)]
    llm_api_key: Option<String>,

    #[arg(long, env = "LLM_API_ENDPOINT")]
    llm_endpoint: Option<String>,

    #[arg(long, env = "SPGRAPH_VECTOR_INDEX", default_value = DEFAULT_VECTOR_INDEX)]
    vector_index: String,

    #[arg(long, env = "SPGRAPH_TOP_K", default_value_t = DEFAULT_TOP_K)]
    top_k: usize,

    #[arg(long, env = "SPGRAPH_SCORE_THRESHOLD", default_value_t = DEFAULT_SCORE_THRESHOLD)]
    score_threshold: f64,

    #[arg(
        long,
        env = "SPGRAPH_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_HTTP_TIMEOUT_SECS
    )]
    http_timeout_secs: u64,

    #[arg(long, env = "SPGRAPH_MCP_HTTP_ADDR", default_value = DEFAULT_MCP_HTTP_ADDR)]
    mcp_http_addr: SocketAddr,

    #[arg(
        long,
        env = "SPGRAPH_MCP_STATEFUL",
        default_value_t = true,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    mcp_stateful: bool,

    /// SSE keep-alive interval in seconds; 0 disables keep-alive pings.
    #[arg(
        long,
        env = "SPGRAPH_SSE_KEEP_ALIVE_SECS",
        default_value_t = DEFAULT_SSE_KEEP_ALIVE_SECS
    )]
    sse_keep_alive_secs: u64,

    #[arg(
        long = "stdio",
        env = "SPGRAPH_ENABLE_STDIO",
        default_value_t = false,
        value_parser = BoolishValueParser::new()
    )]
    enable_stdio: bool,

    #[arg(long, env = "SPGRAPH_LOG", default_value = DEFAULT_LOG_FILTER)]
    log: String,
}

/// Chat model settings. Accepted for deployment parity; no tool uses them.
#[derive(Debug, Clone, Default)]
pub struct LlmSettings {
    pub api_version: Option<String>,
    pub deployment: Option<String>,
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
}

impl LlmSettings {
    pub const fn is_configured(&self) -> bool {
        self.api_version.is_some()
            && self.deployment.is_some()
            && self.api_key.is_some()
            && self.endpoint.is_some()
    }
}

/// Runtime configuration loaded from CLI arguments and environment variables.
#[derive(Debug, Clone)]
pub struct SpGraphConfig {
    pub sharepoint: SharePointConfig,
    pub neo4j: Neo4jConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmSettings,
    pub retrieval: RetrievalOptions,
    pub mcp_http: McpHttpServerConfig,
    pub enable_stdio: bool,
    pub log_filter: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
    #[error("invalid {name} value: {value}")]
    InvalidSetting { name: &'static str, value: String },
}

/// Outcome of loading a `.env` file into the process environment.
#[derive(Debug)]
pub enum EnvFileStatus {
    Loaded(PathBuf),
    Missing,
    Invalid(dotenvy::Error),
}

impl EnvFileStatus {
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => debug!(path = %path.display(), "loaded environment file"),
            Self::Missing => debug!("no .env file found"),
            Self::Invalid(err) => warn!(error = %err, "ignoring unreadable .env file"),
        }
    }
}

/// Loads `path`, or the nearest `.env` above the working directory when `None`.
/// Variables already set in the environment win over the file.
#[must_use]
pub fn load_env_file(path: Option<&Path>) -> EnvFileStatus {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };
    match loaded {
        Ok(path) => EnvFileStatus::Loaded(path),
        Err(err) if err.not_found() => EnvFileStatus::Missing,
        Err(err) => EnvFileStatus::Invalid(err),
    }
}

impl SpGraphConfig {
    /// Parses process arguments and environment into a validated config.
    ///
    /// # Errors
    /// Returns `ConfigError` when a required setting is missing or a value is
    /// out of range.
    pub fn from_args() -> Result<Self, ConfigError> {
        let args = CliArgs::parse();
        Self::try_from(args)
    }
}

impl TryFrom<CliArgs> for SpGraphConfig {
    type Error = ConfigError;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let timeout = Duration::from_secs(args.http_timeout_secs);

        let sharepoint = SharePointConfig {
            site_url: required(args.sharepoint_site_url, "SHAREPOINT_SITE_URL")?,
            username: required(args.sharepoint_username, "SHAREPOINT_USERNAME")?,
            password: required(args.sharepoint_password, "SHAREPOINT_PASSWORD")?,
            library_name: required(args.sharepoint_library_name, "SHAREPOINT_LIBRARY_NAME")?,
            sts_url: args.sharepoint_sts_url,
            timeout,
        };

        let neo4j_uri = required(args.neo4j_uri, "NEO4J_URI")?;
        if !(neo4j_uri.starts_with("http://") || neo4j_uri.starts_with("https://")) {
            return Err(ConfigError::InvalidSetting {
                name: "NEO4J_URI",
                value: neo4j_uri,
            });
        }
        let neo4j = Neo4jConfig {
            uri: neo4j_uri,
            user: required(args.neo4j_user, "NEO4J_USER")?,
            password: required(args.neo4j_password, "NEO4J_PASSWORD")?,
            database: args.neo4j_database,
            timeout,
        };

        let chunk_size = args
            .embedding_chunk_size
            .ok_or(ConfigError::MissingSetting("EMBEDDING_MODEL_CHUNK_SIZE"))?;
        if chunk_size == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "EMBEDDING_MODEL_CHUNK_SIZE",
                value: chunk_size.to_string(),
            });
        }
        let dimension = args
            .embedding_dimension
            .ok_or(ConfigError::MissingSetting("EMBEDDING_MODEL_DIMENSION"))?;
        // Only used at ingestion time; still required so deployments stay uniform.
        args.embedding_chunk_overlap
            .ok_or(ConfigError::MissingSetting("EMBEDDING_MODEL_CHUNK_OVERLAP"))?;
        let embedding = EmbeddingConfig {
            endpoint: required(args.embedding_endpoint, "EMBEDDING_MODEL_ENDPOINT")?,
            api_key: required(args.embedding_key, "EMBEDDING_MODEL_KEY")?,
            api_version: required(args.embedding_api_version, "EMBEDDING_MODEL_API_VERSION")?,
            deployment: required(args.embedding_deployment, "EMBEDDING_MODEL_DEPLOYMENT_NAME")?,
            chunk_size,
            dimension: Some(dimension),
            timeout,
        };

        if args.vector_index.trim().is_empty() {
            return Err(ConfigError::InvalidSetting {
                name: "SPGRAPH_VECTOR_INDEX",
                value: args.vector_index,
            });
        }
        if args.top_k == 0 {
            return Err(ConfigError::InvalidSetting {
                name: "SPGRAPH_TOP_K",
                value: args.top_k.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&args.score_threshold) {
            return Err(ConfigError::InvalidSetting {
                name: "SPGRAPH_SCORE_THRESHOLD",
                value: args.score_threshold.to_string(),
            });
        }

        Ok(Self {
            sharepoint,
            neo4j,
            embedding,
            llm: LlmSettings {
                api_version: optional(args.llm_api_version),
                deployment: optional(args.llm_deployment),
                api_key: optional(args.llm_api_key),
                endpoint: optional(args.llm_endpoint),
            },
            retrieval: RetrievalOptions {
                vector_index: args.vector_index,
                top_k: args.top_k,
                score_threshold: args.score_threshold,
            },
            mcp_http: McpHttpServerConfig::new(args.mcp_http_addr)
                .with_stateful_mode(args.mcp_stateful)
                .with_sse_keep_alive(
                    (args.sse_keep_alive_secs > 0)
                        .then(|| Duration::from_secs(args.sse_keep_alive_secs)),
                ),
            enable_stdio: args.enable_stdio,
            log_filter: args.log,
        })
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn required(value: Option<String>, name: &'static str) -> Result<String, ConfigError> {
    optional(value).ok_or(ConfigError::MissingSetting(name))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn base_args() -> CliArgs {
        CliArgs {
            sharepoint_site_url: Some("https://tenant.sharepoint.com/sites/team".to_string()),
            sharepoint_username: Some("user@tenant.onmicrosoft.com".to_string()),
            sharepoint_password: Some("secret".to_string()),
            sharepoint_library_name: Some("Documents".to_string()),
            sharepoint_sts_url: DEFAULT_STS_URL.to_string(),
            neo4j_uri: Some("http://localhost:7474".to_string()),
            neo4j_user: Some("neo4j".to_string()),
            neo4j_password: Some("password".to_string()),
            neo4j_database: DEFAULT_DATABASE.to_string(),
            embedding_endpoint: Some("https://example.openai.azure.com".to_string()),
            embedding_key: Some("key".to_string()),
            embedding_api_version: Some("2024-02-01".to_string()),
            embedding_deployment: Some("text-embedding-3-small".to_string()),
            embedding_chunk_size: Some(16),
            embedding_dimension: Some(1536),
            embedding_chunk_overlap: Some(200),
            llm_api_version: None,
            llm_deployment: None,
            llm_api_key: None,
            llm_endpoint: None,
            vector_index: DEFAULT_VECTOR_INDEX.to_string(),
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            mcp_http_addr: DEFAULT_MCP_HTTP_ADDR.parse().expect("valid MCP addr"),
            mcp_stateful: true,
            sse_keep_alive_secs: DEFAULT_SSE_KEEP_ALIVE_SECS,
            enable_stdio: false,
            log: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn complete_args_produce_collaborator_configs() {
        let config = SpGraphConfig::try_from(base_args()).expect("config should parse");

        assert_eq!(config.sharepoint.library_name, "Documents");
        assert_eq!(config.neo4j.database, DEFAULT_DATABASE);
        assert_eq!(config.embedding.chunk_size, 16);
        assert_eq!(config.embedding.dimension, Some(1536));
        assert_eq!(config.retrieval, RetrievalOptions::default());
        assert_eq!(config.neo4j.timeout, Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS));
        assert!(!config.llm.is_configured());
        assert!(config.mcp_http.stateful_mode);
        assert_eq!(
            config.mcp_http.sse_keep_alive,
            Some(Duration::from_secs(DEFAULT_SSE_KEEP_ALIVE_SECS))
        );
    }

    #[test]
    fn transport_knobs_reach_http_config() {
        let mut args = base_args();
        args.mcp_stateful = false;
        args.sse_keep_alive_secs = 0;

        let config = SpGraphConfig::try_from(args).expect("config should parse");

        assert!(!config.mcp_http.stateful_mode);
        assert!(config.mcp_http.sse_keep_alive.is_none());
    }

    #[test]
    fn env_file_values_reach_the_environment() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(".env");
        std::fs::write(&path, "SPGRAPH_DOTENV_FIXTURE_VALUE=from-file\n").expect("write .env");

        let status = load_env_file(Some(&path));

        assert!(matches!(status, EnvFileStatus::Loaded(ref loaded) if loaded == &path));
        assert_eq!(
            std::env::var("SPGRAPH_DOTENV_FIXTURE_VALUE").as_deref(),
            Ok("from-file")
        );
    }

    #[test]
    fn missing_env_file_is_reported_not_fatal() {
        let dir = tempfile::tempdir().expect("temp dir");

        let status = load_env_file(Some(&dir.path().join("absent.env")));

        assert!(matches!(status, EnvFileStatus::Missing));
    }

    #[test]
    fn blank_required_setting_is_missing() {
        let mut args = base_args();
        args.sharepoint_site_url = Some("  ".to_string());

        let err = SpGraphConfig::try_from(args).expect_err("blank url should fail");

        assert!(matches!(err, ConfigError::MissingSetting("SHAREPOINT_SITE_URL")));
    }

    #[test]
    fn missing_numeric_embedding_setting_fails() {
        let mut args = base_args();
        args.embedding_chunk_overlap = None;

        let err = SpGraphConfig::try_from(args).expect_err("overlap is required");

        assert!(matches!(err, ConfigError::MissingSetting("EMBEDDING_MODEL_CHUNK_OVERLAP")));
    }

    #[test]
    fn bolt_uri_is_rejected() {
        let mut args = base_args();
        args.neo4j_uri = Some("neo4j://localhost:7687".to_string());

        let err = SpGraphConfig::try_from(args).expect_err("bolt uri should fail");

        assert!(matches!(err, ConfigError::InvalidSetting { name: "NEO4J_URI", .. }));
    }

    #[test]
    fn retrieval_bounds_are_validated() {
        let mut args = base_args();
        args.score_threshold = 1.5;
        assert!(SpGraphConfig::try_from(args).is_err());

        let mut args = base_args();
        args.top_k = 0;
        assert!(SpGraphConfig::try_from(args).is_err());

        let mut args = base_args();
        args.embedding_chunk_size = Some(0);
        assert!(SpGraphConfig::try_from(args).is_err());
    }
}
