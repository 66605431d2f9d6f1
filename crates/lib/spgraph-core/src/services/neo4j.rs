//! Neo4j client over the HTTP transactional endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{GraphError, GraphQuery, Row, error_body};

pub const DEFAULT_DATABASE: &str = "neo4j";

/// Connection settings for a Neo4j server's HTTP API.
#[derive(Debug, Clone)]
pub struct Neo4jConfig {
    /// Base HTTP(S) URL, e.g. `http://localhost:7474`.
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    statements: [Statement<'a>; 1],
}

#[derive(Serialize)]
struct Statement<'a> {
    statement: &'a str,
    parameters: &'a Map<String, Value>,
}

#[derive(Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<DatabaseError>,
}

#[derive(Deserialize)]
struct StatementResult {
    columns: Vec<String>,
    #[serde(default)]
    data: Vec<RowData>,
}

#[derive(Deserialize)]
struct RowData {
    row: Vec<Value>,
}

#[derive(Deserialize)]
struct DatabaseError {
    code: String,
    message: String,
}

pub struct Neo4jHttpClient {
    client: Client,
    config: Neo4jConfig,
}

impl Neo4jHttpClient {
    /// Builds the client.
    ///
    /// # Errors
    /// Returns `GraphError::Http` if the HTTP client cannot be built.
    pub fn new(config: Neo4jConfig) -> Result<Self, GraphError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    fn commit_url(&self) -> String {
        format!(
            "{}/db/{}/tx/commit",
            self.config.uri.trim_end_matches('/'),
            urlencoding::encode(&self.config.database)
        )
    }
}

#[async_trait]
impl GraphQuery for Neo4jHttpClient {
    async fn query(
        &self,
        statement: &str,
        params: Map<String, Value>,
    ) -> Result<Vec<Row>, GraphError> {
        let body = CommitRequest {
            statements: [Statement {
                statement,
                parameters: &params,
            }],
        };
        let response = self
            .client
            .post(self.commit_url())
            .basic_auth(&self.config.user, Some(&self.config.password))
            .header(ACCEPT, "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GraphError::Status {
                status: status.as_u16(),
                body: error_body(response).await,
            });
        }

        let payload: CommitResponse = response.json().await?;
        if let Some(error) = payload.errors.into_iter().next() {
            return Err(GraphError::Database {
                code: error.code,
                message: error.message,
            });
        }

        let Some(result) = payload.results.into_iter().next() else {
            return Ok(Vec::new());
        };
        let rows = zip_rows(&result.columns, result.data);
        debug!(rows = rows.len(), "graph query returned");
        Ok(rows)
    }
}

fn zip_rows(columns: &[String], data: Vec<RowData>) -> Vec<Row> {
    data.into_iter()
        .map(|data| columns.iter().cloned().zip(data.row).collect())
        .collect()
}
