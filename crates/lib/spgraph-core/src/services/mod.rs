//! Collaborator traits and their HTTP implementations.
//!
//! The control plane only sees the traits below; the concrete clients live in
//! the submodules and are built once at startup from explicit configuration.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use spgraph_store::models::LibraryItem;
use thiserror::Error;

pub mod embeddings;
pub mod neo4j;
pub mod sharepoint;

pub use embeddings::{AzureOpenAiEmbeddings, EmbeddingConfig};
pub use neo4j::{Neo4jConfig, Neo4jHttpClient};
pub use sharepoint::{SharePointClient, SharePointConfig};

/// A graph query result row keyed by column name.
pub type Row = Map<String, Value>;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("document library request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("document library returned {status} for {url}: {body}")]
    Status { status: u16, url: String, body: String },
    #[error("document library authentication failed: {0}")]
    Auth(String),
    #[error("invalid document library URL: {0}")]
    InvalidUrl(String),
    #[error("unexpected document library payload: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph database request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("graph database returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("graph database error {code}: {message}")]
    Database { code: String, message: String },
    #[error("unexpected graph row: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected embedding payload: {0}")]
    Decode(String),
}

/// Read access to a document library.
#[async_trait]
pub trait DocumentLibrary: Send + Sync {
    /// Connects, lists every item and loads each item's file properties.
    async fn fetch_items(&self) -> Result<Vec<LibraryItem>, LibraryError>;
}

/// Parameterized query execution against a graph database.
#[async_trait]
pub trait GraphQuery: Send + Sync {
    async fn query(
        &self,
        statement: &str,
        params: Map<String, Value>,
    ) -> Result<Vec<Row>, GraphError>;
}

/// Text to vector embedding.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

/// Decodes untyped rows into typed records, failing on the first bad row.
///
/// # Errors
/// Returns `GraphError::Decode` if a row does not match `T`.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> Result<Vec<T>, GraphError> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(Value::Object(row))
                .map_err(|err| GraphError::Decode(err.to_string()))
        })
        .collect()
}

/// Reads a response body for an error message without failing the caller.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response.text().await.unwrap_or_default()
}
