use std::sync::Arc;

use spgraph_core::control::SpGraphControlPlane;
use spgraph_core::services::{
    AzureOpenAiEmbeddings,
    EmbeddingError,
    GraphError,
    LibraryError,
    Neo4jHttpClient,
    SharePointClient,
};
use thiserror::Error;

use crate::config::SpGraphConfig;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to build SharePoint client: {0}")]
    Library(#[from] LibraryError),
    #[error("failed to build Neo4j client: {0}")]
    Graph(#[from] GraphError),
    #[error("failed to build embeddings client: {0}")]
    Embedding(#[from] EmbeddingError),
}

/// Builds the long-lived collaborators once and wires them into a control plane.
pub fn build_control_plane(config: &SpGraphConfig) -> Result<SpGraphControlPlane, BuildError> {
    let library = SharePointClient::new(config.sharepoint.clone())?;
    let graph = Neo4jHttpClient::new(config.neo4j.clone())?;
    let embedder = AzureOpenAiEmbeddings::new(config.embedding.clone())?;

    Ok(
        SpGraphControlPlane::new(Arc::new(library), Arc::new(graph), Arc::new(embedder))
            .with_options(config.retrieval.clone()),
    )
}
