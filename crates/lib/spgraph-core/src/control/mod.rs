use std::sync::Arc;

use spgraph_store::schema::{DEFAULT_SCORE_THRESHOLD, DEFAULT_TOP_K, DEFAULT_VECTOR_INDEX};
use thiserror::Error;

use crate::services::{
    DocumentLibrary,
    Embedder,
    EmbeddingError,
    GraphError,
    GraphQuery,
    LibraryError,
};

pub mod entities;
pub mod metadata;

pub use entities::EntityReport;
pub use metadata::{FlattenStats, MetadataReport};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    Library(#[from] LibraryError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error("failed to serialize metadata record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Tuning for semantic entity retrieval.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalOptions {
    pub vector_index: String,
    pub top_k: usize,
    pub score_threshold: f64,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            vector_index: DEFAULT_VECTOR_INDEX.to_string(),
            top_k: DEFAULT_TOP_K,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
        }
    }
}

/// Entry point for both retrieval operations.
///
/// Holds the long-lived collaborator handles; cloning shares them.
#[derive(Clone)]
pub struct SpGraphControlPlane {
    library: Arc<dyn DocumentLibrary>,
    graph: Arc<dyn GraphQuery>,
    embedder: Arc<dyn Embedder>,
    options: RetrievalOptions,
}

impl SpGraphControlPlane {
    #[must_use]
    pub fn new(
        library: Arc<dyn DocumentLibrary>,
        graph: Arc<dyn GraphQuery>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            library,
            graph,
            embedder,
            options: RetrievalOptions::default(),
        }
    }

    #[must_use]
    pub fn with_options(mut self, options: RetrievalOptions) -> Self {
        self.options = options;
        self
    }
}
