use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Map, Value};
use spgraph_core::control::SpGraphControlPlane;
use spgraph_core::services::{
    DocumentLibrary,
    Embedder,
    EmbeddingError,
    GraphError,
    GraphQuery,
    LibraryError,
    Row,
};
use spgraph_store::models::LibraryItem;
use spgraph_store::schema::VECTOR_QUERY;

struct StaticLibrary(Vec<LibraryItem>);

#[async_trait]
impl DocumentLibrary for StaticLibrary {
    async fn fetch_items(&self) -> Result<Vec<LibraryItem>, LibraryError> {
        Ok(self.0.clone())
    }
}

/// Returns `matches` for the vector query and `neighborhood` for every chunk.
struct StaticGraph {
    matches: Vec<Row>,
    neighborhood: Vec<Row>,
}

#[async_trait]
impl GraphQuery for StaticGraph {
    async fn query(
        &self,
        statement: &str,
        _params: Map<String, Value>,
    ) -> Result<Vec<Row>, GraphError> {
        if statement == VECTOR_QUERY {
            Ok(self.matches.clone())
        } else {
            Ok(self.neighborhood.clone())
        }
    }
}

struct FixedEmbedder;

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(vec![0.5, 0.5])
    }
}

/// Records every text it is asked to embed.
struct RecordingEmbedder(Arc<Mutex<Vec<String>>>);

#[async_trait]
impl Embedder for RecordingEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.0.lock().expect("lock").push(text.to_string());
        Ok(vec![0.5, 0.5])
    }
}

pub fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

pub fn control_plane(items: Vec<LibraryItem>, matches: Vec<Row>) -> SpGraphControlPlane {
    control_plane_with_neighborhood(items, matches, Vec::new())
}

pub fn control_plane_with_neighborhood(
    items: Vec<LibraryItem>,
    matches: Vec<Row>,
    neighborhood: Vec<Row>,
) -> SpGraphControlPlane {
    SpGraphControlPlane::new(
        Arc::new(StaticLibrary(items)),
        Arc::new(StaticGraph {
            matches,
            neighborhood,
        }),
        Arc::new(FixedEmbedder),
    )
}

pub fn recording_control_plane() -> (SpGraphControlPlane, Arc<Mutex<Vec<String>>>) {
    let embedded = Arc::new(Mutex::new(Vec::new()));
    let control = SpGraphControlPlane::new(
        Arc::new(StaticLibrary(Vec::new())),
        Arc::new(StaticGraph {
            matches: Vec::new(),
            neighborhood: Vec::new(),
        }),
        Arc::new(RecordingEmbedder(Arc::clone(&embedded))),
    );
    (control, embedded)
}
