use std::collections::BTreeSet;

use serde_json::{Map, Value, json};
use spgraph_store::models::{EntityRow, RelationshipKey, SimilarityMatch};
use spgraph_store::schema::{
    ENTITY_NEIGHBORHOOD_QUERY,
    NO_RELATIONSHIPS,
    NO_RELEVANT_ENTITIES,
    PARAM_CHUNK_ID,
    PARAM_EMBEDDING,
    PARAM_INDEX_NAME,
    PARAM_SCORE_THRESHOLD,
    PARAM_TOP_K,
    VECTOR_QUERY,
};
use tracing::{debug, info};

use crate::services::decode_rows;

use super::{ControlError, SpGraphControlPlane};

/// Output of a semantic entity query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityReport {
    /// Sorted, deduplicated relationships.
    pub relationships: Vec<RelationshipKey>,
    pub matched_chunks: usize,
    /// Relationship entries dropped because the edge was null.
    pub skipped_relationships: usize,
}

impl EntityReport {
    /// Renders the report as prompt text, using the sentinels when empty.
    #[must_use]
    pub fn render(&self) -> String {
        if self.matched_chunks == 0 {
            return NO_RELEVANT_ENTITIES.to_string();
        }
        if self.relationships.is_empty() {
            return NO_RELATIONSHIPS.to_string();
        }
        self.relationships
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl SpGraphControlPlane {
    /// Finds relationships around the chunks most similar to `question`.
    ///
    /// # Errors
    /// Returns `ControlError` if embedding or any graph query fails.
    pub async fn retrieve_entities(&self, question: &str) -> Result<EntityReport, ControlError> {
        let embedding = self.embedder.embed_query(question).await?;
        let matches = self.similar_chunks(embedding).await?;
        if matches.is_empty() {
            info!("no chunks above the score threshold");
            return Ok(EntityReport::default());
        }

        let mut rows = Vec::new();
        for chunk in &matches {
            rows.extend(self.chunk_neighborhood(&chunk.chunk_id).await?);
        }

        let mut report = collect_relationships(&rows);
        report.matched_chunks = matches.len();
        info!(
            chunks = report.matched_chunks,
            relationships = report.relationships.len(),
            skipped = report.skipped_relationships,
            "resolved entity relationships"
        );
        Ok(report)
    }

    async fn similar_chunks(
        &self,
        embedding: Vec<f32>,
    ) -> Result<Vec<SimilarityMatch>, ControlError> {
        let mut params = Map::new();
        params.insert(PARAM_INDEX_NAME.to_string(), json!(self.options.vector_index));
        params.insert(PARAM_TOP_K.to_string(), json!(self.options.top_k));
        params.insert(PARAM_EMBEDDING.to_string(), json!(embedding));
        params.insert(PARAM_SCORE_THRESHOLD.to_string(), json!(self.options.score_threshold));

        let rows = self.graph.query(VECTOR_QUERY, params).await?;
        let mut matches: Vec<SimilarityMatch> = decode_rows(rows)?;
        // The index already filters and orders; enforce both regardless of backend.
        matches.retain(|found| found.score >= self.options.score_threshold);
        matches.sort_by(|left, right| right.score.total_cmp(&left.score));
        debug!(matches = matches.len(), "vector index matches");
        Ok(matches)
    }

    async fn chunk_neighborhood(&self, chunk_id: &Value) -> Result<Vec<EntityRow>, ControlError> {
        let mut params = Map::new();
        params.insert(PARAM_CHUNK_ID.to_string(), chunk_id.clone());
        let rows = self.graph.query(ENTITY_NEIGHBORHOOD_QUERY, params).await?;
        Ok(decode_rows(rows)?)
    }
}

/// Canonicalizes and deduplicates relationships across all rows.
#[must_use]
pub fn collect_relationships(rows: &[EntityRow]) -> EntityReport {
    let mut relationships = BTreeSet::new();
    let mut skipped_relationships = 0;

    for row in rows {
        let entity_id = row.entity_id();
        for entry in &row.entity_relationships {
            if !entry.has_relationship() {
                skipped_relationships += 1;
                debug!(entity = %entity_id, "skipping entry without a relationship");
                continue;
            }
            relationships.insert(RelationshipKey::canonical(
                entity_id.clone(),
                entry.related_id(),
                entry.type_or_unknown(),
            ));
        }
    }

    EntityReport {
        relationships: relationships.into_iter().collect(),
        matched_chunks: 0,
        skipped_relationships,
    }
}
