pub const LABEL_CHUNK: &str = "Document";
pub const DEFAULT_VECTOR_INDEX: &str = "document_embeddings";
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.75;

pub const UNKNOWN_NODE_ID: &str = "Unknown";
pub const UNKNOWN_RELATIONSHIP_TYPE: &str = "UNKNOWN";

pub const NO_RELEVANT_ENTITIES: &str = "No relevant entities found.";
pub const NO_RELATIONSHIPS: &str = "No relationships found";

pub const PARAM_INDEX_NAME: &str = "index_name";
pub const PARAM_TOP_K: &str = "top_k";
pub const PARAM_EMBEDDING: &str = "question_embedding";
pub const PARAM_SCORE_THRESHOLD: &str = "score_threshold";
pub const PARAM_CHUNK_ID: &str = "chunk_id";

/// Vector search over chunk embeddings, best match first.
pub const VECTOR_QUERY: &str = "\
CALL db.index.vector.queryNodes($index_name, $top_k, $question_embedding) YIELD node, score
WHERE score >= $score_threshold
RETURN node.id AS id, score
ORDER BY score DESC";

/// Entities attached to a chunk and their non-chunk neighbors.
///
/// `id(entity) < id(related_node)` keeps one traversal from returning both
/// directions of the same pair.
pub const ENTITY_NEIGHBORHOOD_QUERY: &str = "\
MATCH (chunk:Document {id: $chunk_id})
OPTIONAL MATCH (chunk)-[r1]-(entity)
WHERE NOT entity:Document
OPTIONAL MATCH (entity)-[r2]-(related_node)
WHERE NOT related_node:Document AND id(entity) < id(related_node)
RETURN
    entity,
    labels(entity) AS entity_labels,
    collect(DISTINCT {
        relationship: r2,
        type: type(r2),
        direction: CASE WHEN startNode(r2) = entity THEN 'FORWARD' ELSE 'BACKWARD' END,
        related_node: related_node,
        related_node_labels: labels(related_node)
    }) AS entity_relationships";
