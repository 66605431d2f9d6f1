use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{UNKNOWN_NODE_ID, UNKNOWN_RELATIONSHIP_TYPE};

/// Field name to value map for a single library file.
pub type PropertyBag = BTreeMap<String, PropertyValue>;

/// Flattened, JSON-serializable metadata for one library item.
pub type MetadataRecord = Map<String, Value>;

/// A single property value as decoded from the document library.
///
/// Library payloads are loosely typed; decoders classify each value into one
/// of these variants so flattening can treat every shape explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    /// Primitive or JSON-native value, kept as-is.
    Json(Value),
    /// Object exposing its own property bag.
    Nested(PropertyBag),
    /// Raw bytes.
    Binary(Vec<u8>),
    /// Any other value, carried with its display form.
    Opaque(String),
}

impl From<Value> for PropertyValue {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// A library item together with the properties of its file.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryItem {
    pub id: String,
    pub properties: PropertyBag,
}

impl LibraryItem {
    #[must_use]
    pub fn new(id: impl Into<String>, properties: PropertyBag) -> Self {
        Self {
            id: id.into(),
            properties,
        }
    }
}

/// A chunk returned by the vector index query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch {
    /// Chunk `id` property, passed back verbatim to the neighborhood query.
    #[serde(rename = "id")]
    pub chunk_id: Value,
    pub score: f64,
}

/// Property map of a graph node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

impl GraphNode {
    /// Returns the `id` property as text, or `Unknown` when absent.
    #[must_use]
    pub fn display_id(&self) -> String {
        match &self.id {
            None | Some(Value::Null) => UNKNOWN_NODE_ID.to_string(),
            Some(Value::String(id)) => id.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Which way the stored edge points relative to the entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Forward,
    Backward,
}

/// One collected relationship of an entity in the neighborhood query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipEntry {
    /// Relationship properties; `None` when the optional match found no edge.
    #[serde(default)]
    pub relationship: Option<Value>,
    #[serde(default, rename = "type")]
    pub rel_type: Option<String>,
    #[serde(default)]
    pub direction: Option<Direction>,
    #[serde(default)]
    pub related_node: Option<GraphNode>,
    #[serde(default)]
    pub related_node_labels: Option<Vec<String>>,
}

impl RelationshipEntry {
    #[must_use]
    pub fn has_relationship(&self) -> bool {
        self.relationship.as_ref().is_some_and(|value| !value.is_null())
    }

    #[must_use]
    pub fn type_or_unknown(&self) -> &str {
        self.rel_type.as_deref().unwrap_or(UNKNOWN_RELATIONSHIP_TYPE)
    }

    #[must_use]
    pub fn related_id(&self) -> String {
        self.related_node
            .as_ref()
            .map_or_else(|| UNKNOWN_NODE_ID.to_string(), GraphNode::display_id)
    }
}

/// One row of the chunk neighborhood query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRow {
    #[serde(default)]
    pub entity: Option<GraphNode>,
    #[serde(default)]
    pub entity_labels: Option<Vec<String>>,
    #[serde(default)]
    pub entity_relationships: Vec<RelationshipEntry>,
}

impl EntityRow {
    #[must_use]
    pub fn entity_id(&self) -> String {
        self.entity
            .as_ref()
            .map_or_else(|| UNKNOWN_NODE_ID.to_string(), GraphNode::display_id)
    }
}

/// Direction-agnostic identity of a relationship.
///
/// Endpoints are stored in sorted order, so `(a, b, t)` and `(b, a, t)`
/// produce equal keys. Ordering is by low endpoint, type, then high endpoint.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RelationshipKey {
    pub low: String,
    pub rel_type: String,
    pub high: String,
}

impl RelationshipKey {
    #[must_use]
    pub fn canonical(
        a: impl Into<String>,
        b: impl Into<String>,
        rel_type: impl Into<String>,
    ) -> Self {
        let (a, b) = (a.into(), b.into());
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        Self {
            low,
            rel_type: rel_type.into(),
            high,
        }
    }
}

impl fmt::Display for RelationshipKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {} -> {}", self.low, self.rel_type, self.high)
    }
}
