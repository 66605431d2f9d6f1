use serde_json::Value;
use spgraph_store::models::{LibraryItem, MetadataRecord, PropertyBag, PropertyValue};
use tracing::{debug, info};

use super::{ControlError, SpGraphControlPlane};

/// Counts of non-trivial conversions made while flattening properties.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlattenStats {
    /// Nested property bags replaced by plain objects.
    pub nested: usize,
    /// Binary values replaced by their string form.
    pub binary: usize,
    /// Other values replaced by their display string.
    pub stringified: usize,
}

impl FlattenStats {
    fn absorb(&mut self, other: Self) {
        self.nested += other.nested;
        self.binary += other.binary;
        self.stringified += other.stringified;
    }
}

/// Output of a metadata fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataReport {
    /// One JSON object per line, one line per item.
    pub text: String,
    pub item_count: usize,
    pub stats: FlattenStats,
}

impl SpGraphControlPlane {
    /// Fetches every library item and renders its file metadata as JSON lines.
    ///
    /// # Errors
    /// Returns `ControlError` if the library fetch fails.
    pub async fn retrieve_metadata(&self) -> Result<MetadataReport, ControlError> {
        let items = self.library.fetch_items().await?;
        let report = render_metadata(&items)?;
        info!(
            items = report.item_count,
            binary = report.stats.binary,
            stringified = report.stats.stringified,
            "rendered library metadata"
        );
        Ok(report)
    }
}

/// Renders items as newline-separated JSON objects.
///
/// # Errors
/// Returns `ControlError::Serialize` if a record fails to serialize.
pub fn render_metadata(items: &[LibraryItem]) -> Result<MetadataReport, ControlError> {
    let mut stats = FlattenStats::default();
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let (record, item_stats) = flatten_properties(&item.properties);
        stats.absorb(item_stats);
        lines.push(serde_json::to_string(&record)?);
    }
    Ok(MetadataReport {
        text: lines.join("\n"),
        item_count: items.len(),
        stats,
    })
}

/// Flattens a property bag into a JSON-serializable record.
#[must_use]
pub fn flatten_properties(properties: &PropertyBag) -> (MetadataRecord, FlattenStats) {
    let mut stats = FlattenStats::default();
    let record = flatten_bag(properties, &mut stats);
    (record, stats)
}

fn flatten_bag(properties: &PropertyBag, stats: &mut FlattenStats) -> MetadataRecord {
    properties
        .iter()
        .map(|(field, value)| (field.clone(), flatten_value(field, value, stats)))
        .collect()
}

fn flatten_value(field: &str, value: &PropertyValue, stats: &mut FlattenStats) -> Value {
    match value {
        PropertyValue::Json(value) => value.clone(),
        PropertyValue::Nested(bag) => {
            stats.nested += 1;
            Value::Object(flatten_bag(bag, stats))
        }
        PropertyValue::Binary(bytes) => {
            stats.binary += 1;
            debug!(field, bytes = bytes.len(), "stringifying binary property");
            Value::String(bytes.escape_ascii().to_string())
        }
        PropertyValue::Opaque(display) => {
            stats.stringified += 1;
            debug!(field, "stringifying non-JSON property");
            Value::String(display.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::services::{
        DocumentLibrary,
        Embedder,
        EmbeddingError,
        GraphError,
        GraphQuery,
        LibraryError,
        Row,
    };

    struct StaticLibrary(Vec<LibraryItem>);

    #[async_trait]
    impl DocumentLibrary for StaticLibrary {
        async fn fetch_items(&self) -> Result<Vec<LibraryItem>, LibraryError> {
            Ok(self.0.clone())
        }
    }

    struct FailingLibrary;

    #[async_trait]
    impl DocumentLibrary for FailingLibrary {
        async fn fetch_items(&self) -> Result<Vec<LibraryItem>, LibraryError> {
            Err(LibraryError::Auth("bad credentials".to_string()))
        }
    }

    struct Unused;

    #[async_trait]
    impl GraphQuery for Unused {
        async fn query(
            &self,
            _statement: &str,
            _params: serde_json::Map<String, Value>,
        ) -> Result<Vec<Row>, GraphError> {
            panic!("graph should not be queried")
        }
    }

    #[async_trait]
    impl Embedder for Unused {
        async fn embed_query(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
            panic!("embedder should not be called")
        }
    }

    fn control(library: Arc<dyn DocumentLibrary>) -> SpGraphControlPlane {
        SpGraphControlPlane::new(library, Arc::new(Unused), Arc::new(Unused))
    }

    fn item(id: &str, pairs: Vec<(&str, PropertyValue)>) -> LibraryItem {
        LibraryItem::new(
            id,
            pairs.into_iter().map(|(key, value)| (key.to_string(), value)).collect(),
        )
    }

    #[test]
    fn flatten_keeps_json_and_converts_other_shapes() {
        let nested: PropertyBag = [
            ("Url".to_string(), PropertyValue::Json(json!("https://x"))),
            ("Raw".to_string(), PropertyValue::Binary(b"inner".to_vec())),
        ]
        .into_iter()
        .collect();
        let bag: PropertyBag = [
            ("Name".to_string(), PropertyValue::Json(json!("a.docx"))),
            ("Tags".to_string(), PropertyValue::Json(json!(["x", "y"]))),
            ("Link".to_string(), PropertyValue::Nested(nested)),
            ("Hash".to_string(), PropertyValue::Binary(b"\x00ab".to_vec())),
            ("Created".to_string(), PropertyValue::Opaque("2024-01-01 00:00:00".to_string())),
        ]
        .into_iter()
        .collect();

        let (record, stats) = flatten_properties(&bag);

        assert_eq!(record.get("Name"), Some(&json!("a.docx")));
        assert_eq!(record.get("Tags"), Some(&json!(["x", "y"])));
        assert_eq!(record.get("Link"), Some(&json!({"Url": "https://x", "Raw": "inner"})));
        assert_eq!(record.get("Hash"), Some(&json!("\\x00ab")));
        assert_eq!(record.get("Created"), Some(&json!("2024-01-01 00:00:00")));
        assert_eq!(
            stats,
            FlattenStats {
                nested: 1,
                binary: 2,
                stringified: 1
            }
        );
    }

    #[test]
    fn distinct_non_utf8_binaries_render_distinctly() {
        let bag: PropertyBag = [
            ("A".to_string(), PropertyValue::Binary(vec![0xff])),
            ("B".to_string(), PropertyValue::Binary(vec![0xfe])),
        ]
        .into_iter()
        .collect();

        let (record, stats) = flatten_properties(&bag);

        assert_eq!(record.get("A"), Some(&json!("\\xff")));
        assert_eq!(record.get("B"), Some(&json!("\\xfe")));
        assert_ne!(record.get("A"), record.get("B"));
        assert_eq!(stats.binary, 2);
    }

    #[tokio::test]
    async fn one_json_line_per_item() {
        let items = vec![
            item("1", vec![("Name", PropertyValue::Json(json!("a.docx")))]),
            item("2", vec![("Name", PropertyValue::Json(json!("résumé.pdf")))]),
            item("3", vec![]),
        ];
        let report = control(Arc::new(StaticLibrary(items)))
            .retrieve_metadata()
            .await
            .expect("metadata should render");

        let lines: Vec<&str> = report.text.lines().collect();
        assert_eq!(report.item_count, 3);
        assert_eq!(lines.len(), 3);
        for line in &lines {
            let parsed: Value = serde_json::from_str(line).expect("line should be JSON");
            assert!(parsed.is_object());
        }
        assert!(lines[1].contains("résumé.pdf"), "non-ASCII stays unescaped");
        assert_eq!(lines[2], "{}");
    }

    #[tokio::test]
    async fn empty_library_renders_empty_text() {
        let report = control(Arc::new(StaticLibrary(Vec::new())))
            .retrieve_metadata()
            .await
            .expect("metadata should render");
        assert_eq!(report.text, "");
        assert_eq!(report.item_count, 0);
    }

    #[tokio::test]
    async fn library_errors_propagate() {
        let err = control(Arc::new(FailingLibrary))
            .retrieve_metadata()
            .await
            .expect_err("fetch should fail");
        assert!(matches!(err, ControlError::Library(LibraryError::Auth(_))));
    }
}
