//! Shared document types flowing between ingestion, storage, and retrieval.

use std::collections::BTreeMap;

/// A unit of text content plus flat string metadata.
///
/// Documents are immutable once constructed. Chunks produced by the splitter reuse the same
/// shape and inherit the parent document's metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Raw text content.
    pub content: String,
    /// String metadata attached to the content, ordered for deterministic rendering.
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Construct a document without metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Construct a document carrying metadata.
    pub fn with_metadata(
        content: impl Into<String>,
        metadata: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            content: content.into(),
            metadata: metadata.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Document;

    #[test]
    fn with_metadata_collects_pairs_in_key_order() {
        let document = Document::with_metadata(
            "body",
            [
                ("zulu".to_string(), "1".to_string()),
                ("alpha".to_string(), "2".to_string()),
            ],
        );
        let keys: Vec<_> = document.metadata.keys().cloned().collect();
        assert_eq!(keys, vec!["alpha", "zulu"]);
    }
}
