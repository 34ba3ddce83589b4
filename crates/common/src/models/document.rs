//! Retrieved document unit
//!
//! Identity is structural: two documents are the same entity iff their
//! content and their metadata pairs match exactly. Metadata lives in a
//! `BTreeMap`, so the order in which pairs were produced never matters.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordered retriever output for one query, rank 1 first
pub type RankedList = Vec<Document>;

/// Scalar metadata value attached to a document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl PartialEq for MetadataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (MetadataValue::Bool(a), MetadataValue::Bool(b)) => a == b,
            (MetadataValue::Int(a), MetadataValue::Int(b)) => a == b,
            // Bitwise so that identity stays reflexive for NaN
            (MetadataValue::Float(a), MetadataValue::Float(b)) => a.to_bits() == b.to_bits(),
            (MetadataValue::Text(a), MetadataValue::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for MetadataValue {}

impl Hash for MetadataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            MetadataValue::Bool(v) => v.hash(state),
            MetadataValue::Int(v) => v.hash(state),
            MetadataValue::Float(v) => v.to_bits().hash(state),
            MetadataValue::Text(v) => v.hash(state),
        }
    }
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(v) => write!(f, "{}", v),
            MetadataValue::Int(v) => write!(f, "{}", v),
            MetadataValue::Float(v) => write!(f, "{}", v),
            MetadataValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::Text(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// A chunk of corpus text as produced by ingestion and returned by retrievers
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document {
    content: String,

    #[serde(default)]
    metadata: BTreeMap<String, MetadataValue>,
}

impl Document {
    /// Create a document without metadata
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    /// Builder-style metadata attachment
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn metadata(&self) -> &BTreeMap<String, MetadataValue> {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_identity_ignores_metadata_order() {
        let a = Document::new("Section 15 conditions")
            .with_metadata("source", "special-marriage-act.pdf")
            .with_metadata("page", 4_i64);
        let b = Document::new("Section 15 conditions")
            .with_metadata("page", 4_i64)
            .with_metadata("source", "special-marriage-act.pdf");

        assert_eq!(a, b);

        let set: HashSet<Document> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_identity_distinguishes_metadata() {
        let a = Document::new("Section 24").with_metadata("page", 7_i64);
        let b = Document::new("Section 24").with_metadata("page", 8_i64);
        let c = Document::new("Section 24").with_metadata("page", "7");

        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_deserialize_scalar_metadata() {
        let doc: Document = serde_json::from_str(
            r#"{"content": "Void marriages", "metadata": {"page": 12, "score": 0.5, "source": "act.pdf", "annexure": false}}"#,
        )
        .unwrap();

        assert_eq!(doc.content(), "Void marriages");
        assert_eq!(doc.metadata().get("page"), Some(&MetadataValue::Int(12)));
        assert_eq!(doc.metadata().get("score"), Some(&MetadataValue::Float(0.5)));
        assert_eq!(doc.metadata().get("annexure"), Some(&MetadataValue::Bool(false)));
    }

    #[test]
    fn test_missing_metadata_defaults_to_empty() {
        let doc: Document = serde_json::from_str(r#"{"content": "Registration"}"#).unwrap();
        assert!(doc.metadata().is_empty());
    }
}
