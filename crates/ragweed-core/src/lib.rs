//! Core contract for Ragweed document stores.
//!
//! A [`DocumentStore`] persists [`Document`]s — text content plus metadata
//! and an embedding vector — and answers point lookups, filtered scans, and
//! approximate-nearest-neighbor similarity queries. Backends (Cassandra,
//! in-memory) implement the trait; the retrieval pipeline only sees this
//! crate's types.

use std::collections::BTreeMap;
use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod memory;
pub use memory::InMemoryDocumentStore;

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

/// A document in the retrieval pipeline.
///
/// Metadata values are stored as text: backends persist them in a
/// text-to-text column, so whatever is written is exactly what comes back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Opaque identifier. Backends assign a UUID when this is empty at
    /// write time.
    pub id: String,
    /// Text content.
    pub content: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Embedding vector; must match the store's configured dimensionality
    /// when the document is written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
            embedding: None,
        }
    }

    pub fn with_metadata(
        id: impl Into<String>,
        content: impl Into<String>,
        metadata: BTreeMap<String, String>,
    ) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata,
            embedding: None,
        }
    }

    /// Add a single metadata entry.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Set the embedding vector.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// A single comparison against one metadata field.
///
/// Values compare as text, so range conditions are lexicographic. That
/// matches how backends persist metadata; callers that need numeric ranges
/// should zero-pad their values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    Eq { field: String, value: String },
    Gt { field: String, value: String },
    Gte { field: String, value: String },
    Lt { field: String, value: String },
    Lte { field: String, value: String },
    In { field: String, values: Vec<String> },
}

impl Condition {
    /// The metadata field this condition applies to.
    pub fn field(&self) -> &str {
        match self {
            Condition::Eq { field, .. }
            | Condition::Gt { field, .. }
            | Condition::Gte { field, .. }
            | Condition::Lt { field, .. }
            | Condition::Lte { field, .. }
            | Condition::In { field, .. } => field,
        }
    }

    /// Evaluate this condition against a metadata map. A missing field
    /// never matches.
    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        let Some(actual) = metadata.get(self.field()) else {
            return false;
        };
        match self {
            Condition::Eq { value, .. } => actual == value,
            Condition::Gt { value, .. } => actual.as_str() > value.as_str(),
            Condition::Gte { value, .. } => actual.as_str() >= value.as_str(),
            Condition::Lt { value, .. } => actual.as_str() < value.as_str(),
            Condition::Lte { value, .. } => actual.as_str() <= value.as_str(),
            Condition::In { values, .. } => values.iter().any(|v| v == actual),
        }
    }
}

/// A conjunction of metadata conditions.
///
/// An empty filter matches every document. Backends translate each
/// condition one-to-one into their native query syntax; this type adds no
/// semantics of its own beyond in-process evaluation via [`Filter::matches`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn gt(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Gt {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn gte(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Gte {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn lt(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Lt {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn lte(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Lte {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    /// Membership: the field's value must equal one of `values`.
    pub fn one_of(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.conditions.push(Condition::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Evaluate the whole conjunction against a metadata map.
    pub fn matches(&self, metadata: &BTreeMap<String, String>) -> bool {
        self.conditions.iter().all(|c| c.matches(metadata))
    }
}

// ---------------------------------------------------------------------------
// DuplicatePolicy
// ---------------------------------------------------------------------------

/// What to do when a written document's id already exists in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Upsert: the new document replaces the old one.
    #[default]
    Overwrite,
    /// Reject the write with [`RagweedError::Duplicate`].
    Fail,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for Ragweed document stores.
#[derive(Debug, Error)]
pub enum RagweedError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("document not found: {0}")]
    NotFound(String),
    #[error("duplicate document: {0}")]
    Duplicate(String),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("store error: {0}")]
    Store(String),
}

/// Check that an embedding matches the dimensionality a store was
/// configured with.
pub fn check_dimensions(embedding: &[f32], expected: usize) -> Result<(), RagweedError> {
    if embedding.len() != expected {
        return Err(RagweedError::Validation(format!(
            "embedding has {} dimensions, store is configured for {expected}",
            embedding.len()
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// DocumentStore trait
// ---------------------------------------------------------------------------

/// Type alias for a pinned, boxed async stream of documents.
pub type DocumentStream<'a> =
    Pin<Box<dyn Stream<Item = Result<Document, RagweedError>> + Send + 'a>>;

/// Storage backend for documents with embedding vectors.
///
/// Every call is a stateless request against the backend; implementations
/// hold no document state of their own. Ordering of scans is unspecified,
/// and similarity queries return results in descending similarity order.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// The embedding dimensionality this store was configured with.
    fn embedding_dim(&self) -> usize;

    /// Number of documents currently stored.
    async fn count_documents(&self) -> Result<u64, RagweedError>;

    /// Write (upsert) documents and return how many were written.
    ///
    /// Every embedding is validated against [`embedding_dim`] before
    /// anything is written; a single mismatch rejects the whole batch with
    /// [`RagweedError::Validation`]. Documents with an empty id are
    /// assigned a fresh UUID.
    ///
    /// [`embedding_dim`]: DocumentStore::embedding_dim
    async fn write_documents(
        &self,
        docs: Vec<Document>,
        policy: DuplicatePolicy,
    ) -> Result<usize, RagweedError>;

    /// Point lookup by id. Fails with [`RagweedError::NotFound`] when the
    /// id is absent.
    async fn get_document_by_id(&self, id: &str) -> Result<Document, RagweedError>;

    /// Look up several ids, silently skipping the ones that are absent.
    async fn get_documents_by_id(&self, ids: &[&str]) -> Result<Vec<Document>, RagweedError> {
        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get_document_by_id(id).await {
                Ok(doc) => docs.push(doc),
                Err(RagweedError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(docs)
    }

    /// Lazily stream all documents, optionally narrowed by a filter.
    ///
    /// The stream is restartable: calling this again produces a fresh scan.
    fn get_all_documents(&self, filter: Option<Filter>) -> DocumentStream<'_>;

    /// Approximate-nearest-neighbor query by embedding vector.
    ///
    /// Returns at most `top_k` documents in descending cosine-similarity
    /// order. The vector length must match the configured dimensionality.
    async fn query_by_embedding(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<Document>, RagweedError> {
        let scored = self
            .query_by_embedding_with_score(embedding, top_k, filter)
            .await?;
        Ok(scored.into_iter().map(|(doc, _)| doc).collect())
    }

    /// Like [`query_by_embedding`] but with each document's cosine
    /// similarity to the query vector.
    ///
    /// [`query_by_embedding`]: DocumentStore::query_by_embedding
    async fn query_by_embedding_with_score(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<(Document, f32)>, RagweedError>;

    /// Delete documents by id and return how many actually existed.
    /// Absent ids are not an error.
    async fn delete_documents(&self, ids: &[&str]) -> Result<u64, RagweedError>;

    /// Delete every document matching the filter and return the count.
    async fn delete_by_filter(&self, filter: &Filter) -> Result<u64, RagweedError>;

    /// Remove all documents from the store.
    async fn clear(&self) -> Result<(), RagweedError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn document_builders() {
        let doc = Document::new("d1", "hello")
            .with_meta("lang", "en")
            .with_embedding(vec![0.1, 0.2]);
        assert_eq!(doc.id, "d1");
        assert_eq!(doc.content, "hello");
        assert_eq!(doc.metadata.get("lang").map(String::as_str), Some("en"));
        assert_eq!(doc.embedding, Some(vec![0.1, 0.2]));
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = Filter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&BTreeMap::new()));
        assert!(filter.matches(&meta(&[("a", "b")])));
    }

    #[test]
    fn eq_condition() {
        let filter = Filter::new().eq("genre", "fiction");
        assert!(filter.matches(&meta(&[("genre", "fiction")])));
        assert!(!filter.matches(&meta(&[("genre", "poetry")])));
        // Missing field never matches.
        assert!(!filter.matches(&BTreeMap::new()));
    }

    #[test]
    fn range_conditions_are_lexicographic() {
        let filter = Filter::new().gte("year", "2000").lt("year", "2020");
        assert!(filter.matches(&meta(&[("year", "2010")])));
        assert!(filter.matches(&meta(&[("year", "2000")])));
        assert!(!filter.matches(&meta(&[("year", "2020")])));
        assert!(!filter.matches(&meta(&[("year", "1999")])));
    }

    #[test]
    fn membership_condition() {
        let filter = Filter::new().one_of("lang", ["en", "de"]);
        assert!(filter.matches(&meta(&[("lang", "de")])));
        assert!(!filter.matches(&meta(&[("lang", "fr")])));
    }

    #[test]
    fn conjunction_requires_all_conditions() {
        let filter = Filter::new().eq("genre", "fiction").gt("year", "2000");
        assert!(filter.matches(&meta(&[("genre", "fiction"), ("year", "2005")])));
        assert!(!filter.matches(&meta(&[("genre", "fiction"), ("year", "1995")])));
        assert!(!filter.matches(&meta(&[("year", "2005")])));
    }

    #[test]
    fn check_dimensions_rejects_mismatch() {
        assert!(check_dimensions(&[0.0; 4], 4).is_ok());
        let err = check_dimensions(&[0.0; 3], 4).unwrap_err();
        assert!(matches!(err, RagweedError::Validation(_)));
    }
}
