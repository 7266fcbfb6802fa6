use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    check_dimensions, Document, DocumentStore, DocumentStream, DuplicatePolicy, Filter,
    RagweedError,
};

/// In-memory [`DocumentStore`] using local cosine similarity.
///
/// Reference backend for tests and small pipelines. It enforces the same
/// validation and duplicate-policy semantics as the database-backed stores,
/// so contract tests written against it transfer directly.
pub struct InMemoryDocumentStore {
    dim: usize,
    entries: RwLock<HashMap<String, Document>>,
}

impl InMemoryDocumentStore {
    /// Create an empty store for embeddings of the given dimensionality.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Create a store pre-populated with documents.
    pub async fn from_documents(
        dim: usize,
        documents: Vec<Document>,
    ) -> Result<Self, RagweedError> {
        let store = Self::new(dim);
        store
            .write_documents(documents, DuplicatePolicy::Overwrite)
            .await?;
        Ok(store)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    fn embedding_dim(&self) -> usize {
        self.dim
    }

    async fn count_documents(&self) -> Result<u64, RagweedError> {
        Ok(self.entries.read().await.len() as u64)
    }

    async fn write_documents(
        &self,
        docs: Vec<Document>,
        policy: DuplicatePolicy,
    ) -> Result<usize, RagweedError> {
        // Validate the whole batch before touching the map.
        for doc in &docs {
            let embedding = doc.embedding.as_deref().ok_or_else(|| {
                RagweedError::Validation(format!("document '{}' has no embedding", doc.id))
            })?;
            check_dimensions(embedding, self.dim)?;
        }

        let mut entries = self.entries.write().await;
        if policy == DuplicatePolicy::Fail {
            let mut seen = HashSet::new();
            for doc in &docs {
                if doc.id.is_empty() {
                    continue;
                }
                if entries.contains_key(&doc.id) || !seen.insert(doc.id.as_str()) {
                    return Err(RagweedError::Duplicate(doc.id.clone()));
                }
            }
        }

        let count = docs.len();
        for mut doc in docs {
            if doc.id.is_empty() {
                doc.id = Uuid::new_v4().to_string();
            }
            entries.insert(doc.id.clone(), doc);
        }
        Ok(count)
    }

    async fn get_document_by_id(&self, id: &str) -> Result<Document, RagweedError> {
        self.entries
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RagweedError::NotFound(id.to_string()))
    }

    fn get_all_documents(&self, filter: Option<Filter>) -> DocumentStream<'_> {
        Box::pin(async_stream::stream! {
            let snapshot: Vec<Document> = {
                let entries = self.entries.read().await;
                entries
                    .values()
                    .filter(|doc| match &filter {
                        Some(f) => f.matches(&doc.metadata),
                        None => true,
                    })
                    .cloned()
                    .collect()
            };
            for doc in snapshot {
                yield Ok(doc);
            }
        })
    }

    async fn query_by_embedding_with_score(
        &self,
        embedding: &[f32],
        top_k: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<(Document, f32)>, RagweedError> {
        check_dimensions(embedding, self.dim)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        let mut scored: Vec<(Document, f32)> = entries
            .values()
            .filter(|doc| filter.is_none_or(|f| f.matches(&doc.metadata)))
            .map(|doc| {
                let score = doc
                    .embedding
                    .as_deref()
                    .map(|e| cosine_similarity(embedding, e))
                    .unwrap_or(0.0);
                (doc.clone(), score)
            })
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn delete_documents(&self, ids: &[&str]) -> Result<u64, RagweedError> {
        let mut entries = self.entries.write().await;
        let mut deleted = 0;
        for id in ids {
            if entries.remove(*id).is_some() {
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    async fn delete_by_filter(&self, filter: &Filter) -> Result<u64, RagweedError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, doc| !filter.matches(&doc.metadata));
        Ok((before - entries.len()) as u64)
    }

    async fn clear(&self) -> Result<(), RagweedError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

/// Cosine similarity between two vectors of equal length.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
