// Retriever contract and in-memory snapshot index

use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chunk::ContextChunk;
use crate::ranking::HybridScorer;

/// Retrieval failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    /// No documents have been ingested
    #[error("no documents indexed")]
    IndexEmpty,

    /// The backing store could not be queried
    #[error("retriever unavailable: {message}")]
    Unavailable {
        /// Underlying failure description
        message: String,
    },
}

impl RetrievalError {
    /// Create an unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        RetrievalError::Unavailable {
            message: message.into(),
        }
    }

    /// Whether retrying later may succeed
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RetrievalError::Unavailable { .. })
    }

    /// Hint for the operator
    pub fn suggestion(&self) -> &'static str {
        match self {
            RetrievalError::IndexEmpty => "Upload tender documents before asking questions",
            RetrievalError::Unavailable { .. } => "Check that the document store is reachable",
        }
    }
}

/// Passage retrieval collaborator.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` chunks for `query`, best first.
    ///
    /// May return fewer than `k`. Fails with [`RetrievalError::IndexEmpty`]
    /// when nothing has been ingested.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ContextChunk>, RetrievalError>;
}

/// Counts describing one index snapshot
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexStats {
    /// Distinct source documents
    pub documents: usize,
    /// Indexed chunks
    pub chunks: usize,
    /// Source document names, sorted
    pub sources: Vec<String>,
}

/// Volatile lexical index.
///
/// Readers clone the current `Arc` snapshot; ingestion builds a new vector and
/// swaps it in, so a retrieval never observes a partial update.
#[derive(Debug, Default)]
pub struct InMemoryIndex {
    snapshot: RwLock<Arc<Vec<ContextChunk>>>,
    scorer: HybridScorer,
}

impl InMemoryIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index with a custom scorer
    pub fn with_scorer(scorer: HybridScorer) -> Self {
        Self {
            snapshot: RwLock::default(),
            scorer,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Vec<ContextChunk>> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Add chunks; chunks already present (same id) are skipped.
    ///
    /// Returns the number of chunks added.
    pub fn ingest(&self, chunks: Vec<ContextChunk>) -> usize {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        let mut seen: HashSet<String> = guard.iter().map(|c| c.chunk_id.clone()).collect();
        let mut next: Vec<ContextChunk> = (**guard).clone();
        let before = next.len();
        for chunk in chunks {
            if seen.insert(chunk.chunk_id.clone()) {
                next.push(chunk);
            }
        }
        let added = next.len() - before;
        *guard = Arc::new(next);
        tracing::info!(added, total = guard.len(), "documents ingested");
        added
    }

    /// Drop every chunk
    pub fn clear(&self) {
        let mut guard = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(Vec::new());
        tracing::info!("document index cleared");
    }

    /// Describe the current snapshot
    pub fn stats(&self) -> IndexStats {
        let snapshot = self.snapshot();
        let sources: BTreeSet<&str> = snapshot.iter().map(|c| c.source_document.as_str()).collect();
        IndexStats {
            documents: sources.len(),
            chunks: snapshot.len(),
            sources: sources.into_iter().map(str::to_string).collect(),
        }
    }

    /// True when nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    fn rank(&self, snapshot: &[ContextChunk], query: &str, k: usize) -> Vec<ContextChunk> {
        let mut scored: Vec<(usize, f32)> = snapshot
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, self.scorer.score(query, &chunk.content).overall))
            .collect();
        // stable: ties keep ingestion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| snapshot[i].clone().with_retrieval_score(score))
            .collect()
    }
}

#[async_trait]
impl Retriever for InMemoryIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ContextChunk>, RetrievalError> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Err(RetrievalError::IndexEmpty);
        }
        let results = self.rank(&snapshot, query, k);
        tracing::debug!(k, returned = results.len(), "retrieval complete");
        Ok(results)
    }
}

#[async_trait]
impl<T: Retriever + ?Sized> Retriever for Arc<T> {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<ContextChunk>, RetrievalError> {
        (**self).retrieve(query, k).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::Chunker;

    fn seeded() -> InMemoryIndex {
        let index = InMemoryIndex::new();
        index.ingest(Chunker::default().split_pages(
            "pliego.pdf",
            &[
                "La empresa deberá presentar antecedentes.",
                "El plazo de entrega es de 90 días corridos.",
                "La garantía de cumplimiento es del 10% del monto.",
            ],
        ));
        index
    }

    #[tokio::test]
    async fn empty_index_fails() {
        let err = InMemoryIndex::new().retrieve("plazo", 5).await.expect_err("empty");
        assert_eq!(err, RetrievalError::IndexEmpty);
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn best_match_first_and_bounded_by_k() {
        let index = seeded();
        let results = index.retrieve("¿Cuál es el plazo de entrega?", 2).await.expect("results");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].page_number, 2);
        assert!(results[0].retrieval_score > results[1].retrieval_score);
        assert!(results.iter().all(|c| c.relevance_score.is_none()));
    }

    #[tokio::test]
    async fn fewer_than_k_is_fine() {
        let results = seeded().retrieve("garantía", 10).await.expect("results");
        assert_eq!(results.len(), 3);
    }

    #[test]
    fn ingest_dedups_and_clear_empties() {
        let index = seeded();
        let again = Chunker::default().split_pages("pliego.pdf", &["La empresa deberá presentar antecedentes."]);
        assert_eq!(index.ingest(again), 0);
        let stats = index.stats();
        assert_eq!(stats.chunks, 3);
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.sources, vec!["pliego.pdf".to_string()]);

        let before = index.snapshot();
        index.clear();
        assert!(index.is_empty());
        assert_eq!(before.len(), 3);
    }
}
