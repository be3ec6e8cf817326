pub mod rest;

use crate::types::{ChunkRecord, ScoredChunk};
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Errors surfaced by the vector index.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Vector index is unreachable: {0}")]
    Unavailable(reqwest::Error),
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),
    #[error("Vector index returned an error: {0}")]
    Api(String),
    #[error("Failed to deserialize vector index response: {0}")]
    Deserialization(reqwest::Error),
    #[error("Reranker is not configured")]
    RerankerUnconfigured,
}

/// The contract the pipeline requires of a hybrid chunk store.
///
/// The index combines a dense (semantic) and a sparse (lexical) signal with
/// its own ranker; chunks are only ever inserted or deleted as a whole
/// document group, never mutated.
#[async_trait]
pub trait VectorIndex: Send + Sync + Debug {
    /// Creates the collection if it does not exist. Idempotent. The vector
    /// dimensionality is fixed per embedding model.
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<(), IndexError>;

    /// Inserts a batch of chunks into the collection.
    async fn upsert(&self, collection: &str, chunks: Vec<ChunkRecord>) -> Result<(), IndexError>;

    /// Removes every chunk belonging to a document.
    async fn delete_by_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<(), IndexError>;

    /// Runs one hybrid (dense + sparse) search, bounded to `limit` results.
    async fn hybrid_search(
        &self,
        collection: &str,
        query: &str,
        query_vector: Vec<f32>,
        limit: u32,
    ) -> Result<Vec<ScoredChunk>, IndexError>;

    /// Second-pass scoring of candidate texts against the query. Returns
    /// `(text, score)` pairs, best first, truncated to `limit`.
    async fn rerank(
        &self,
        query: &str,
        texts: Vec<String>,
        limit: u32,
    ) -> Result<Vec<(String, f64)>, IndexError>;
}
