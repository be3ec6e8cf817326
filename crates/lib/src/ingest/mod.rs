//! # Ingestion Pipeline
//!
//! Turns an uploaded file into indexed, registered chunks, idempotently.
//! Vector chunks are written before the registry row; any failure after a
//! partial upsert is compensated with a best-effort delete-by-document, so
//! from the caller's perspective ingestion either fully happens or leaves
//! nothing behind.

pub mod chunking;

pub use chunking::{ChunkingError, ChunkingParams};

use crate::{
    errors::GatewayError,
    providers::{
        embedding::EmbeddingClient,
        vector::{IndexError, VectorIndex},
    },
    registry::{DocumentRegistry, NewDocument, RegisterOutcome, RegistryError},
    types::{ChunkRecord, DocumentRecord},
};
use docchat_extract::{extractor_for, normalize_whitespace, ExtractError};
use futures::future::join_all;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    #[error("Text extraction failed: {0}")]
    Extraction(#[from] ExtractError),
    #[error("Failed to stage uploaded file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Embedding generation failed: {0}")]
    Embedding(GatewayError),
    #[error("Vector index operation failed: {0}")]
    Index(IndexError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// The result of an ingestion attempt.
#[derive(Debug)]
pub enum IngestOutcome {
    Created(DocumentRecord),
    /// Byte-identical content was ingested before; nothing was written.
    AlreadyExists { document_id: String },
}

/// Fixed settings for the pipeline, constructed once at startup.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub collection: String,
    pub dense_dim: usize,
    pub upload_dir: PathBuf,
    pub allowed_extensions: Vec<String>,
}

pub struct IngestionPipeline {
    registry: DocumentRegistry,
    index: Arc<dyn VectorIndex>,
    embedding: EmbeddingClient,
    settings: IngestionSettings,
    /// Serializes collection creation: concurrent ingestions must not race on
    /// create-if-absent. Searches never take this lock.
    collection_guard: tokio::sync::Mutex<()>,
}

impl IngestionPipeline {
    pub fn new(
        registry: DocumentRegistry,
        index: Arc<dyn VectorIndex>,
        embedding: EmbeddingClient,
        settings: IngestionSettings,
    ) -> Self {
        Self {
            registry,
            index,
            embedding,
            settings,
            collection_guard: tokio::sync::Mutex::new(()),
        }
    }

    /// Runs the full ingestion pipeline for one uploaded file.
    pub async fn ingest(
        &self,
        bytes: &[u8],
        file_name: &str,
        params: &ChunkingParams,
        embedding_model: &str,
    ) -> Result<IngestOutcome, IngestError> {
        params.validate()?;

        let file_type = file_extension(file_name)
            .ok_or_else(|| IngestError::UnsupportedFileType(file_name.to_string()))?;
        if !self.settings.allowed_extensions.contains(&file_type) {
            return Err(IngestError::UnsupportedFileType(file_type));
        }

        // Stage the bytes and compute the content digest before touching any
        // durable store.
        std::fs::create_dir_all(&self.settings.upload_dir)?;
        let mut staged = NamedTempFile::new_in(&self.settings.upload_dir)?;
        staged.write_all(bytes)?;
        let file_hash = format!("{:x}", md5::compute(bytes));

        // Fast-path idempotency check. The race between this read and the
        // final insert is closed by the registry's UNIQUE(file_hash)
        // constraint below.
        if let Some(existing) = self.registry.find_by_hash(&file_hash).await? {
            info!(file_name = %file_name, document_id = %existing.id, "Identical content already ingested, skipping");
            return Ok(IngestOutcome::AlreadyExists {
                document_id: existing.id,
            });
        }

        let extractor = extractor_for(&file_type)
            .ok_or_else(|| IngestError::UnsupportedFileType(file_type.clone()))?;
        let text = normalize_whitespace(&extractor.extract(staged.path())?);

        let chunks = chunking::split_text(&text, params)?;
        info!(file_name = %file_name, chunk_count = chunks.len(), "Split document into chunks");

        {
            let _guard = self.collection_guard.lock().await;
            self.index
                .ensure_collection(&self.settings.collection, self.settings.dense_dim)
                .await
                .map_err(IngestError::Index)?;
        }

        // Embedding happens before any vector write, so a failure here needs
        // no compensation.
        let vectors = join_all(
            chunks
                .iter()
                .map(|chunk| self.embedding.embed_with_model(embedding_model, chunk)),
        )
        .await
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(IngestError::Embedding)?;

        let document_id = Uuid::new_v4().to_string();
        let records: Vec<ChunkRecord> = chunks
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, dense_vector))| ChunkRecord {
                chunk_id: format!("{document_id}_{i}"),
                document_id: document_id.clone(),
                document_name: file_name.to_string(),
                text,
                dense_vector,
            })
            .collect();
        let chunk_count = records.len();

        if let Err(e) = self.index.upsert(&self.settings.collection, records).await {
            // The batch may have landed partially index-side; sweep whatever
            // made it in before surfacing the error.
            self.compensate_chunks(&document_id).await;
            return Err(IngestError::Index(e));
        }

        match self
            .registry
            .register(NewDocument {
                id: &document_id,
                file_name,
                file_size: bytes.len() as i64,
                file_type: &file_type,
                file_hash: &file_hash,
            })
            .await
        {
            Ok(RegisterOutcome::Created(record)) => {
                // Keep the original bytes next to the registry row.
                let final_path = self
                    .settings
                    .upload_dir
                    .join(format!("{document_id}_{file_name}"));
                if let Err(e) = staged.persist(&final_path) {
                    warn!(error = %e.error, "Failed to persist uploaded file, continuing");
                }
                info!(document_id = %document_id, chunk_count, "Ingestion complete");
                Ok(IngestOutcome::Created(record))
            }
            Ok(RegisterOutcome::DuplicateHash { existing_id }) => {
                // A concurrent identical upload won the registration race. Our
                // chunks are orphans; remove them before reporting.
                self.compensate_chunks(&document_id).await;
                Ok(IngestOutcome::AlreadyExists {
                    document_id: existing_id,
                })
            }
            Err(e) => {
                self.compensate_chunks(&document_id).await;
                Err(e.into())
            }
        }
    }

    /// Deletes a document: its chunks first, then the registry row. An index
    /// failure aborts the deletion so the registry row keeps pointing at the
    /// still-present chunks.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool, IngestError> {
        self.index
            .delete_by_document(&self.settings.collection, document_id)
            .await
            .map_err(IngestError::Index)?;
        Ok(self.registry.delete(document_id).await?)
    }

    /// Best-effort removal of chunks written before a failed registration.
    async fn compensate_chunks(&self, document_id: &str) {
        if let Err(e) = self
            .index
            .delete_by_document(&self.settings.collection, document_id)
            .await
        {
            warn!(document_id = %document_id, error = %e, "Failed to compensate orphaned chunks");
        }
    }
}

fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
}
