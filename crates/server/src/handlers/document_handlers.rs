//! # Document Route Handlers

use crate::{errors::AppError, state::AppState};
use axum::{
    extract::{Multipart, Path, Query, State},
    Json,
};
use docchat::ingest::{ChunkingParams, IngestOutcome};
use docchat::types::DocumentRecord;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::conversation_handlers::ListParams;

#[derive(Serialize)]
pub struct UploadResponse {
    pub document: DocumentRecord,
    pub already_existed: bool,
}

/// Handler for `POST /documents/upload`.
///
/// Accepts a multipart form with a `file` part and optional `chunk_size`,
/// `overlap_size` and `embedding_model` fields; missing fields fall back to
/// the server's configured defaults.
pub async fn upload_document_handler(
    State(app_state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file_bytes: Option<Vec<u8>> = None;
    let mut file_name: Option<String> = None;
    let mut chunk_size = app_state.config.ingestion.chunk_size;
    let mut overlap_size = app_state.config.ingestion.overlap_size;
    let mut embedding_model = app_state.config.embedding.model_name.clone();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "file" => {
                file_name = field.file_name().map(str::to_string);
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?
                        .to_vec(),
                );
            }
            "chunk_size" => {
                let text = field.text().await.unwrap_or_default();
                chunk_size = text
                    .parse()
                    .map_err(|_| AppError::Validation(format!("Invalid chunk_size: {text}")))?;
            }
            "overlap_size" => {
                let text = field.text().await.unwrap_or_default();
                overlap_size = text
                    .parse()
                    .map_err(|_| AppError::Validation(format!("Invalid overlap_size: {text}")))?;
            }
            "embedding_model" => {
                embedding_model = field.text().await.unwrap_or(embedding_model);
            }
            _ => {}
        }
    }

    let file_bytes =
        file_bytes.ok_or_else(|| AppError::Validation("Missing 'file' part".to_string()))?;
    let file_name =
        file_name.ok_or_else(|| AppError::Validation("Upload has no file name".to_string()))?;

    info!(file_name = %file_name, size = file_bytes.len(), "Received document upload");

    let outcome = app_state
        .pipeline
        .ingest(
            &file_bytes,
            &file_name,
            &ChunkingParams {
                chunk_size,
                overlap_size,
            },
            &embedding_model,
        )
        .await?;

    match outcome {
        IngestOutcome::Created(document) => Ok(Json(UploadResponse {
            document,
            already_existed: false,
        })),
        IngestOutcome::AlreadyExists { document_id } => {
            let document = app_state.registry.get(&document_id).await?;
            Ok(Json(UploadResponse {
                document,
                already_existed: true,
            }))
        }
    }
}

pub async fn list_documents_handler(
    State(app_state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<DocumentRecord>>, AppError> {
    Ok(Json(
        app_state.registry.list(params.limit, params.offset).await?,
    ))
}

pub async fn delete_document_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = app_state.pipeline.delete_document(&id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("Document not found: {id}")));
    }
    // Drop any stale disabled-set membership for the removed document.
    app_state.disabled.forget(&id).await?;
    info!(document_id = %id, "Deleted document");
    Ok(Json(json!({ "message": "Document deleted" })))
}

#[derive(Serialize)]
pub struct ToggleResponse {
    pub document_id: String,
    pub disabled: bool,
}

pub async fn toggle_document_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ToggleResponse>, AppError> {
    let disabled = app_state.disabled.toggle(&id).await?;
    Ok(Json(ToggleResponse {
        document_id: id,
        disabled,
    }))
}
