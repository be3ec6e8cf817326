use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use docchat::{
    conversations::ConversationError,
    disabled::DisabledSetError,
    errors::GatewayError,
    ingest::IngestError,
    registry::RegistryError,
    retrieval::RetrievalError,
};
use serde_json::json;
use tracing::error;

/// A custom error type for the server application.
///
/// Maps the library's error taxonomy onto HTTP responses: validation to 400,
/// not-found to 404, upstream failures to 502, everything else to 500.
pub enum AppError {
    Validation(String),
    NotFound(String),
    Upstream(String),
    Internal(anyhow::Error),
}

impl From<ConversationError> for AppError {
    fn from(err: ConversationError) -> Self {
        match err {
            ConversationError::NotFound(id) => {
                AppError::NotFound(format!("Conversation not found: {id}"))
            }
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound(id) => {
                AppError::NotFound(format!("Document not found: {id}"))
            }
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<IngestError> for AppError {
    fn from(err: IngestError) -> Self {
        match err {
            IngestError::UnsupportedFileType(t) => {
                AppError::Validation(format!("Unsupported file type: {t}"))
            }
            IngestError::Chunking(e) => AppError::Validation(e.to_string()),
            IngestError::Extraction(e) => {
                AppError::Validation(format!("Failed to process file: {e}"))
            }
            IngestError::Embedding(e) => AppError::Upstream(e.to_string()),
            IngestError::Index(e) => AppError::Upstream(e.to_string()),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<DisabledSetError> for AppError {
    fn from(err: DisabledSetError) -> Self {
        match err {
            DisabledSetError::Registry(RegistryError::NotFound(id)) => {
                AppError::NotFound(format!("Document not found: {id}"))
            }
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        AppError::Internal(err.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status_code, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Upstream(msg) => {
                error!("Upstream failure: {msg}");
                (StatusCode::BAD_GATEWAY, msg)
            }
            AppError::Internal(err) => {
                error!("Internal server error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred.".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status_code, body).into_response()
    }
}
