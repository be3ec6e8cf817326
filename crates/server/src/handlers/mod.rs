//! # API Route Handlers
//!
//! Organizes the Axum route handlers for `docchat-server`. Each handler is a
//! thin adapter over the library operations; no pipeline logic lives here.

pub mod chat_handlers;
pub mod conversation_handlers;
pub mod document_handlers;

pub use chat_handlers::*;
pub use conversation_handlers::*;
pub use document_handlers::*;

/// The root handler.
pub async fn root() -> &'static str {
    "docchat server is running."
}

/// The health check handler.
pub async fn health_check() -> &'static str {
    "OK"
}
