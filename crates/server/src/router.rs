use super::{handlers, state::AppState};
use axum::extract::DefaultBodyLimit;
use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

/// Creates the Axum router with all the application routes.
pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/chat", post(handlers::chat_handler))
        .route(
            "/documents/upload",
            post(handlers::upload_document_handler)
                .layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
        .route("/documents", get(handlers::list_documents_handler))
        .route("/documents/{id}", delete(handlers::delete_document_handler))
        .route(
            "/documents/{id}/toggle",
            post(handlers::toggle_document_handler),
        )
        .route(
            "/conversations",
            post(handlers::create_conversation_handler).get(handlers::list_conversations_handler),
        )
        .route(
            "/conversations/{id}",
            get(handlers::get_conversation_handler).delete(handlers::delete_conversation_handler),
        )
        .route(
            "/conversations/{id}/title",
            put(handlers::update_conversation_title_handler),
        )
        .route(
            "/conversations/{id}/messages",
            get(handlers::list_messages_handler),
        )
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
}
