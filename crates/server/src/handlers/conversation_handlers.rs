//! # Conversation Route Handlers

use crate::{errors::AppError, state::AppState};
use axum::{
    extract::{Path, Query, State},
    Json,
};
use docchat::types::{Conversation, Message};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub title: String,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Explicit creation timestamp, used when importing conversations.
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_limit() -> u32 {
    100
}

pub async fn create_conversation_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<CreateConversationRequest>,
) -> Result<Json<Conversation>, AppError> {
    let conversation = match &payload.created_at {
        Some(created_at) => {
            app_state
                .conversations
                .create_with_timestamp(&payload.title, payload.metadata.clone(), created_at)
                .await?
        }
        None => {
            app_state
                .conversations
                .create(&payload.title, payload.metadata.clone())
                .await?
        }
    };
    Ok(Json(conversation))
}

pub async fn list_conversations_handler(
    State(app_state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Conversation>>, AppError> {
    let conversations = app_state
        .conversations
        .list(params.limit, params.offset)
        .await?;
    Ok(Json(conversations))
}

pub async fn get_conversation_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(app_state.conversations.get(&id).await?))
}

pub async fn delete_conversation_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let deleted = app_state.conversations.delete(&id).await?;
    if !deleted {
        return Err(AppError::NotFound(format!("Conversation not found: {id}")));
    }
    info!(conversation_id = %id, "Deleted conversation");
    Ok(Json(json!({ "message": "Conversation deleted" })))
}

pub async fn list_messages_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, AppError> {
    // Surface a 404 for unknown conversations rather than an empty list.
    app_state.conversations.get(&id).await?;
    Ok(Json(app_state.conversations.list_messages(&id).await?))
}

#[derive(Deserialize)]
pub struct UpdateTitleRequest {
    pub title: String,
}

pub async fn update_conversation_title_handler(
    State(app_state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateTitleRequest>,
) -> Result<Json<Conversation>, AppError> {
    Ok(Json(
        app_state
            .conversations
            .update_title(&id, &payload.title)
            .await?,
    ))
}
