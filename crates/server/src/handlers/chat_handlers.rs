//! # Chat Route Handler
//!
//! The orchestration adapter: loads or creates the conversation, appends the
//! user turn, runs rewrite -> retrieve -> synthesize, and persists the
//! assistant turn. A retrieval failure degrades to an ungrounded answer; only
//! a synthesis failure fails the request.

use crate::{errors::AppError, state::AppState};
use axum::{extract::State, Json};
use docchat::types::MessageRole;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Deserialize)]
pub struct ChatRequest {
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub answer: String,
    /// The grounding instruction sent to the model, for auditing/display.
    pub instruction: String,
    pub references: Vec<String>,
    pub documents_count: usize,
    pub conversation_id: String,
    pub message_id: String,
}

pub async fn chat_handler(
    State(app_state): State<AppState>,
    Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    if payload.query.trim().is_empty() {
        return Err(AppError::Validation("Query must not be empty".to_string()));
    }

    // Reuse the conversation when one is given and still exists, otherwise
    // start a new one titled from the query's leading characters.
    let conversation = match &payload.conversation_id {
        Some(id) => app_state.conversations.get(id).await.ok(),
        None => None,
    };
    let conversation = match conversation {
        Some(conversation) => conversation,
        None => {
            let title = truncate_title(&payload.query, 50);
            let conversation = app_state.conversations.create(&title, None).await?;
            info!(conversation_id = %conversation.id, "Created conversation for chat turn");
            conversation
        }
    };

    app_state
        .conversations
        .append_message(&conversation.id, MessageRole::User, &payload.query)
        .await?;

    // History for retrieval excludes the turn we just appended.
    let mut history = app_state
        .conversations
        .list_messages(&conversation.id)
        .await?;
    let full_history = history.clone();
    history.pop();

    let expanded = app_state
        .rewriter
        .expand(&payload.query, app_state.config.retrieval.rewrite_count)
        .await;

    let (chunks, references) = match app_state
        .coordinator
        .retrieve(&history, &payload.query, &expanded)
        .await
    {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "Retrieval failed, answering without grounding context");
            (Vec::new(), Vec::new())
        }
    };

    // Synthesis failures are terminal for the request.
    let synthesis = app_state
        .synthesizer
        .synthesize(&chunks, &full_history)
        .await?;

    let assistant_message = app_state
        .conversations
        .append_message(&conversation.id, MessageRole::Assistant, &synthesis.answer)
        .await?;

    Ok(Json(ChatResponse {
        answer: synthesis.answer,
        instruction: synthesis.instruction,
        references,
        documents_count: chunks.len(),
        conversation_id: conversation.id,
        message_id: assistant_message.id,
    }))
}

fn truncate_title(query: &str, max_chars: usize) -> String {
    if query.chars().count() > max_chars {
        let head: String = query.chars().take(max_chars).collect();
        format!("{head}...")
    } else {
        query.to_string()
    }
}
