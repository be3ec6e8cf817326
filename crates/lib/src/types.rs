//! Shared data types for the conversation log, the document registry and the
//! retrieval pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A persisted conversation. `metadata` is an open key-value object accepted
/// at creation and returned verbatim; it is never re-interpreted downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// The speaker of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "system" => Some(MessageRole::System),
            _ => None,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable turn in a conversation. `sequence` is unique and strictly
/// increasing per conversation, starting at 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub sequence: i64,
    pub created_at: String,
}

/// Whether a document participates in retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Enabled,
    Disabled,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Enabled => "enabled",
            DocumentStatus::Disabled => "disabled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "enabled" => Some(DocumentStatus::Enabled),
            "disabled" => Some(DocumentStatus::Disabled),
            _ => None,
        }
    }
}

/// A registry row for an ingested document. `file_hash` is unique across the
/// registry; re-uploading identical bytes never creates a second row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub file_name: String,
    pub file_size: i64,
    pub file_type: String,
    pub file_hash: String,
    pub status: DocumentStatus,
    pub upload_time: String,
}

/// A chunk as stored in the vector index. The sparse signal is derived
/// index-side from `text`, so only the dense vector travels with the record.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub text: String,
    pub dense_vector: Vec<f32>,
}

/// A single hybrid-search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub score: f64,
    pub document_id: String,
    pub document_name: String,
}

/// A chunk that survived filtering and judging, ready for synthesis.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub score: f64,
    pub document_name: String,
}
