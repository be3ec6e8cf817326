//! # Conversation Store
//!
//! A durable log of conversations and their ordered messages. Message order is
//! the one strict ordering requirement in the system: `sequence` numbers are
//! assigned by a single atomic insert-select so concurrent appends to the same
//! conversation can never collide or go backwards.

use crate::{
    providers::db::sqlite::SqliteProvider,
    types::{Conversation, Message, MessageRole},
};
use chrono::Utc;
use thiserror::Error;
use tracing::info;
use turso::{params, Value as TursoValue};
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ConversationError {
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),
    #[error("Conversation not found: {0}")]
    NotFound(String),
}

/// Storage-backed operations over conversations and their messages.
#[derive(Clone, Debug)]
pub struct ConversationStore {
    provider: SqliteProvider,
}

impl ConversationStore {
    pub fn new(provider: SqliteProvider) -> Self {
        Self { provider }
    }

    /// Creates a conversation with the current timestamp.
    pub async fn create(
        &self,
        title: &str,
        metadata: Option<serde_json::Value>,
    ) -> Result<Conversation, ConversationError> {
        let now = Utc::now().to_rfc3339();
        self.insert_conversation(title, metadata, &now).await
    }

    /// Creates a conversation with an explicit `created_at`, the backdating
    /// path used when importing conversations from elsewhere.
    pub async fn create_with_timestamp(
        &self,
        title: &str,
        metadata: Option<serde_json::Value>,
        created_at: &str,
    ) -> Result<Conversation, ConversationError> {
        self.insert_conversation(title, metadata, created_at).await
    }

    async fn insert_conversation(
        &self,
        title: &str,
        metadata: Option<serde_json::Value>,
        created_at: &str,
    ) -> Result<Conversation, ConversationError> {
        let conn = self.provider.db.connect()?;
        let id = Uuid::new_v4().to_string();
        let metadata_text = metadata.as_ref().map(|m| m.to_string());

        conn.execute(
            "INSERT INTO conversations (id, title, created_at, updated_at, metadata)
             VALUES (?, ?, ?, ?, ?)",
            params![
                id.clone(),
                title.to_string(),
                created_at.to_string(),
                created_at.to_string(),
                metadata_text
            ],
        )
        .await?;

        info!(conversation_id = %id, "Created conversation");
        Ok(Conversation {
            id,
            title: title.to_string(),
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            metadata,
        })
    }

    pub async fn get(&self, id: &str) -> Result<Conversation, ConversationError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, title, created_at, updated_at, metadata
                 FROM conversations WHERE id = ?",
                params![id.to_string()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(conversation_from_row(&row)?),
            None => Err(ConversationError::NotFound(id.to_string())),
        }
    }

    /// Lists conversations, newest first.
    pub async fn list(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Conversation>, ConversationError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, title, created_at, updated_at, metadata
                 FROM conversations ORDER BY created_at DESC LIMIT ? OFFSET ?",
                params![limit as i64, offset as i64],
            )
            .await?;

        let mut conversations = Vec::new();
        while let Some(row) = rows.next().await? {
            conversations.push(conversation_from_row(&row)?);
        }
        Ok(conversations)
    }

    /// Deletes a conversation and all of its messages. Messages go first so a
    /// failure between the two statements can never orphan them.
    pub async fn delete(&self, id: &str) -> Result<bool, ConversationError> {
        let conn = self.provider.db.connect()?;
        conn.execute(
            "DELETE FROM conversation_messages WHERE conversation_id = ?",
            params![id.to_string()],
        )
        .await?;
        let deleted = conn
            .execute("DELETE FROM conversations WHERE id = ?", params![id.to_string()])
            .await?;
        Ok(deleted > 0)
    }

    pub async fn update_title(
        &self,
        id: &str,
        title: &str,
    ) -> Result<Conversation, ConversationError> {
        let conn = self.provider.db.connect()?;
        let updated = conn
            .execute(
                "UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?",
                params![title.to_string(), Utc::now().to_rfc3339(), id.to_string()],
            )
            .await?;
        if updated == 0 {
            return Err(ConversationError::NotFound(id.to_string()));
        }
        self.get(id).await
    }

    /// Appends a message at the next sequence number.
    ///
    /// The sequence is assigned inside a single INSERT ... SELECT statement, so
    /// the read of the current maximum and the insert of `max + 1` are
    /// serialized by the database. The UNIQUE (conversation_id, sequence)
    /// constraint backstops the invariant.
    pub async fn append_message(
        &self,
        conversation_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<Message, ConversationError> {
        let conn = self.provider.db.connect()?;

        // Existence check so a missing conversation surfaces as NotFound
        // instead of a silently empty insert.
        let mut rows = conn
            .query(
                "SELECT id FROM conversations WHERE id = ?",
                params![conversation_id.to_string()],
            )
            .await?;
        if rows.next().await?.is_none() {
            return Err(ConversationError::NotFound(conversation_id.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();

        conn.execute(
            "INSERT INTO conversation_messages (id, conversation_id, role, content, sequence, created_at)
             SELECT ?, ?, ?, ?, COALESCE(MAX(sequence), 0) + 1, ?
             FROM conversation_messages WHERE conversation_id = ?",
            params![
                id.clone(),
                conversation_id.to_string(),
                role.as_str(),
                content.to_string(),
                created_at.clone(),
                conversation_id.to_string()
            ],
        )
        .await?;

        conn.execute(
            "UPDATE conversations SET updated_at = ? WHERE id = ?",
            params![created_at.clone(), conversation_id.to_string()],
        )
        .await?;

        // Read the assigned sequence back.
        let mut rows = conn
            .query(
                "SELECT sequence FROM conversation_messages WHERE id = ?",
                params![id.clone()],
            )
            .await?;
        let sequence: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => return Err(ConversationError::NotFound(conversation_id.to_string())),
        };

        Ok(Message {
            id,
            conversation_id: conversation_id.to_string(),
            role,
            content: content.to_string(),
            sequence,
            created_at,
        })
    }

    /// Lists a conversation's messages ordered by sequence.
    pub async fn list_messages(
        &self,
        conversation_id: &str,
    ) -> Result<Vec<Message>, ConversationError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, conversation_id, role, content, sequence, created_at
                 FROM conversation_messages WHERE conversation_id = ?
                 ORDER BY sequence",
                params![conversation_id.to_string()],
            )
            .await?;

        let mut messages = Vec::new();
        while let Some(row) = rows.next().await? {
            let role_str: String = row.get(2)?;
            messages.push(Message {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                role: MessageRole::parse(&role_str).unwrap_or(MessageRole::User),
                content: row.get(3)?,
                sequence: row.get(4)?,
                created_at: row.get(5)?,
            });
        }
        Ok(messages)
    }
}

fn conversation_from_row(row: &turso::Row) -> Result<Conversation, ConversationError> {
    let metadata = match row.get_value(4)? {
        TursoValue::Text(s) => serde_json::from_str(&s).ok(),
        _ => None,
    };
    Ok(Conversation {
        id: row.get(0)?,
        title: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        metadata,
    })
}
