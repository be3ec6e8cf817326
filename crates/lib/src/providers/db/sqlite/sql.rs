//! # SQLite Schema
//!
//! Centralizes the table-creation SQL so schema setup stays in one place and
//! is idempotent across application startups.

/// All statements required to bring a fresh database up to the current schema.
pub const ALL_TABLE_CREATION_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS conversations (
        id TEXT PRIMARY KEY,
        title TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        metadata TEXT
    );",
    "CREATE TABLE IF NOT EXISTS conversation_messages (
        id TEXT PRIMARY KEY,
        conversation_id TEXT NOT NULL,
        role TEXT NOT NULL,
        content TEXT NOT NULL,
        sequence INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (conversation_id, sequence)
    );",
    "CREATE INDEX IF NOT EXISTS idx_messages_conversation
        ON conversation_messages (conversation_id);",
    "CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        file_name TEXT NOT NULL,
        file_size INTEGER NOT NULL,
        file_type TEXT NOT NULL,
        file_hash TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL DEFAULT 'enabled',
        upload_time TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS disabled_documents (
        document_id TEXT PRIMARY KEY
    );",
];
