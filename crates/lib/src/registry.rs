//! # Document Registry
//!
//! The durable catalog of ingested documents. The `file_hash` column carries a
//! UNIQUE constraint, which is what actually closes the duplicate-upload race:
//! callers insert and map the constraint violation, they never check-then-act.

use crate::{
    providers::db::sqlite::SqliteProvider,
    types::{DocumentRecord, DocumentStatus},
};
use chrono::Utc;
use thiserror::Error;
use tracing::info;
use turso::params;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Database error: {0}")]
    Database(#[from] turso::Error),
    #[error("Document not found: {0}")]
    NotFound(String),
}

/// The outcome of a registration attempt.
#[derive(Debug)]
pub enum RegisterOutcome {
    Created(DocumentRecord),
    /// A document with the same content digest already exists.
    DuplicateHash { existing_id: String },
}

/// A new document row, pending registration.
#[derive(Debug)]
pub struct NewDocument<'a> {
    pub id: &'a str,
    pub file_name: &'a str,
    pub file_size: i64,
    pub file_type: &'a str,
    pub file_hash: &'a str,
}

#[derive(Clone, Debug)]
pub struct DocumentRegistry {
    provider: SqliteProvider,
}

impl DocumentRegistry {
    pub fn new(provider: SqliteProvider) -> Self {
        Self { provider }
    }

    /// Inserts a document row with `status = enabled`.
    ///
    /// A UNIQUE violation on `file_hash` is reported as `DuplicateHash` with
    /// the existing row's id, so two racing uploads of identical bytes resolve
    /// to exactly one registered document.
    pub async fn register(
        &self,
        doc: NewDocument<'_>,
    ) -> Result<RegisterOutcome, RegistryError> {
        let conn = self.provider.db.connect()?;
        let upload_time = Utc::now().to_rfc3339();

        let result = conn
            .execute(
                "INSERT INTO documents (id, file_name, file_size, file_type, file_hash, status, upload_time)
                 VALUES (?, ?, ?, ?, ?, 'enabled', ?)",
                params![
                    doc.id.to_string(),
                    doc.file_name.to_string(),
                    doc.file_size,
                    doc.file_type.to_string(),
                    doc.file_hash.to_string(),
                    upload_time.clone()
                ],
            )
            .await;

        match result {
            Ok(_) => {
                info!(document_id = %doc.id, file_name = %doc.file_name, "Registered document");
                Ok(RegisterOutcome::Created(DocumentRecord {
                    id: doc.id.to_string(),
                    file_name: doc.file_name.to_string(),
                    file_size: doc.file_size,
                    file_type: doc.file_type.to_string(),
                    file_hash: doc.file_hash.to_string(),
                    status: DocumentStatus::Enabled,
                    upload_time,
                }))
            }
            Err(e) if e.to_string().contains("UNIQUE constraint failed") => {
                let existing = self.find_by_hash(doc.file_hash).await?;
                match existing {
                    Some(record) => Ok(RegisterOutcome::DuplicateHash {
                        existing_id: record.id,
                    }),
                    // The conflicting row vanished between the insert and the
                    // lookup; report the hash itself.
                    None => Ok(RegisterOutcome::DuplicateHash {
                        existing_id: doc.file_hash.to_string(),
                    }),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn find_by_hash(
        &self,
        file_hash: &str,
    ) -> Result<Option<DocumentRecord>, RegistryError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, file_name, file_size, file_type, file_hash, status, upload_time
                 FROM documents WHERE file_hash = ?",
                params![file_hash.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(document_from_row(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn get(&self, id: &str) -> Result<DocumentRecord, RegistryError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, file_name, file_size, file_type, file_hash, status, upload_time
                 FROM documents WHERE id = ?",
                params![id.to_string()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(document_from_row(&row)?),
            None => Err(RegistryError::NotFound(id.to_string())),
        }
    }

    /// Lists documents, newest upload first.
    pub async fn list(
        &self,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<DocumentRecord>, RegistryError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT id, file_name, file_size, file_type, file_hash, status, upload_time
                 FROM documents ORDER BY upload_time DESC LIMIT ? OFFSET ?",
                params![limit as i64, offset as i64],
            )
            .await?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await? {
            documents.push(document_from_row(&row)?);
        }
        Ok(documents)
    }

    pub async fn delete(&self, id: &str) -> Result<bool, RegistryError> {
        let conn = self.provider.db.connect()?;
        let deleted = conn
            .execute("DELETE FROM documents WHERE id = ?", params![id.to_string()])
            .await?;
        Ok(deleted > 0)
    }

    /// Atomically sets a document's enabled/disabled status.
    pub async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
    ) -> Result<(), RegistryError> {
        let conn = self.provider.db.connect()?;
        let updated = conn
            .execute(
                "UPDATE documents SET status = ? WHERE id = ?",
                params![status.as_str(), id.to_string()],
            )
            .await?;
        if updated == 0 {
            return Err(RegistryError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

fn document_from_row(row: &turso::Row) -> Result<DocumentRecord, RegistryError> {
    let status_str: String = row.get(5)?;
    Ok(DocumentRecord {
        id: row.get(0)?,
        file_name: row.get(1)?,
        file_size: row.get(2)?,
        file_type: row.get(3)?,
        file_hash: row.get(4)?,
        status: DocumentStatus::parse(&status_str).unwrap_or(DocumentStatus::Enabled),
        upload_time: row.get(6)?,
    })
}
