//! # Disabled Document Set
//!
//! A fast membership index of document ids excluded from retrieval, kept in a
//! side store that must stay in agreement with the registry's `status` column.
//! Toggling updates the registry first and rolls it back if the side-index
//! write fails; success is never reported while the two stores disagree.

use crate::{
    providers::db::sqlite::SqliteProvider,
    registry::{DocumentRegistry, RegistryError},
    types::DocumentStatus,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info};
use turso::params;

#[derive(Error, Debug)]
pub enum MembershipError {
    #[error("Membership store operation failed: {0}")]
    Storage(String),
}

impl From<turso::Error> for MembershipError {
    fn from(e: turso::Error) -> Self {
        MembershipError::Storage(e.to_string())
    }
}

/// The storage substrate of the disabled set: plain membership operations over
/// document identifiers.
#[async_trait]
pub trait MembershipStore: Send + Sync + Debug {
    async fn add(&self, id: &str) -> Result<(), MembershipError>;
    async fn remove(&self, id: &str) -> Result<(), MembershipError>;
    async fn contains(&self, id: &str) -> Result<bool, MembershipError>;
    async fn list_all(&self) -> Result<HashSet<String>, MembershipError>;
}

/// A membership store over a dedicated SQLite side table. `INSERT OR IGNORE`
/// and keyed deletes give atomic check-and-set semantics.
#[derive(Clone, Debug)]
pub struct SqliteMembershipStore {
    provider: SqliteProvider,
}

impl SqliteMembershipStore {
    pub fn new(provider: SqliteProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl MembershipStore for SqliteMembershipStore {
    async fn add(&self, id: &str) -> Result<(), MembershipError> {
        let conn = self.provider.db.connect()?;
        conn.execute(
            "INSERT OR IGNORE INTO disabled_documents (document_id) VALUES (?)",
            params![id.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn remove(&self, id: &str) -> Result<(), MembershipError> {
        let conn = self.provider.db.connect()?;
        conn.execute(
            "DELETE FROM disabled_documents WHERE document_id = ?",
            params![id.to_string()],
        )
        .await?;
        Ok(())
    }

    async fn contains(&self, id: &str) -> Result<bool, MembershipError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query(
                "SELECT 1 FROM disabled_documents WHERE document_id = ?",
                params![id.to_string()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    async fn list_all(&self) -> Result<HashSet<String>, MembershipError> {
        let conn = self.provider.db.connect()?;
        let mut rows = conn
            .query("SELECT document_id FROM disabled_documents", ())
            .await?;
        let mut ids = HashSet::new();
        while let Some(row) = rows.next().await? {
            ids.insert(row.get(0)?);
        }
        Ok(ids)
    }
}

#[derive(Error, Debug)]
pub enum DisabledSetError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Membership(#[from] MembershipError),
    #[error("Registry and disabled index disagree for document {0}: {1}")]
    Consistency(String, String),
}

/// Coordinates the registry's `status` column and the membership side index.
#[derive(Clone, Debug)]
pub struct DisabledSet {
    registry: DocumentRegistry,
    store: Arc<dyn MembershipStore>,
}

impl DisabledSet {
    pub fn new(registry: DocumentRegistry, store: Arc<dyn MembershipStore>) -> Self {
        Self { registry, store }
    }

    pub async fn is_disabled(&self, document_id: &str) -> Result<bool, DisabledSetError> {
        Ok(self.store.contains(document_id).await?)
    }

    pub async fn list_disabled(&self) -> Result<HashSet<String>, DisabledSetError> {
        Ok(self.store.list_all().await?)
    }

    /// Flips a document's disabled state and returns the new state.
    ///
    /// The registry is updated first; if the side-index write fails, the
    /// registry status is rolled back to its previous value and a consistency
    /// error is surfaced.
    pub async fn toggle(&self, document_id: &str) -> Result<bool, DisabledSetError> {
        let record = self.registry.get(document_id).await?;
        let currently_disabled = record.status == DocumentStatus::Disabled;
        let new_status = if currently_disabled {
            DocumentStatus::Enabled
        } else {
            DocumentStatus::Disabled
        };

        self.registry.set_status(document_id, new_status).await?;

        let side_result = if currently_disabled {
            self.store.remove(document_id).await
        } else {
            self.store.add(document_id).await
        };

        if let Err(e) = side_result {
            error!(document_id = %document_id, error = %e, "Disabled-index update failed, rolling back registry status");
            if let Err(rollback_err) = self.registry.set_status(document_id, record.status).await {
                return Err(DisabledSetError::Consistency(
                    document_id.to_string(),
                    format!("side-index update failed ({e}) and rollback failed ({rollback_err})"),
                ));
            }
            return Err(DisabledSetError::Consistency(
                document_id.to_string(),
                format!("side-index update failed, registry rolled back: {e}"),
            ));
        }

        info!(document_id = %document_id, disabled = !currently_disabled, "Toggled document");
        Ok(!currently_disabled)
    }

    /// Removes a document from the side index, used when the document itself
    /// is deleted.
    pub async fn forget(&self, document_id: &str) -> Result<(), DisabledSetError> {
        Ok(self.store.remove(document_id).await?)
    }
}
