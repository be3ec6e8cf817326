//! # Shared Test Utilities
//!
//! In-memory database setup, a scripted chat provider, and an in-memory
//! vector index, so tests stay isolated and repeatable without network
//! collaborators.

use anyhow::Result;
use async_trait::async_trait;
use docchat::errors::GatewayError;
use docchat::providers::db::sqlite::SqliteProvider;
use docchat::providers::llm::{ChatMessage, ChatProvider};
use docchat::providers::vector::{IndexError, VectorIndex};
use docchat::types::{ChunkRecord, ScoredChunk};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::{Arc, Mutex};

// --- Test Setup ---

/// Creates an isolated in-memory database with the full schema applied.
pub struct TestSetup {
    pub provider: SqliteProvider,
}

impl TestSetup {
    pub async fn new() -> Result<Self> {
        let provider = SqliteProvider::new(":memory:").await?;
        provider.initialize_schema().await?;
        Ok(Self { provider })
    }
}

// --- Mock Chat Provider ---

/// A scripted reply for the mock chat provider.
#[derive(Clone, Debug)]
pub enum MockReply {
    Text(String),
    ApiError(String),
    /// Simulates an unreachable gateway (maps to a timeout error).
    Unreachable,
}

/// A chat provider that replays scripted replies in order and records every
/// call for assertions. When the script runs out it answers with a fixed
/// default so unrelated pipeline stages keep working.
#[derive(Clone, Debug)]
pub struct MockChatProvider {
    replies: Arc<Mutex<VecDeque<MockReply>>>,
    pub call_history: Arc<Mutex<Vec<(String, String)>>>,
    default_reply: String,
}

impl MockChatProvider {
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().collect())),
            call_history: Arc::new(Mutex::new(Vec::new())),
            default_reply: "Default mock response".to_string(),
        }
    }

    pub fn with_default_reply(mut self, reply: &str) -> Self {
        self.default_reply = reply.to_string();
        self
    }

    pub fn push(&self, reply: MockReply) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.call_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _temperature: f32,
        _json_output: bool,
    ) -> Result<String, GatewayError> {
        let system = messages
            .iter()
            .find(|m| m.role == "system")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let user = messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.call_history.lock().unwrap().push((system, user));

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(MockReply::Text(text)) => Ok(text),
            Some(MockReply::ApiError(message)) => Err(GatewayError::Api(message)),
            Some(MockReply::Unreachable) => Err(GatewayError::Timeout),
            None => Ok(self.default_reply.clone()),
        }
    }
}

// --- In-memory Vector Index ---

#[derive(Debug, Default)]
struct MemoryIndexState {
    collections: HashMap<String, usize>,
    chunks: Vec<ChunkRecord>,
    scripted_searches: HashMap<String, Vec<ScoredChunk>>,
    deleted_documents: Vec<String>,
    fail_next_upsert: bool,
}

/// An in-memory `VectorIndex`. Searches can be scripted per query text; when
/// no script matches, a naive term-overlap score stands in for the hybrid
/// ranker. Upserts and deletes are recorded for assertions.
#[derive(Clone, Debug, Default)]
pub struct MemoryVectorIndex {
    state: Arc<Mutex<MemoryIndexState>>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the result set returned for an exact query text.
    pub fn script_search(&self, query: &str, results: Vec<ScoredChunk>) {
        self.state
            .lock()
            .unwrap()
            .scripted_searches
            .insert(query.to_string(), results);
    }

    /// Makes the next upsert fail, for compensation tests.
    pub fn fail_next_upsert(&self) {
        self.state.lock().unwrap().fail_next_upsert = true;
    }

    pub fn chunk_count(&self) -> usize {
        self.state.lock().unwrap().chunks.len()
    }

    pub fn chunks_for_document(&self, document_id: &str) -> Vec<ChunkRecord> {
        self.state
            .lock()
            .unwrap()
            .chunks
            .iter()
            .filter(|c| c.document_id == document_id)
            .cloned()
            .collect()
    }

    pub fn deleted_documents(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_documents.clone()
    }
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn ensure_collection(&self, name: &str, dim: usize) -> Result<(), IndexError> {
        self.state
            .lock()
            .unwrap()
            .collections
            .entry(name.to_string())
            .or_insert(dim);
        Ok(())
    }

    async fn upsert(&self, _collection: &str, chunks: Vec<ChunkRecord>) -> Result<(), IndexError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_next_upsert {
            state.fail_next_upsert = false;
            return Err(IndexError::Api("injected upsert failure".to_string()));
        }
        state.chunks.extend(chunks);
        Ok(())
    }

    async fn delete_by_document(
        &self,
        _collection: &str,
        document_id: &str,
    ) -> Result<(), IndexError> {
        let mut state = self.state.lock().unwrap();
        state.chunks.retain(|c| c.document_id != document_id);
        state.deleted_documents.push(document_id.to_string());
        Ok(())
    }

    async fn hybrid_search(
        &self,
        _collection: &str,
        query: &str,
        _query_vector: Vec<f32>,
        limit: u32,
    ) -> Result<Vec<ScoredChunk>, IndexError> {
        let state = self.state.lock().unwrap();
        if let Some(results) = state.scripted_searches.get(query) {
            return Ok(results.iter().take(limit as usize).cloned().collect());
        }

        let terms: Vec<String> = query
            .to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let mut hits: Vec<ScoredChunk> = state
            .chunks
            .iter()
            .filter_map(|c| {
                let text = c.text.to_lowercase();
                let matched = terms.iter().filter(|t| text.contains(*t)).count();
                if matched == 0 || terms.is_empty() {
                    return None;
                }
                Some(ScoredChunk {
                    text: c.text.clone(),
                    score: matched as f64 / terms.len() as f64,
                    document_id: c.document_id.clone(),
                    document_name: c.document_name.clone(),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap());
        hits.truncate(limit as usize);
        Ok(hits)
    }

    async fn rerank(
        &self,
        _query: &str,
        texts: Vec<String>,
        limit: u32,
    ) -> Result<Vec<(String, f64)>, IndexError> {
        // Identity rerank: preserve order, assign descending scores.
        Ok(texts
            .into_iter()
            .take(limit as usize)
            .enumerate()
            .map(|(i, t)| (t, 1.0 - i as f64 * 0.01))
            .collect())
    }
}
