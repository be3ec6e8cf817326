//! # Retrieval Coordinator
//!
//! Fans retrieval out across the expanded queries, filters disabled and
//! irrelevant chunks, and merges the results. Every stage runs its units of
//! work as plain concurrent futures joined before the next stage, so dropping
//! the overall call (caller cancellation) cancels all outstanding sub-tasks;
//! tasks never communicate with each other mid-stage.
//!
//! Partial failures (one empty search, one failed judgment) degrade and are
//! logged. Only a gateway that is outright unreachable is fatal for its
//! stage: a shared flag makes the remaining sibling judgments bail out
//! instead of queueing more doomed calls.

use crate::{
    disabled::{DisabledSet, DisabledSetError},
    prompts::{GATE_SYSTEM_PROMPT, GATE_USER_PROMPT, JUDGE_SYSTEM_PROMPT, JUDGE_USER_PROMPT},
    providers::{
        embedding::EmbeddingClient,
        llm::{ChatMessage, ChatProvider},
        vector::VectorIndex,
    },
    types::{Message, RetrievedChunk, ScoredChunk},
};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How surviving candidates are judged for relevance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JudgeStrategy {
    /// One binary LLM judgment per candidate chunk.
    Llm,
    /// Keep chunks whose search score clears a fixed threshold.
    Threshold { min_score: f64 },
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub top_k: u32,
    /// When enabled, a cheap per-query classification decides whether
    /// retrieval runs at all.
    pub gate_enabled: bool,
    /// Second-pass rerank of merged candidates before judging.
    pub use_reranker: bool,
    pub judge_strategy: JudgeStrategy,
    /// Bound on each individual gateway or index call.
    pub call_timeout: Duration,
    /// Bound on a whole fan-out stage.
    pub stage_deadline: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            gate_enabled: false,
            use_reranker: false,
            judge_strategy: JudgeStrategy::Llm,
            call_timeout: Duration::from_secs(30),
            stage_deadline: Duration::from_secs(120),
        }
    }
}

#[derive(Error, Debug)]
pub enum RetrievalError {
    /// The disabled-document filter could not be consulted. Failing open here
    /// would leak disabled documents into answers, so this aborts retrieval
    /// and lets the caller degrade to an ungrounded answer.
    #[error(transparent)]
    Disabled(#[from] DisabledSetError),
}

pub struct RetrievalCoordinator {
    index: Arc<dyn VectorIndex>,
    chat: Box<dyn ChatProvider>,
    embedding: EmbeddingClient,
    disabled: DisabledSet,
    collection: String,
    config: RetrievalConfig,
}

impl RetrievalCoordinator {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        chat: Box<dyn ChatProvider>,
        embedding: EmbeddingClient,
        disabled: DisabledSet,
        collection: String,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            chat,
            embedding,
            disabled,
            collection,
            config,
        }
    }

    /// Runs the retrieval pipeline and returns the relevant chunks plus the
    /// referenced document names in first-seen order.
    ///
    /// An empty chunk list is a normal outcome (gate said no, corpus empty,
    /// or nothing judged relevant), not an error.
    pub async fn retrieve(
        &self,
        history: &[Message],
        last_user_message: &str,
        expanded_queries: &[String],
    ) -> Result<(Vec<RetrievedChunk>, Vec<String>), RetrievalError> {
        if expanded_queries.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        if self.config.gate_enabled && !self.needs_retrieval(history, expanded_queries).await {
            info!("Retrieval gate voted no, skipping retrieval");
            return Ok((Vec::new(), Vec::new()));
        }

        let candidates = self.search_all(expanded_queries).await;
        if candidates.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        // Exclude disabled documents before any costly judging.
        let disabled_ids = self.disabled.list_disabled().await?;
        let candidates: Vec<ScoredChunk> = candidates
            .into_iter()
            .filter(|c| !disabled_ids.contains(&c.document_id))
            .collect();

        let mut merged = dedup_by_text(candidates);

        if self.config.use_reranker {
            merged = self.rerank(last_user_message, merged).await;
        }

        let kept = match self.config.judge_strategy {
            JudgeStrategy::Threshold { min_score } => merged
                .into_iter()
                .filter(|c| c.score >= min_score)
                .collect(),
            JudgeStrategy::Llm => {
                self.judge_all(history, last_user_message, merged).await
            }
        };

        let mut chunks = Vec::new();
        let mut references = Vec::new();
        for candidate in kept.into_iter().take(self.config.top_k as usize) {
            if !references.contains(&candidate.document_name) {
                references.push(candidate.document_name.clone());
            }
            chunks.push(RetrievedChunk {
                text: candidate.text,
                score: candidate.score,
                document_name: candidate.document_name,
            });
        }

        info!(
            chunk_count = chunks.len(),
            reference_count = references.len(),
            "Retrieval complete"
        );
        Ok((chunks, references))
    }

    /// One cheap classification per expanded query; retrieval proceeds when
    /// at least half vote "needs knowledge". A failed vote counts as a yes so
    /// uncertainty leans toward retrieving.
    async fn needs_retrieval(&self, history: &[Message], queries: &[String]) -> bool {
        let history_block = format_history(history, 6);

        let votes = join_all(queries.iter().map(|query| {
            let user_prompt = GATE_USER_PROMPT
                .replace("{history}", &history_block)
                .replace("{question}", query);
            let messages = [
                ChatMessage::system(GATE_SYSTEM_PROMPT),
                ChatMessage::user(user_prompt),
            ];
            async move {
                match timeout(
                    self.config.call_timeout,
                    self.chat.complete(&messages, 0.0, false),
                )
                .await
                {
                    Ok(Ok(text)) => is_yes(&text),
                    Ok(Err(e)) => {
                        warn!(error = %e, "Retrieval gate classification failed, counting as yes");
                        true
                    }
                    Err(_) => {
                        warn!("Retrieval gate classification timed out, counting as yes");
                        true
                    }
                }
            }
        }))
        .await;

        let yes_votes = votes.iter().filter(|v| **v).count();
        debug!(yes_votes, total = votes.len(), "Retrieval gate votes");
        yes_votes * 2 >= votes.len()
    }

    /// One hybrid search per expanded query, concurrently. A failing
    /// sub-query degrades to an empty result for that query only.
    async fn search_all(&self, queries: &[String]) -> Vec<ScoredChunk> {
        let searches = queries.iter().map(|query| async move {
            let result: Result<Vec<ScoredChunk>, String> = async {
                let vector = timeout(self.config.call_timeout, self.embedding.embed(query))
                    .await
                    .map_err(|_| "embedding timed out".to_string())?
                    .map_err(|e| e.to_string())?;
                timeout(
                    self.config.call_timeout,
                    self.index.hybrid_search(
                        &self.collection,
                        query,
                        vector,
                        self.config.top_k,
                    ),
                )
                .await
                .map_err(|_| "search timed out".to_string())?
                .map_err(|e| e.to_string())
            }
            .await;

            match result {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(query = %query, error = %e, "Sub-query search failed, degrading to empty");
                    Vec::new()
                }
            }
        });

        match timeout(self.config.stage_deadline, join_all(searches)).await {
            Ok(per_query) => per_query.into_iter().flatten().collect(),
            Err(_) => {
                warn!("Search stage deadline exceeded, degrading to empty result");
                Vec::new()
            }
        }
    }

    /// Second-pass rerank; on any failure the original ranking is kept.
    async fn rerank(&self, query: &str, candidates: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
        let reranked = timeout(
            self.config.call_timeout,
            self.index.rerank(query, texts, candidates.len() as u32),
        )
        .await;

        match reranked {
            Ok(Ok(scored)) => {
                let by_text: HashMap<String, ScoredChunk> = candidates
                    .into_iter()
                    .map(|c| (c.text.clone(), c))
                    .collect();
                scored
                    .into_iter()
                    .filter_map(|(text, score)| {
                        by_text.get(&text).map(|c| ScoredChunk {
                            score,
                            ..c.clone()
                        })
                    })
                    .collect()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Rerank failed, keeping original ranking");
                candidates
            }
            Err(_) => {
                warn!("Rerank timed out, keeping original ranking");
                candidates
            }
        }
    }

    /// Concurrent binary relevance judgments. A per-chunk failure counts as
    /// "not relevant"; an unreachable gateway flips a shared flag so sibling
    /// judgments bail out instead of piling onto a dead endpoint.
    async fn judge_all(
        &self,
        history: &[Message],
        question: &str,
        candidates: Vec<ScoredChunk>,
    ) -> Vec<ScoredChunk> {
        let history_block = format_history(history, 6);
        let fatal = Arc::new(AtomicBool::new(false));

        let judgments = candidates.iter().map(|candidate| {
            let fatal = Arc::clone(&fatal);
            let user_prompt = JUDGE_USER_PROMPT
                .replace("{question}", question)
                .replace("{passage}", &candidate.text);
            let messages = [
                ChatMessage::system(JUDGE_SYSTEM_PROMPT.to_string() + "\n\n" + &history_block),
                ChatMessage::user(user_prompt),
            ];
            async move {
                if fatal.load(Ordering::Relaxed) {
                    return false;
                }
                match timeout(
                    self.config.call_timeout,
                    self.chat.complete(&messages, 0.0, false),
                )
                .await
                {
                    Ok(Ok(text)) => is_yes(&text),
                    Ok(Err(e)) => {
                        if e.is_unreachable() {
                            fatal.store(true, Ordering::Relaxed);
                        }
                        warn!(error = %e, "Relevance judgment failed, treating as not relevant");
                        false
                    }
                    Err(_) => {
                        warn!("Relevance judgment timed out, treating as not relevant");
                        false
                    }
                }
            }
        });

        let verdicts = match timeout(self.config.stage_deadline, join_all(judgments)).await {
            Ok(verdicts) => verdicts,
            Err(_) => {
                warn!("Judging stage deadline exceeded, keeping no chunks");
                return Vec::new();
            }
        };

        candidates
            .into_iter()
            .zip(verdicts)
            .filter_map(|(candidate, relevant)| relevant.then_some(candidate))
            .collect()
    }
}

/// Deduplicates candidates by exact text, keeping the highest score per
/// duplicate group, then orders by score descending. The sort is stable, so
/// equal scores keep their first-seen order.
fn dedup_by_text(candidates: Vec<ScoredChunk>) -> Vec<ScoredChunk> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<ScoredChunk> = Vec::new();

    for candidate in candidates {
        match seen.get(&candidate.text) {
            Some(&i) => {
                if candidate.score > merged[i].score {
                    merged[i] = candidate;
                }
            }
            None => {
                seen.insert(candidate.text.clone(), merged.len());
                merged.push(candidate);
            }
        }
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    merged
}

fn is_yes(text: &str) -> bool {
    text.trim().to_lowercase().starts_with("yes") || text.to_lowercase().contains("\"yes\"")
}

fn format_history(history: &[Message], max_turns: usize) -> String {
    let start = history.len().saturating_sub(max_turns);
    history[start..]
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n")
}
