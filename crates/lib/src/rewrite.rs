//! # Query Rewriter
//!
//! Expands one user query into several paraphrases via the chat gateway. The
//! model's output is untrusted: it is validated and retried a bounded number
//! of times, and on exhaustion the original query is returned alone so the
//! pipeline always has at least one usable query.

use crate::{
    prompts::{REWRITE_SYSTEM_PROMPT, REWRITE_USER_PROMPT},
    providers::llm::{ChatMessage, ChatProvider},
};
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

#[derive(Deserialize, Debug)]
struct Paraphrase {
    #[serde(default)]
    question: String,
}

pub struct QueryRewriter {
    chat: Box<dyn ChatProvider>,
    temperature: f32,
    max_attempts: u32,
    backoff: Duration,
}

impl QueryRewriter {
    pub fn new(chat: Box<dyn ChatProvider>, temperature: f32, max_attempts: u32) -> Self {
        Self {
            chat,
            temperature,
            max_attempts: max_attempts.max(1),
            backoff: Duration::from_millis(200),
        }
    }

    /// Expands `original` into at least `count` paraphrases.
    ///
    /// Never fails and never returns an empty list: when every attempt yields
    /// unusable output, the result is exactly `[original]`.
    pub async fn expand(&self, original: &str, count: usize) -> Vec<String> {
        let user_prompt = REWRITE_USER_PROMPT
            .replace("{count}", &count.to_string())
            .replace("{question}", original);
        let messages = [
            ChatMessage::system(REWRITE_SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
        ];

        for attempt in 1..=self.max_attempts {
            let response = match self
                .chat
                .complete(&messages, self.temperature, true)
                .await
            {
                Ok(text) => text,
                Err(e) => {
                    warn!(attempt, error = %e, "Query rewrite request failed");
                    tokio::time::sleep(self.backoff).await;
                    continue;
                }
            };

            match parse_paraphrases(&response, count) {
                Some(questions) => return questions,
                None => {
                    warn!(attempt, raw = %response, "Query rewrite response failed validation");
                    tokio::time::sleep(self.backoff).await;
                }
            }
        }

        warn!("Query rewriting exhausted all attempts, falling back to the original query");
        vec![original.to_string()]
    }
}

/// Parses the model output into paraphrases, requiring at least `count`
/// well-formed entries.
fn parse_paraphrases(response: &str, count: usize) -> Option<Vec<String>> {
    let cleaned = response
        .trim()
        .strip_prefix("```json")
        .unwrap_or(response)
        .strip_suffix("```")
        .unwrap_or(response)
        .trim();

    let entries: Vec<Paraphrase> = serde_json::from_str(cleaned).ok()?;
    let questions: Vec<String> = entries
        .into_iter()
        .map(|p| p.question)
        .filter(|q| !q.trim().is_empty())
        .collect();

    if questions.len() < count {
        return None;
    }
    Some(questions)
}
