//! # Answer Synthesizer
//!
//! Builds the grounding instruction and obtains the final answer in a single
//! gateway call. There is no retry here: a failure at this stage is terminal
//! for the request and surfaced to the caller.

use crate::{
    errors::GatewayError,
    prompts::{format_context, SYNTHESIS_SYSTEM_PROMPT},
    providers::llm::{ChatMessage, ChatProvider},
    types::{Message, RetrievedChunk},
};
use chrono::Local;
use tracing::debug;

/// The grounding instruction (kept for auditing/display) and the model's
/// verbatim answer.
#[derive(Debug, Clone)]
pub struct SynthesisResult {
    pub instruction: String,
    pub answer: String,
}

pub struct AnswerSynthesizer {
    chat: Box<dyn ChatProvider>,
    temperature: f32,
}

impl AnswerSynthesizer {
    pub fn new(chat: Box<dyn ChatProvider>, temperature: f32) -> Self {
        Self { chat, temperature }
    }

    /// Builds the instruction embedding today's date and the chunk texts
    /// (empty context block when no chunks survived retrieval), sets it as
    /// the leading system turn, appends the conversation history, and invokes
    /// the gateway once.
    pub async fn synthesize(
        &self,
        chunks: &[RetrievedChunk],
        history: &[Message],
    ) -> Result<SynthesisResult, GatewayError> {
        let instruction = SYNTHESIS_SYSTEM_PROMPT
            .replace("{current_date}", &Local::now().format("%Y-%m-%d").to_string())
            .replace("{context}", &format_context(chunks));

        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(ChatMessage::system(instruction.clone()));
        for message in history {
            messages.push(ChatMessage {
                role: message.role.as_str().to_string(),
                content: message.content.clone(),
            });
        }

        debug!(chunk_count = chunks.len(), turns = messages.len(), "--> Sending synthesis request");
        let answer = self.chat.complete(&messages, self.temperature, false).await?;

        Ok(SynthesisResult {
            instruction,
            answer,
        })
    }
}
