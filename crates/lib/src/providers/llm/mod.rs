pub mod gemini;
pub mod openai;

use crate::errors::GatewayError;
use async_trait::async_trait;
use dyn_clone::DynClone;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// One turn of a chat-completion request.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A trait for interacting with a chat-completion provider.
///
/// This defines the single gateway call the pipeline depends on. Implementations
/// exist for OpenAI-compatible APIs and for Gemini; the configuration selects
/// one by name.
#[async_trait]
pub trait ChatProvider: Send + Sync + Debug + DynClone {
    /// Sends a full message list and returns the model's text response.
    ///
    /// `json_output` asks the provider to constrain the response to JSON where
    /// the API supports it. A non-success status or an empty completion is an
    /// error, never an empty string.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        json_output: bool,
    ) -> Result<String, GatewayError>;
}

dyn_clone::clone_trait_object!(ChatProvider);
