//! # Embeddings Provider
//!
//! Generates dense vector embeddings by calling an external, OpenAI-compatible
//! embeddings API.

use crate::errors::GatewayError;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize, Debug)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize, Debug)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize, Debug)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Connection settings for the embedding service, constructed once at startup
/// and shared by the ingestion and retrieval pipelines.
#[derive(Debug, Clone)]
pub struct EmbeddingClient {
    client: ReqwestClient,
    pub api_url: String,
    pub model: String,
    api_key: Option<String>,
}

impl EmbeddingClient {
    pub fn new(api_url: String, model: String, api_key: Option<String>) -> Self {
        Self {
            client: ReqwestClient::new(),
            api_url,
            model,
            api_key,
        }
    }

    /// Generates a vector embedding for a single text input.
    pub async fn embed(&self, input: &str) -> Result<Vec<f32>, GatewayError> {
        self.embed_with_model(&self.model, input).await
    }

    /// Generates an embedding using an explicit model identifier, for callers
    /// that select the model per request.
    pub async fn embed_with_model(
        &self,
        model: &str,
        input: &str,
    ) -> Result<Vec<f32>, GatewayError> {
        let request_body = EmbeddingRequest { model, input };
        debug!(model = %model, "--> Sending request to embeddings API");

        let mut request_builder = self.client.post(&self.api_url).json(&request_body);
        if let Some(key) = &self.api_key {
            request_builder = request_builder.bearer_auth(key);
        }

        let response = request_builder.send().await.map_err(GatewayError::Request)?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(error_text));
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(GatewayError::Deserialization)?;

        embedding_response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| GatewayError::Api("embeddings API returned no embeddings".to_string()))
    }
}
