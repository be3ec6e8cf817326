#![allow(dead_code)]
//! # Common Test Utilities
//!
//! Spawns the server on a random port against in-memory storage and wiremock
//! collaborators, so API tests are isolated and repeatable.

use docchat_server::config::{
    AppConfig, ChatConfig, EmbeddingConfig, IngestionSettingsConfig, ProviderConfig,
    RetrievalSettings, VectorIndexConfig,
};
use docchat_server::run;
use std::collections::HashMap;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::time::{sleep, Duration};

pub struct TestApp {
    pub address: String,
    _upload_dir: TempDir,
}

/// Builds a config pointing every collaborator at the given base URLs.
pub fn test_config(chat_api_url: &str, embedding_api_url: &str, index_api_url: &str) -> (AppConfig, TempDir) {
    let upload_dir = tempfile::tempdir().expect("Failed to create upload dir");

    let mut providers = HashMap::new();
    providers.insert(
        "default".to_string(),
        ProviderConfig {
            provider: "openai".to_string(),
            api_url: Some(chat_api_url.to_string()),
            api_key: None,
            model_name: "test-model".to_string(),
        },
    );

    let config = AppConfig {
        port: 0,
        db_url: ":memory:".to_string(),
        upload_dir: upload_dir.path().to_string_lossy().into_owned(),
        vector_index: VectorIndexConfig {
            api_url: index_api_url.to_string(),
            collection: "docs_collection".to_string(),
            dense_dim: 3,
            rerank_api_url: None,
        },
        embedding: EmbeddingConfig {
            api_url: embedding_api_url.to_string(),
            model_name: "test-embed".to_string(),
            api_key: None,
        },
        providers,
        chat: ChatConfig::default(),
        retrieval: RetrievalSettings::default(),
        ingestion: IngestionSettingsConfig::default(),
    };

    (config, upload_dir)
}

/// Spawns the app on a random port and returns its base address.
pub async fn spawn_app(config: AppConfig, upload_dir: TempDir) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{port}");

    tokio::spawn(async move {
        if let Err(e) = run(listener, config).await {
            eprintln!("Server error: {e}");
        }
    });

    // Give the server a moment to start.
    sleep(Duration::from_millis(100)).await;

    TestApp {
        address,
        _upload_dir: upload_dir,
    }
}

/// An OpenAI-style chat completion body wrapping the given content.
pub fn chat_completion(content: &str) -> serde_json::Value {
    serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    })
}
