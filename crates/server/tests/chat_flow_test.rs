//! # End-to-End Chat Flow Tests
//!
//! Drives the full upload -> chat pipeline over HTTP with every collaborator
//! (chat gateway, embedding API, vector index) mocked, and checks both the
//! grounded path and graceful degradation when retrieval is unavailable.

mod common;

use common::{chat_completion, spawn_app, test_config};
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts OpenAI-style chat mocks for the rewrite, judge and synthesis stages,
/// distinguished by their system prompts.
async fn mount_chat_mocks(server: &MockServer, answer: &str) {
    Mock::given(method("POST"))
        .and(body_string_contains("question expansion assistant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(
            r#"[{"question": "what is the warranty period"}, {"question": "how long is coverage"}, {"question": "warranty duration"}]"#,
        )))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("relevance judge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion("yes")))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains("You are a helpful assistant"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_completion(answer)))
        .mount(server)
        .await;
}

async fn mount_embedding_mock(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v1/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{ "embedding": [0.1, 0.2, 0.3] }]
        })))
        .mount(server)
        .await;
}

/// Mounts a vector index that accepts writes and returns one search hit.
async fn mount_index_mocks(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/v2/vectordb/collections/has"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "data": { "has": true } })),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/insert"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0, "data": { "insertCount": 1 }
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/v2/vectordb/entities/advanced_search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "data": [{
                "chunk_text": "The warranty period is two years from purchase.",
                "document_id": "doc-1",
                "document_name": "warranty.txt",
                "distance": 0.92
            }]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_grounded_chat_flow() {
    let collaborators = MockServer::start().await;
    mount_chat_mocks(&collaborators, "The warranty lasts two years.").await;
    mount_embedding_mock(&collaborators).await;
    mount_index_mocks(&collaborators).await;

    let (config, upload_dir) = test_config(
        &format!("{}/v1/chat/completions", collaborators.uri()),
        &format!("{}/v1/embeddings", collaborators.uri()),
        &collaborators.uri(),
    );
    let app = spawn_app(config, upload_dir).await;
    let client = reqwest::Client::new();

    // Upload a document so the corpus is non-empty.
    let form = reqwest::multipart::Form::new().part(
        "file",
        reqwest::multipart::Part::bytes(b"The warranty period is two years from purchase.".to_vec())
            .file_name("warranty.txt"),
    );
    let upload = client
        .post(format!("{}/documents/upload", app.address))
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert!(upload.status().is_success(), "upload failed: {}", upload.status());

    // Ask a question.
    let response = client
        .post(format!("{}/chat", app.address))
        .json(&json!({ "query": "how long is the warranty?" }))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());
    let body: Value = response.json().await.unwrap();

    assert_eq!(body["answer"], "The warranty lasts two years.");
    assert_eq!(body["documents_count"], 1);
    assert_eq!(body["references"], json!(["warranty.txt"]));
    assert!(body["instruction"]
        .as_str()
        .unwrap()
        .contains("The warranty period is two years from purchase."));

    // Both turns were persisted in order.
    let conversation_id = body["conversation_id"].as_str().unwrap();
    let messages: Value = client
        .get(format!(
            "{}/conversations/{conversation_id}/messages",
            app.address
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = messages.as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["sequence"], 1);
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["sequence"], 2);
}

#[tokio::test]
async fn test_chat_degrades_to_ungrounded_when_index_is_down() {
    let collaborators = MockServer::start().await;
    mount_chat_mocks(&collaborators, "Answered from general knowledge.").await;
    mount_embedding_mock(&collaborators).await;
    // Every other call (the vector index) fails.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("index down"))
        .with_priority(100)
        .mount(&collaborators)
        .await;

    let (config, upload_dir) = test_config(
        &format!("{}/v1/chat/completions", collaborators.uri()),
        &format!("{}/v1/embeddings", collaborators.uri()),
        &collaborators.uri(),
    );
    let app = spawn_app(config, upload_dir).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/chat", app.address))
        .json(&json!({ "query": "anything at all" }))
        .send()
        .await
        .unwrap();
    assert!(
        response.status().is_success(),
        "retrieval failure must not fail the request"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["answer"], "Answered from general knowledge.");
    assert_eq!(body["documents_count"], 0);
    assert_eq!(body["references"], json!([]));
}

#[tokio::test]
async fn test_empty_query_is_rejected() {
    let collaborators = MockServer::start().await;
    let (config, upload_dir) = test_config(
        &format!("{}/v1/chat/completions", collaborators.uri()),
        &format!("{}/v1/embeddings", collaborators.uri()),
        &collaborators.uri(),
    );
    let app = spawn_app(config, upload_dir).await;

    let response = reqwest::Client::new()
        .post(format!("{}/chat", app.address))
        .json(&json!({ "query": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}
