//! # Retrieval Coordinator Tests
//!
//! Exercises merging/deduplication, the disabled-document filter, relevance
//! judging degradation, the retrieval gate, and the empty-corpus path.

use docchat::disabled::{DisabledSet, SqliteMembershipStore};
use docchat::providers::embedding::EmbeddingClient;
use docchat::registry::{DocumentRegistry, NewDocument};
use docchat::retrieval::{JudgeStrategy, RetrievalCoordinator, RetrievalConfig};
use docchat::types::{ChunkRecord, ScoredChunk};
use docchat_test_utils::{MemoryVectorIndex, MockChatProvider, MockReply, TestSetup};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const COLLECTION: &str = "docs_collection";

struct Harness {
    index: MemoryVectorIndex,
    chat: MockChatProvider,
    registry: DocumentRegistry,
    disabled: DisabledSet,
    _embedding_server: MockServer,
    embedding: EmbeddingClient,
}

impl Harness {
    async fn new() -> Self {
        let setup = TestSetup::new().await.unwrap();
        let registry = DocumentRegistry::new(setup.provider.clone());
        let disabled = DisabledSet::new(
            registry.clone(),
            Arc::new(SqliteMembershipStore::new(setup.provider.clone())),
        );

        let embedding_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "embedding": [0.1, 0.2, 0.3] }]
            })))
            .mount(&embedding_server)
            .await;
        let embedding =
            EmbeddingClient::new(embedding_server.uri(), "test-embed".to_string(), None);

        Self {
            index: MemoryVectorIndex::new(),
            chat: MockChatProvider::new(Vec::new()),
            registry,
            disabled,
            _embedding_server: embedding_server,
            embedding,
        }
    }

    fn coordinator(&self, config: RetrievalConfig) -> RetrievalCoordinator {
        RetrievalCoordinator::new(
            Arc::new(self.index.clone()),
            Box::new(self.chat.clone()),
            self.embedding.clone(),
            self.disabled.clone(),
            COLLECTION.to_string(),
            config,
        )
    }
}

fn scored(text: &str, score: f64, doc_id: &str, doc_name: &str) -> ScoredChunk {
    ScoredChunk {
        text: text.to_string(),
        score,
        document_id: doc_id.to_string(),
        document_name: doc_name.to_string(),
    }
}

fn threshold_config(min_score: f64) -> RetrievalConfig {
    RetrievalConfig {
        judge_strategy: JudgeStrategy::Threshold { min_score },
        ..RetrievalConfig::default()
    }
}

#[tokio::test]
async fn test_duplicate_text_keeps_highest_score() {
    let harness = Harness::new().await;
    harness.index.script_search(
        "q1",
        vec![scored("shared passage", 0.4, "d1", "manual.txt")],
    );
    harness.index.script_search(
        "q2",
        vec![scored("shared passage", 0.9, "d1", "manual.txt")],
    );

    let coordinator = harness.coordinator(threshold_config(0.0));
    let (chunks, references) = coordinator
        .retrieve(&[], "question", &["q1".to_string(), "q2".to_string()])
        .await
        .unwrap();

    assert_eq!(chunks.len(), 1, "duplicates must merge into one entry");
    assert_eq!(chunks[0].score, 0.9);
    assert_eq!(references, vec!["manual.txt".to_string()]);
}

#[tokio::test]
async fn test_disabled_document_is_excluded_while_chunks_remain_indexed() {
    let harness = Harness::new().await;
    harness
        .registry
        .register(NewDocument {
            id: "doc-1",
            file_name: "guide.txt",
            file_size: 10,
            file_type: "txt",
            file_hash: "hash-1",
        })
        .await
        .unwrap();
    harness
        .index
        .upsert(
            COLLECTION,
            vec![ChunkRecord {
                chunk_id: "doc-1_0".to_string(),
                document_id: "doc-1".to_string(),
                document_name: "guide.txt".to_string(),
                text: "the answer lives here".to_string(),
                dense_vector: vec![0.0; 3],
            }],
        )
        .await
        .unwrap();

    // Disable the document; the chunk stays in the vector index.
    assert!(harness.disabled.toggle("doc-1").await.unwrap());
    assert_eq!(harness.index.chunk_count(), 1);

    let coordinator = harness.coordinator(threshold_config(0.0));
    let (chunks, references) = coordinator
        .retrieve(&[], "answer", &["answer".to_string()])
        .await
        .unwrap();

    assert!(chunks.is_empty(), "disabled documents must never surface");
    assert!(references.is_empty());
}

#[tokio::test]
async fn test_judgment_failure_is_treated_as_not_relevant() {
    let harness = Harness::new().await;
    harness.index.script_search(
        "q1",
        vec![
            scored("passage one", 0.8, "d1", "a.txt"),
            scored("passage two", 0.7, "d2", "b.txt"),
        ],
    );
    // One judgment errors, the other times out at the provider.
    harness.chat.push(MockReply::ApiError("boom".to_string()));
    harness.chat.push(MockReply::ApiError("boom".to_string()));

    let config = RetrievalConfig {
        judge_strategy: JudgeStrategy::Llm,
        ..RetrievalConfig::default()
    };
    let coordinator = harness.coordinator(config);
    let (chunks, _) = coordinator
        .retrieve(&[], "question", &["q1".to_string()])
        .await
        .unwrap();

    assert!(
        chunks.is_empty(),
        "failed judgments degrade to not-relevant, never to an error"
    );
}

#[tokio::test]
async fn test_relevant_chunks_are_kept_in_rank_order() {
    let harness = Harness::new().await;
    harness.index.script_search(
        "q1",
        vec![
            scored("high passage", 0.9, "d1", "a.txt"),
            scored("low passage", 0.2, "d2", "b.txt"),
        ],
    );
    harness.chat.push(MockReply::Text("yes".to_string()));
    harness.chat.push(MockReply::Text("yes".to_string()));

    let config = RetrievalConfig {
        judge_strategy: JudgeStrategy::Llm,
        ..RetrievalConfig::default()
    };
    let coordinator = harness.coordinator(config);
    let (chunks, references) = coordinator
        .retrieve(&[], "question", &["q1".to_string()])
        .await
        .unwrap();

    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text, "high passage");
    assert_eq!(references, vec!["a.txt".to_string(), "b.txt".to_string()]);
}

#[tokio::test]
async fn test_gate_skips_retrieval_when_votes_say_no() {
    let harness = Harness::new().await;
    // A scripted search that must never be consulted.
    harness
        .index
        .script_search("q1", vec![scored("passage", 0.9, "d1", "a.txt")]);
    harness.chat.push(MockReply::Text("no".to_string()));
    harness.chat.push(MockReply::Text("no".to_string()));

    let config = RetrievalConfig {
        gate_enabled: true,
        judge_strategy: JudgeStrategy::Threshold { min_score: 0.0 },
        ..RetrievalConfig::default()
    };
    let coordinator = harness.coordinator(config);
    let (chunks, references) = coordinator
        .retrieve(&[], "question", &["q1".to_string(), "q2".to_string()])
        .await
        .unwrap();

    assert!(chunks.is_empty());
    assert!(references.is_empty());
    assert_eq!(harness.chat.calls().len(), 2, "one gate vote per query");
}

#[tokio::test]
async fn test_half_yes_votes_let_retrieval_proceed() {
    let harness = Harness::new().await;
    harness
        .index
        .script_search("q1", vec![scored("passage", 0.9, "d1", "a.txt")]);
    harness.index.script_search("q2", vec![]);
    harness.chat.push(MockReply::Text("yes".to_string()));
    harness.chat.push(MockReply::Text("no".to_string()));

    let config = RetrievalConfig {
        gate_enabled: true,
        judge_strategy: JudgeStrategy::Threshold { min_score: 0.0 },
        ..RetrievalConfig::default()
    };
    let coordinator = harness.coordinator(config);
    let (chunks, _) = coordinator
        .retrieve(&[], "question", &["q1".to_string(), "q2".to_string()])
        .await
        .unwrap();

    assert_eq!(chunks.len(), 1, "a split vote still retrieves");
}

#[tokio::test]
async fn test_empty_corpus_returns_empty_not_error() {
    let harness = Harness::new().await;

    let coordinator = harness.coordinator(threshold_config(0.0));
    let (chunks, references) = coordinator
        .retrieve(&[], "anything", &["anything".to_string()])
        .await
        .unwrap();

    assert!(chunks.is_empty());
    assert!(references.is_empty());
}

#[tokio::test]
async fn test_results_truncate_to_top_k() {
    let harness = Harness::new().await;
    let hits: Vec<ScoredChunk> = (0..8)
        .map(|i| scored(&format!("passage {i}"), 1.0 - i as f64 * 0.1, "d1", "a.txt"))
        .collect();
    harness.index.script_search("q1", hits);

    let config = RetrievalConfig {
        top_k: 3,
        judge_strategy: JudgeStrategy::Threshold { min_score: 0.0 },
        ..RetrievalConfig::default()
    };
    let coordinator = harness.coordinator(config);
    let (chunks, _) = coordinator
        .retrieve(&[], "question", &["q1".to_string()])
        .await
        .unwrap();

    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[0].text, "passage 0");
}
