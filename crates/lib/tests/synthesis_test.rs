//! # Answer Synthesizer Tests

use docchat::errors::GatewayError;
use docchat::synthesis::AnswerSynthesizer;
use docchat::types::{Message, MessageRole, RetrievedChunk};
use docchat_test_utils::{MockChatProvider, MockReply};

fn message(role: MessageRole, content: &str, sequence: i64) -> Message {
    Message {
        id: format!("m{sequence}"),
        conversation_id: "c1".to_string(),
        role,
        content: content.to_string(),
        sequence,
        created_at: "2025-01-01T00:00:00+00:00".to_string(),
    }
}

#[tokio::test]
async fn test_instruction_embeds_date_and_chunks() {
    let chat = MockChatProvider::new(vec![MockReply::Text("grounded answer".to_string())]);
    let synthesizer = AnswerSynthesizer::new(Box::new(chat.clone()), 0.7);

    let chunks = vec![RetrievedChunk {
        text: "the warranty lasts two years".to_string(),
        score: 0.9,
        document_name: "warranty.txt".to_string(),
    }];
    let history = vec![message(MessageRole::User, "how long is the warranty?", 1)];

    let result = synthesizer.synthesize(&chunks, &history).await.unwrap();
    assert_eq!(result.answer, "grounded answer");
    assert!(result.instruction.contains("the warranty lasts two years"));
    assert!(result.instruction.contains("warranty.txt"));

    // The embedded date is a concrete yyyy-mm-dd, not the raw placeholder.
    assert!(!result.instruction.contains("{current_date}"));
    assert!(!result.instruction.contains("{context}"));

    // The instruction leads as the system turn, followed by the history.
    let calls = chat.calls();
    assert_eq!(calls.len(), 1);
    let (system, user) = &calls[0];
    assert_eq!(system, &result.instruction);
    assert_eq!(user, "how long is the warranty?");
}

#[tokio::test]
async fn test_empty_grounding_block_still_produces_an_answer() {
    let chat = MockChatProvider::new(vec![MockReply::Text(
        "answered from general knowledge".to_string(),
    )]);
    let synthesizer = AnswerSynthesizer::new(Box::new(chat), 0.7);
    let history = vec![message(MessageRole::User, "hello there", 1)];

    let result = synthesizer.synthesize(&[], &history).await.unwrap();
    assert!(!result.answer.is_empty());
    assert!(result.instruction.contains("# Reference passages"));
}

#[tokio::test]
async fn test_gateway_failure_is_terminal() {
    let chat = MockChatProvider::new(vec![MockReply::ApiError("upstream down".to_string())]);
    let synthesizer = AnswerSynthesizer::new(Box::new(chat.clone()), 0.7);
    let history = vec![message(MessageRole::User, "hi", 1)];

    let result = synthesizer.synthesize(&[], &history).await;
    assert!(matches!(result, Err(GatewayError::Api(_))));
    assert_eq!(chat.calls().len(), 1, "no retry at the synthesis stage");
}
