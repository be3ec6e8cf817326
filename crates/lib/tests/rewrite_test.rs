//! # Query Rewriter Tests
//!
//! The rewriter must always hand the pipeline a usable, non-empty query list:
//! valid model output is parsed and validated, malformed output is retried a
//! bounded number of times, and exhaustion falls back to the original query.

use docchat::rewrite::QueryRewriter;
use docchat_test_utils::{MockChatProvider, MockReply};

#[tokio::test]
async fn test_valid_response_is_parsed() {
    let chat = MockChatProvider::new(vec![MockReply::Text(
        r#"[{"question": "one"}, {"question": "two"}, {"question": "three"}]"#.to_string(),
    )]);
    let rewriter = QueryRewriter::new(Box::new(chat.clone()), 0.7, 3);

    let questions = rewriter.expand("original question", 3).await;
    assert_eq!(questions, vec!["one", "two", "three"]);
    assert_eq!(chat.calls().len(), 1, "no retry needed on valid output");
}

#[tokio::test]
async fn test_fenced_json_is_accepted() {
    let chat = MockChatProvider::new(vec![MockReply::Text(
        "```json\n[{\"question\": \"a\"}, {\"question\": \"b\"}]\n```".to_string(),
    )]);
    let rewriter = QueryRewriter::new(Box::new(chat), 0.7, 3);

    let questions = rewriter.expand("q", 2).await;
    assert_eq!(questions, vec!["a", "b"]);
}

#[tokio::test]
async fn test_all_attempts_malformed_falls_back_to_original() {
    let chat = MockChatProvider::new(vec![
        MockReply::Text("not json at all".to_string()),
        MockReply::Text(r#"{"question": "an object, not an array"}"#.to_string()),
        MockReply::ApiError("rate limited".to_string()),
    ]);
    let rewriter = QueryRewriter::new(Box::new(chat.clone()), 0.7, 3);

    let questions = rewriter.expand("the original", 3).await;
    assert_eq!(questions, vec!["the original".to_string()]);
    assert_eq!(chat.calls().len(), 3, "exactly three attempts");
}

#[tokio::test]
async fn test_too_few_paraphrases_triggers_retry() {
    let chat = MockChatProvider::new(vec![
        MockReply::Text(r#"[{"question": "only one"}]"#.to_string()),
        MockReply::Text(
            r#"[{"question": "one"}, {"question": "two"}, {"question": "three"}]"#.to_string(),
        ),
    ]);
    let rewriter = QueryRewriter::new(Box::new(chat.clone()), 0.7, 3);

    let questions = rewriter.expand("q", 3).await;
    assert_eq!(questions.len(), 3);
    assert_eq!(chat.calls().len(), 2);
}

#[tokio::test]
async fn test_entries_without_question_key_are_ignored() {
    let chat = MockChatProvider::new(vec![MockReply::Text(
        r#"[{"q": "wrong key"}, {"question": "right"}, {"question": ""}]"#.to_string(),
    )]);
    let rewriter = QueryRewriter::new(Box::new(chat), 0.7, 1);

    // Only one well-formed entry survives, below the requested count, and
    // with a single attempt allowed the fallback applies.
    let questions = rewriter.expand("q", 2).await;
    assert_eq!(questions, vec!["q".to_string()]);
}
