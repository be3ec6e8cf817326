//! # Conversation Store Tests
//!
//! Covers the per-conversation sequence invariant (unique, strictly
//! increasing, first = 1) including under concurrent appends, cascade
//! deletion, and the newest-first listing order.

use docchat::conversations::{ConversationError, ConversationStore};
use docchat::types::MessageRole;
use docchat_test_utils::TestSetup;
use futures::future::join_all;

#[tokio::test]
async fn test_sequences_start_at_one_and_increase() {
    let setup = TestSetup::new().await.unwrap();
    let store = ConversationStore::new(setup.provider.clone());

    let conversation = store.create("seq test", None).await.unwrap();
    for content in ["first", "second", "third"] {
        store
            .append_message(&conversation.id, MessageRole::User, content)
            .await
            .unwrap();
    }

    let messages = store.list_messages(&conversation.id).await.unwrap();
    let sequences: Vec<i64> = messages.iter().map(|m| m.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);
    assert_eq!(messages[0].content, "first");
    assert_eq!(messages[2].content, "third");
}

#[tokio::test]
async fn test_concurrent_appends_never_collide() {
    let setup = TestSetup::new().await.unwrap();
    let store = ConversationStore::new(setup.provider.clone());
    let conversation = store.create("concurrent", None).await.unwrap();

    let appends = (0..10).map(|i| {
        let store = store.clone();
        let id = conversation.id.clone();
        async move {
            store
                .append_message(&id, MessageRole::User, &format!("msg {i}"))
                .await
                .unwrap()
        }
    });
    let mut sequences: Vec<i64> = join_all(appends).await.iter().map(|m| m.sequence).collect();
    sequences.sort_unstable();

    assert_eq!(sequences, (1..=10).collect::<Vec<i64>>());
}

#[tokio::test]
async fn test_delete_cascades_to_messages() {
    let setup = TestSetup::new().await.unwrap();
    let store = ConversationStore::new(setup.provider.clone());
    let conversation = store.create("to delete", None).await.unwrap();
    store
        .append_message(&conversation.id, MessageRole::User, "hello")
        .await
        .unwrap();

    assert!(store.delete(&conversation.id).await.unwrap());

    assert!(matches!(
        store.get(&conversation.id).await,
        Err(ConversationError::NotFound(_))
    ));
    let orphans = store.list_messages(&conversation.id).await.unwrap();
    assert!(orphans.is_empty(), "messages must be cascade-deleted");
}

#[tokio::test]
async fn test_append_to_missing_conversation_is_not_found() {
    let setup = TestSetup::new().await.unwrap();
    let store = ConversationStore::new(setup.provider.clone());

    let result = store
        .append_message("no-such-id", MessageRole::User, "hello")
        .await;
    assert!(matches!(result, Err(ConversationError::NotFound(_))));
}

#[tokio::test]
async fn test_list_is_newest_first() {
    let setup = TestSetup::new().await.unwrap();
    let store = ConversationStore::new(setup.provider.clone());

    // The backdating path used for imports keeps the explicit timestamp.
    let older = store
        .create_with_timestamp("older", None, "2023-01-01T00:00:00+00:00")
        .await
        .unwrap();
    let newer = store.create("newer", None).await.unwrap();

    let listed = store.list(10, 0).await.unwrap();
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].id, older.id);
    assert_eq!(listed[1].created_at, "2023-01-01T00:00:00+00:00");
}

#[tokio::test]
async fn test_update_title_refreshes_updated_at_only() {
    let setup = TestSetup::new().await.unwrap();
    let store = ConversationStore::new(setup.provider.clone());
    let conversation = store
        .create_with_timestamp("old title", None, "2023-01-01T00:00:00+00:00")
        .await
        .unwrap();

    let updated = store.update_title(&conversation.id, "new title").await.unwrap();
    assert_eq!(updated.title, "new title");
    assert_eq!(updated.created_at, conversation.created_at);
    assert_ne!(updated.updated_at, conversation.updated_at);
}

#[tokio::test]
async fn test_metadata_round_trips() {
    let setup = TestSetup::new().await.unwrap();
    let store = ConversationStore::new(setup.provider.clone());
    let metadata = serde_json::json!({ "source": "import", "tag": 7 });

    let conversation = store.create("meta", Some(metadata.clone())).await.unwrap();
    let fetched = store.get(&conversation.id).await.unwrap();
    assert_eq!(fetched.metadata, Some(metadata));
}
