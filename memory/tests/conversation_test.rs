//! Behavioural tests for conversation memory through its public API.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use pai_memory::{
    AesGcmSealer, Clock, ConversationLog, ConversationMemory, ConversationMessage,
    DEFAULT_HISTORY_LIMIT, ManualClock, PassthroughSealer, Role,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn contents(messages: &[ConversationMessage]) -> Vec<String> {
    messages.iter().map(|m| m.content.clone()).collect()
}

#[tokio::test]
async fn test_appending_to_one_session_never_changes_another() {
    let memory = ConversationLog::in_memory(Arc::new(PassthroughSealer));
    let now = Utc::now();

    memory
        .append("b", ConversationMessage::user("hello from b", now))
        .await
        .unwrap();
    let before = memory.get_recent("b", DEFAULT_HISTORY_LIMIT).await.unwrap();

    for i in 0..10 {
        memory
            .append("a", ConversationMessage::user(format!("a{i}"), now))
            .await
            .unwrap();
    }

    let after = memory.get_recent("b", DEFAULT_HISTORY_LIMIT).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_out_of_order_arrival_reads_back_chronologically() {
    let memory = ConversationLog::in_memory(Arc::new(PassthroughSealer));
    let t1 = Utc::now();
    let t2 = t1 + TimeDelta::milliseconds(10);
    let t3 = t1 + TimeDelta::milliseconds(20);

    memory
        .append_all(
            "s",
            vec![
                ConversationMessage::assistant("second", t2),
                ConversationMessage::user("first", t1),
                ConversationMessage::user("third", t3),
            ],
        )
        .await
        .unwrap();

    let messages = memory.get_recent("s", DEFAULT_HISTORY_LIMIT).await.unwrap();
    assert_eq!(contents(&messages), vec!["first", "second", "third"]);
    assert_eq!(messages[1].role, Role::Assistant);
}

#[tokio::test]
async fn test_expired_messages_vanish_without_purge() {
    let temp_dir = TempDir::new().unwrap();
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let memory = ConversationLog::open(temp_dir.path(), Arc::new(AesGcmSealer::new(&[1u8; 32])))
        .await
        .unwrap()
        .with_clock(clock.clone());

    memory
        .append("s", ConversationMessage::user("remember me", clock.now()))
        .await
        .unwrap();
    assert_eq!(memory.get_recent("s", 50).await.unwrap().len(), 1);

    clock.advance(TimeDelta::hours(24) + TimeDelta::seconds(1));
    assert!(memory.get_recent("s", 50).await.unwrap().is_empty());

    // Still on disk until purged.
    assert_eq!(std::fs::read_dir(temp_dir.path()).unwrap().count(), 1);
    assert_eq!(memory.purge_expired().await.unwrap(), 1);
}
