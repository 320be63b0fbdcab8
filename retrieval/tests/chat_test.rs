//! Chat turns against a mock completion API.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use pai_memory::{ConversationMemory, ManualClock, PassthroughSealer, Role};
use pai_retrieval::{
    Assistant, ChatRequest, HttpCompletionProvider, MemoryRequest, MemoryResponse,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn assistant_with(server: &MockServer, clock: Arc<ManualClock>) -> Assistant {
    Assistant::builder()
        .in_memory()
        .with_sealer(Arc::new(PassthroughSealer))
        .with_clock(clock)
        .with_completion(Arc::new(HttpCompletionProvider::new(server.uri(), "test-model")))
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_second_turn_sees_first_turn_history() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "user", "content": "My name is Ada." },
                { "role": "assistant", "content": "Noted." },
                { "role": "user", "content": "What is my name?" },
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "Your name is Ada." }]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "Noted." }]
        })))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let assistant = assistant_with(&mock_server, clock.clone()).await;

    let first = assistant
        .chat(ChatRequest::new("My name is Ada."))
        .await
        .unwrap();
    assert_eq!(first.response, "Noted.");

    clock.advance(TimeDelta::seconds(5));
    let second = assistant
        .chat(ChatRequest::new("What is my name?").with_session(first.session_id.as_str()))
        .await
        .unwrap();
    assert_eq!(second.response, "Your name is Ada.");
    assert_eq!(second.session_id, first.session_id);

    let response = assistant
        .handle(MemoryRequest::Retrieve {
            session_id: Some(first.session_id.clone()),
            category: None,
        })
        .await
        .unwrap();
    let MemoryResponse::Conversation { messages, count, .. } = response else {
        panic!("expected a conversation response");
    };
    assert_eq!(count, 4);
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
}

#[tokio::test]
async fn test_completion_outage_still_answers_and_records() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal detail"))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let assistant = assistant_with(&mock_server, clock).await;

    let reply = assistant.chat(ChatRequest::new("hello")).await.unwrap();
    assert!(!reply.response.contains("internal detail"));
    assert_eq!(reply.response, pai_retrieval::chat::FAILED_COMPLETION_REPLY);

    let stored = assistant
        .conversations()
        .get_recent(&reply.session_id, 50)
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_conversation_expires_after_retention() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "content": [{ "type": "text", "text": "ok" }]
        })))
        .mount(&mock_server)
        .await;

    let clock = Arc::new(ManualClock::new(Utc::now()));
    let assistant = assistant_with(&mock_server, clock.clone()).await;
    let reply = assistant.chat(ChatRequest::new("hello")).await.unwrap();

    clock.advance(TimeDelta::hours(25));
    assert!(
        assistant
            .conversations()
            .get_recent(&reply.session_id, 50)
            .await
            .unwrap()
            .is_empty()
    );
    assert_eq!(assistant.purge_expired().await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_message_is_a_caller_error() {
    let mock_server = MockServer::start().await;
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let assistant = assistant_with(&mock_server, clock).await;

    let err = assistant.chat(ChatRequest::new("")).await.unwrap_err();
    assert!(err.is_invalid_request());
    assert_eq!(err.message, "Message is required");
}
