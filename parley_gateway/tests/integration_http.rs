//! HTTP surface served on an ephemeral port.

use std::sync::Arc;

use parley_conversation::{Orchestrator, RoundRunner};
use parley_core::testing::{InMemoryMessageStore, ScriptedGenerator};
use parley_gateway::{AppState, build_router};
use parley_memory::{InMemoryListStore, MemoryWindowStore};
use serde_json::{Value, json};

async fn spawn_server(
    store: Arc<InMemoryMessageStore>,
    generator: Arc<ScriptedGenerator>,
) -> String {
    let memory = Arc::new(MemoryWindowStore::new(Arc::new(InMemoryListStore::new())));
    let orchestrator = Arc::new(Orchestrator::new(store, memory, generator));
    let rounds = Arc::new(RoundRunner::new(Arc::clone(&orchestrator)).with_max_batch_rounds(5));
    let state = AppState::new(orchestrator, rounds, 16);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.ok();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_health() {
    let base = spawn_server(
        Arc::new(InMemoryMessageStore::new()),
        ScriptedGenerator::fixed("unused"),
    )
    .await;

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_private_conversation_and_session_feed() {
    let store = Arc::new(InMemoryMessageStore::new());
    store.add_agent(2, None, None).await;
    let base = spawn_server(store, ScriptedGenerator::fixed("hello back")).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/api/conversation/private"))
        .json(&json!({
            "senderAgentId": 1,
            "receiverAgentId": 2,
            "sessionId": "s-1-2",
            "content": "hello"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reply"], "hello back");

    let body: Value = client
        .get(format!("{base}/api/messages/session/s-1-2?limit=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["direction"], "OUT");
}

#[tokio::test]
async fn test_unknown_agent_maps_to_not_found() {
    let base = spawn_server(
        Arc::new(InMemoryMessageStore::new()),
        ScriptedGenerator::fixed("unused"),
    )
    .await;

    let resp = reqwest::Client::new()
        .post(format!("{base}/api/conversation/private"))
        .json(&json!({
            "senderAgentId": 1,
            "receiverAgentId": 42,
            "sessionId": "s-1-42",
            "content": "hello"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("42"));
}

#[tokio::test]
async fn test_round_batch_reports_rounds_run() {
    let store = Arc::new(InMemoryMessageStore::new());
    store.add_agent(1, None, None).await;
    let generator = Arc::new(ScriptedGenerator::new("poster", |_| {
        Ok(r#"{"action":"public_post","content":"round post"}"#.to_string())
    }));
    let base = spawn_server(store, generator).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{base}/api/round/run-batch"))
        .json(&json!({ "participantIds": [1], "startRoundId": 10, "rounds": 2 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "status": "ok", "roundsRun": 2 }));

    let body: Value = client
        .get(format!("{base}/api/messages/public/by-round?roundId=11"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["roundId"], 11);
    assert_eq!(items[0]["content"], "round post");
}

#[tokio::test]
async fn test_chat_history_rejects_bad_timestamps() {
    let base = spawn_server(
        Arc::new(InMemoryMessageStore::new()),
        ScriptedGenerator::fixed("unused"),
    )
    .await;

    let resp = reqwest::get(format!("{base}/api/chat/group/r1/messages?startTime=soon"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = reqwest::get(format!(
        "{base}/api/chat/private/messages?userA=A&userB=B&page=2&size=5"
    ))
    .await
    .unwrap()
    .json()
    .await
    .unwrap();
    assert_eq!(body["page"], 2);
    assert_eq!(body["size"], 5);
    assert!(body["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_history_survives_huge_page_numbers() {
    let base = spawn_server(
        Arc::new(InMemoryMessageStore::new()),
        ScriptedGenerator::fixed("unused"),
    )
    .await;

    let resp = reqwest::get(format!(
        "{base}/api/chat/group/r1/messages?page={}&size=20",
        u64::MAX
    ))
    .await
    .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert!(body["items"].as_array().unwrap().is_empty());

    let resp = reqwest::get(format!("{base}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_round_batch_rejects_oversized_and_overflowing_batches() {
    let store = Arc::new(InMemoryMessageStore::new());
    store.add_agent(1, None, None).await;
    let generator = Arc::new(ScriptedGenerator::new("poster", |_| {
        Ok(r#"{"action":"public_post","content":"round post"}"#.to_string())
    }));
    let base = spawn_server(store.clone(), generator).await;
    let client = reqwest::Client::new();

    for body in [
        json!({ "participantIds": [1], "startRoundId": 1, "rounds": 4_000_000_000_u32 }),
        json!({ "participantIds": [1], "startRoundId": i64::MAX, "rounds": 2 }),
    ] {
        let resp = client
            .post(format!("{base}/api/round/run-batch"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let error: Value = resp.json().await.unwrap();
        assert!(error["error"].as_str().unwrap().contains("invalid round batch"));
    }
    assert!(store.messages().await.is_empty());
}
