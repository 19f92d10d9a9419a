//! Private and room exchanges against in-memory collaborators.

use std::sync::Arc;

use parley_conversation::{ConversationError, Orchestrator, ParticipantOutcome};
use parley_core::testing::{InMemoryMessageStore, ScriptedGenerator};
use parley_core::{Direction, ExchangeParams, GenerationError, Scope};
use parley_memory::{InMemoryListStore, MemoryWindowStore};

struct Fixture {
    store: Arc<InMemoryMessageStore>,
    memory: Arc<MemoryWindowStore>,
    generator: Arc<ScriptedGenerator>,
    orchestrator: Orchestrator,
}

fn fixture(generator: Arc<ScriptedGenerator>) -> Fixture {
    let store = Arc::new(InMemoryMessageStore::new());
    let memory = Arc::new(MemoryWindowStore::new(Arc::new(InMemoryListStore::new())));
    let orchestrator = Orchestrator::new(store.clone(), memory.clone(), generator.clone());
    Fixture {
        store,
        memory,
        generator,
        orchestrator,
    }
}

#[tokio::test]
async fn test_send_private_persists_in_before_out() {
    let f = fixture(ScriptedGenerator::fixed("fine, thanks"));
    f.store.add_role(10, "You are polite.").await;
    f.store.add_agent(2, Some(10), Some("ollama")).await;

    let params = ExchangeParams::for_round(Some(42));
    let reply = f
        .orchestrator
        .send_private(1, 2, "s-1-2", "how are you?", &params)
        .await
        .unwrap();
    assert_eq!(reply, "fine, thanks");

    let messages = f.store.messages().await;
    assert_eq!(messages.len(), 2);
    let (inbound, outbound) = (&messages[0], &messages[1]);
    assert_eq!(inbound.direction, Direction::In);
    assert_eq!(outbound.direction, Direction::Out);
    assert!(inbound.created_at < outbound.created_at);
    assert_eq!(inbound.round_id, Some(42));
    assert_eq!(outbound.round_id, Some(42));
    assert!(!inbound.is_autonomous);
    assert!(outbound.is_autonomous);
    assert_eq!(outbound.sender_agent_id, Some(2));
    assert_eq!(outbound.receiver_agent_id, Some(1));
    assert_eq!(outbound.role_id, Some(10));
    assert_eq!(outbound.model_type.as_deref(), Some("ollama"));

    let requests = f.generator.requests().await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].system_memory, "You are polite.");
    assert_eq!(requests[0].scope, Scope::Session("s-1-2".to_string()));
    assert_eq!(requests[0].model_type.as_deref(), Some("ollama"));
    assert!(requests[0].window.is_empty());
}

#[tokio::test]
async fn test_send_private_updates_receiver_window() {
    let f = fixture(ScriptedGenerator::fixed("pong"));
    f.store.add_agent(2, None, None).await;

    f.orchestrator
        .send_private(1, 2, "s-1-2", "ping", &ExchangeParams::default())
        .await
        .unwrap();
    f.orchestrator
        .send_private(1, 2, "s-1-2", "ping again", &ExchangeParams::default())
        .await
        .unwrap();

    let window = f
        .memory
        .window(&MemoryWindowStore::key_for_session(2, "s-1-2"))
        .await
        .unwrap();
    assert_eq!(window, vec!["Peer: ping", "Me: pong", "Peer: ping again", "Me: pong"]);

    let second = &f.generator.requests().await[1];
    assert_eq!(second.window, vec!["Peer: ping", "Me: pong"]);
    assert_eq!(second.system_memory, "");
}

#[tokio::test]
async fn test_unknown_receiver_keeps_inbound_record() {
    let f = fixture(ScriptedGenerator::fixed("never"));

    let result = f
        .orchestrator
        .send_private(1, 99, "s-1-99", "hello?", &ExchangeParams::default())
        .await;
    assert!(matches!(result, Err(ConversationError::AgentNotFound(99))));

    let messages = f.store.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].direction, Direction::In);
    assert!(f.generator.requests().await.is_empty());
}

#[tokio::test]
async fn test_generation_failure_surfaces_and_writes_no_reply() {
    let generator = Arc::new(ScriptedGenerator::new("down", |_| {
        Err(GenerationError::Transport("connection refused".to_string()))
    }));
    let f = fixture(generator);
    f.store.add_agent(2, None, None).await;

    let result = f
        .orchestrator
        .send_private(1, 2, "s-1-2", "hi", &ExchangeParams::default())
        .await;
    assert!(matches!(result, Err(ConversationError::Generation(_))));
    assert_eq!(f.store.messages().await.len(), 1);
    assert!(
        f.memory
            .window(&MemoryWindowStore::key_for_session(2, "s-1-2"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_broadcast_isolates_participants() {
    let generator = Arc::new(ScriptedGenerator::new("per-agent", |request| {
        match request.agent_id {
            Some(3) => Err(GenerationError::Timeout(std::time::Duration::from_secs(1))),
            Some(id) => Ok(format!("agent {id} here")),
            None => Ok(String::new()),
        }
    }));
    let f = fixture(generator);
    f.store.add_agent(1, None, None).await;
    f.store.add_agent(3, None, None).await;
    f.store.add_agent(4, None, None).await;

    let summary = f
        .orchestrator
        .broadcast_room("r1", None, &[1, 2, 3, 4], "roll call", &ExchangeParams::for_round(Some(5)))
        .await
        .unwrap();

    let outcomes: Vec<_> = summary.participants.iter().map(|p| &p.outcome).collect();
    assert_eq!(
        outcomes[0],
        &ParticipantOutcome::Replied {
            reply: "agent 1 here".to_string()
        }
    );
    assert!(matches!(outcomes[1], ParticipantOutcome::Skipped { .. }));
    assert!(matches!(outcomes[2], ParticipantOutcome::Failed { .. }));
    assert!(matches!(outcomes[3], ParticipantOutcome::Replied { .. }));

    // One IN plus an OUT for each agent that replied.
    let messages = f.store.messages().await;
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|m| m.room_id.as_deref() == Some("r1")));
    assert!(messages.iter().all(|m| m.round_id == Some(5)));

    let window = f
        .memory
        .window(&MemoryWindowStore::key_for_room(4, "r1"))
        .await
        .unwrap();
    assert_eq!(window, vec!["Broadcast: roll call", "Reply: agent 4 here"]);
}

#[tokio::test]
async fn test_broadcast_without_participants_only_persists() {
    let f = fixture(ScriptedGenerator::fixed("unused"));

    let summary = f
        .orchestrator
        .broadcast_room("PUBLIC", Some(1), &[], "announcement", &ExchangeParams::default())
        .await
        .unwrap();

    assert!(summary.participants.is_empty());
    assert_eq!(f.store.messages().await.len(), 1);
    assert!(f.generator.requests().await.is_empty());
}
