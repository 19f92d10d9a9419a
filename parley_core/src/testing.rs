//! In-memory collaborators for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    Agent, ChatKind, ChatRecord, Direction, GenerationError, GenerationRequest, MessageRecord,
    MessageStore, NewChatRecord, NewMessage, Page, Role, TextGenerator, TimeRange,
    monotonic_millis,
};

#[derive(Default)]
struct Tables {
    messages: Vec<MessageRecord>,
    chats: Vec<ChatRecord>,
    agents: HashMap<i64, Agent>,
    roles: HashMap<i64, Role>,
}

/// A [`MessageStore`] over plain vectors.
#[derive(Default)]
pub struct InMemoryMessageStore {
    tables: Mutex<Tables>,
    fail_inserts: AtomicBool,
}

impl InMemoryMessageStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_role(&self, id: i64, system_memory: &str) {
        self.tables.lock().await.roles.insert(
            id,
            Role {
                id,
                name: format!("role-{id}"),
                description: None,
                system_memory: Some(system_memory.to_string()),
            },
        );
    }

    pub async fn add_agent(&self, id: i64, role_id: Option<i64>, model_type: Option<&str>) {
        self.tables.lock().await.agents.insert(
            id,
            Agent {
                id,
                name: format!("agent-{id}"),
                role_id,
                model_type: model_type.map(str::to_string),
                model_name: Some(format!("model-{id}")),
                description: None,
            },
        );
    }

    /// Make every subsequent insert fail.
    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Messages in insertion order.
    pub async fn messages(&self) -> Vec<MessageRecord> {
        self.tables.lock().await.messages.clone()
    }

    pub async fn chats(&self) -> Vec<ChatRecord> {
        self.tables.lock().await.chats.clone()
    }

    fn check_writable(&self) -> anyhow::Result<()> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            anyhow::bail!("store is read-only");
        }
        Ok(())
    }
}

fn newest_first<F>(messages: &[MessageRecord], limit: u64, filter: F) -> Vec<MessageRecord>
where
    F: Fn(&MessageRecord) -> bool,
{
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    messages
        .iter()
        .rev()
        .filter(|m| filter(m))
        .take(limit)
        .cloned()
        .collect()
}

fn paged(records: Vec<ChatRecord>, page: Page) -> Vec<ChatRecord> {
    let skip = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    let take = usize::try_from(page.size).unwrap_or(usize::MAX);
    records.into_iter().skip(skip).take(take).collect()
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert_message(&self, message: &NewMessage) -> anyhow::Result<i64> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let id = i64::try_from(tables.messages.len())? + 1;
        tables.messages.push(message.clone().into_record(id));
        Ok(id)
    }

    async fn agent_by_id(&self, id: i64) -> anyhow::Result<Option<Agent>> {
        Ok(self.tables.lock().await.agents.get(&id).cloned())
    }

    async fn role_by_id(&self, id: i64) -> anyhow::Result<Option<Role>> {
        Ok(self.tables.lock().await.roles.get(&id).cloned())
    }

    async fn insert_chat(&self, record: &NewChatRecord) -> anyhow::Result<i64> {
        self.check_writable()?;
        let mut tables = self.tables.lock().await;
        let id = i64::try_from(tables.chats.len())? + 1;
        tables.chats.push(ChatRecord {
            id,
            kind: record.kind,
            from_user_id: record.from_user_id.clone(),
            to_user_id: record.to_user_id.clone(),
            room_id: record.room_id.clone(),
            content: record.content.clone(),
            created_at: monotonic_millis(),
        });
        Ok(id)
    }

    async fn recent_in_room(
        &self,
        room_id: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let tables = self.tables.lock().await;
        Ok(newest_first(&tables.messages, limit, |m| {
            m.room_id.as_deref() == Some(room_id)
        }))
    }

    async fn recent_in_session(
        &self,
        session_id: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let tables = self.tables.lock().await;
        Ok(newest_first(&tables.messages, limit, |m| {
            m.session_id.as_deref() == Some(session_id)
        }))
    }

    async fn recent_inbound_private(
        &self,
        agent_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let tables = self.tables.lock().await;
        Ok(newest_first(&tables.messages, limit, |m| {
            m.receiver_agent_id == Some(agent_id) && m.direction == Direction::In
        }))
    }

    async fn recent_in_room_by_round(
        &self,
        room_id: &str,
        round_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let tables = self.tables.lock().await;
        Ok(newest_first(&tables.messages, limit, |m| {
            m.room_id.as_deref() == Some(room_id) && m.round_id == Some(round_id)
        }))
    }

    async fn group_history(
        &self,
        room_id: &str,
        range: TimeRange,
        page: Page,
    ) -> anyhow::Result<Vec<ChatRecord>> {
        let tables = self.tables.lock().await;
        let matching = tables
            .chats
            .iter()
            .filter(|c| {
                c.kind == ChatKind::GroupMsg
                    && c.room_id.as_deref() == Some(room_id)
                    && range.contains(c.created_at)
            })
            .cloned()
            .collect();
        Ok(paged(matching, page))
    }

    async fn private_history(
        &self,
        user_a: &str,
        user_b: &str,
        range: TimeRange,
        page: Page,
    ) -> anyhow::Result<Vec<ChatRecord>> {
        let tables = self.tables.lock().await;
        let matching = tables
            .chats
            .iter()
            .filter(|c| {
                let to = c.to_user_id.as_deref();
                c.kind == ChatKind::PrivateMsg
                    && ((c.from_user_id == user_a && to == Some(user_b))
                        || (c.from_user_id == user_b && to == Some(user_a)))
                    && range.contains(c.created_at)
            })
            .cloned()
            .collect();
        Ok(paged(matching, page))
    }
}

type Responder = dyn Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync;

/// A [`TextGenerator`] answering from a closure and recording every request.
pub struct ScriptedGenerator {
    name: String,
    responder: Box<Responder>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new<F>(name: &str, responder: F) -> Self
    where
        F: Fn(&GenerationRequest) -> Result<String, GenerationError> + Send + Sync + 'static,
    {
        Self {
            name: name.to_string(),
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always answers with `reply`.
    #[must_use]
    pub fn fixed(reply: &str) -> Arc<Self> {
        let reply = reply.to_string();
        Arc::new(Self::new("fixed", move |_| Ok(reply.clone())))
    }

    pub async fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().await.push(request.clone());
        (self.responder)(request)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
