#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! sea-orm implementation of [`MessageStore`].

mod convert;

use async_trait::async_trait;
use parley_core::{
    Agent, ChatRecord, Direction, MessageRecord, MessageStore, NewChatRecord, NewMessage, Page,
    Role, TimeRange, monotonic_millis,
};
use parley_entities::{agents, chat_messages, messages, roles};
use sea_orm::sea_query::Condition;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectOptions, ConnectionTrait, Database,
    DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Schema, Set,
};
use tracing::{debug, info};

fn is_table_already_exists_error(err: &DbErr) -> bool {
    err.to_string().contains("table") && err.to_string().contains("already exists")
}

fn time_bounds<C: ColumnTrait>(column: C, range: TimeRange) -> Condition {
    Condition::all()
        .add_option(range.from.map(|from| column.gte(from)))
        .add_option(range.to.map(|to| column.lte(to)))
}

pub struct DatabaseStore {
    db: DatabaseConnection,
}

impl DatabaseStore {
    /// Connect and create any missing tables.
    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        info!("Connecting to database: {}", database_url);
        let mut options = ConnectOptions::new(database_url.to_owned());
        options.sqlx_logging(false);
        // Every pooled connection to an in-memory sqlite URL opens its own
        // empty database.
        if database_url.starts_with("sqlite::memory:") {
            options.max_connections(1).min_connections(1);
        }
        let db = Database::connect(options).await?;
        let store = Self { db };
        store.ensure_schema().await?;
        info!("DatabaseStore initialized");
        Ok(store)
    }

    #[must_use]
    pub const fn from_connection(db: DatabaseConnection) -> Self {
        Self { db }
    }

    #[must_use]
    pub const fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        let backend = self.db.get_database_backend();
        let schema = Schema::new(backend);
        let statements = [
            schema.create_table_from_entity(roles::Entity),
            schema.create_table_from_entity(agents::Entity),
            schema.create_table_from_entity(messages::Entity),
            schema.create_table_from_entity(chat_messages::Entity),
        ];
        for stmt in &statements {
            match self
                .db
                .execute_unprepared(&backend.build(stmt).to_string())
                .await
            {
                Ok(_) => {}
                Err(e) if is_table_already_exists_error(&e) => {
                    debug!("Table already exists, skipping creation");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    pub async fn create_role(
        &self,
        name: &str,
        description: Option<&str>,
        system_memory: Option<&str>,
    ) -> anyhow::Result<Role> {
        let model = roles::ActiveModel {
            name: Set(name.to_string()),
            description: Set(description.map(str::to_string)),
            system_memory: Set(system_memory.map(str::to_string)),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Created role {} ({})", model.id, model.name);
        Ok(convert::role_from_model(model))
    }

    pub async fn create_agent(
        &self,
        name: &str,
        role_id: Option<i64>,
        model_type: Option<&str>,
        model_name: Option<&str>,
    ) -> anyhow::Result<Agent> {
        let model = agents::ActiveModel {
            name: Set(name.to_string()),
            role_id: Set(role_id),
            model_type: Set(model_type.map(str::to_string)),
            model_name: Set(model_name.map(str::to_string)),
            description: Set(None),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        info!("Created agent {} ({})", model.id, model.name);
        Ok(convert::agent_from_model(model))
    }

    async fn newest_messages(
        &self,
        condition: Condition,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        let models = messages::Entity::find()
            .filter(condition)
            .order_by_desc(messages::Column::CreatedAt)
            .order_by_desc(messages::Column::Id)
            .limit(limit)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().map(convert::message_from_model).collect())
    }

    async fn paged_chats(
        &self,
        condition: Condition,
        page: Page,
    ) -> anyhow::Result<Vec<ChatRecord>> {
        let models = chat_messages::Entity::find()
            .filter(condition)
            .order_by_asc(chat_messages::Column::CreatedAt)
            .order_by_asc(chat_messages::Column::Id)
            .offset(page.offset())
            .limit(page.size)
            .all(&self.db)
            .await?;

        Ok(models.into_iter().filter_map(convert::chat_from_model).collect())
    }
}

#[async_trait]
impl MessageStore for DatabaseStore {
    async fn insert_message(&self, message: &NewMessage) -> anyhow::Result<i64> {
        let model = messages::ActiveModel {
            sender_agent_id: Set(message.sender_agent_id),
            receiver_agent_id: Set(message.receiver_agent_id),
            session_id: Set(message.session_id.clone()),
            room_id: Set(message.room_id.clone()),
            content: Set(message.content.clone()),
            model_type: Set(message.model_type.clone()),
            model_name: Set(message.model_name.clone()),
            role_id: Set(message.role_id),
            direction: Set(message.direction.to_string()),
            created_at: Set(message.created_at),
            round_id: Set(message.round_id),
            is_autonomous: Set(message.is_autonomous),
            metadata: Set(message.metadata.clone()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        debug!("Inserted {} message {}", message.direction, model.id);
        Ok(model.id)
    }

    async fn agent_by_id(&self, id: i64) -> anyhow::Result<Option<Agent>> {
        let model = agents::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(convert::agent_from_model))
    }

    async fn role_by_id(&self, id: i64) -> anyhow::Result<Option<Role>> {
        let model = roles::Entity::find_by_id(id).one(&self.db).await?;
        Ok(model.map(convert::role_from_model))
    }

    async fn insert_chat(&self, record: &NewChatRecord) -> anyhow::Result<i64> {
        let model = chat_messages::ActiveModel {
            kind: Set(record.kind.to_string()),
            from_user_id: Set(record.from_user_id.clone()),
            to_user_id: Set(record.to_user_id.clone()),
            room_id: Set(record.room_id.clone()),
            content: Set(record.content.clone()),
            created_at: Set(monotonic_millis()),
            ..Default::default()
        }
        .insert(&self.db)
        .await?;

        debug!("Inserted {} chat message {}", record.kind, model.id);
        Ok(model.id)
    }

    async fn recent_in_room(
        &self,
        room_id: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        self.newest_messages(
            Condition::all().add(messages::Column::RoomId.eq(room_id)),
            limit,
        )
        .await
    }

    async fn recent_in_session(
        &self,
        session_id: &str,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        self.newest_messages(
            Condition::all().add(messages::Column::SessionId.eq(session_id)),
            limit,
        )
        .await
    }

    async fn recent_inbound_private(
        &self,
        agent_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        self.newest_messages(
            Condition::all()
                .add(messages::Column::ReceiverAgentId.eq(agent_id))
                .add(messages::Column::Direction.eq(Direction::In.to_string())),
            limit,
        )
        .await
    }

    async fn recent_in_room_by_round(
        &self,
        room_id: &str,
        round_id: i64,
        limit: u64,
    ) -> anyhow::Result<Vec<MessageRecord>> {
        self.newest_messages(
            Condition::all()
                .add(messages::Column::RoomId.eq(room_id))
                .add(messages::Column::RoundId.eq(round_id)),
            limit,
        )
        .await
    }

    async fn group_history(
        &self,
        room_id: &str,
        range: TimeRange,
        page: Page,
    ) -> anyhow::Result<Vec<ChatRecord>> {
        let condition = Condition::all()
            .add(chat_messages::Column::Kind.eq(parley_core::ChatKind::GroupMsg.to_string()))
            .add(chat_messages::Column::RoomId.eq(room_id))
            .add(time_bounds(chat_messages::Column::CreatedAt, range));
        self.paged_chats(condition, page).await
    }

    async fn private_history(
        &self,
        user_a: &str,
        user_b: &str,
        range: TimeRange,
        page: Page,
    ) -> anyhow::Result<Vec<ChatRecord>> {
        let between = Condition::any()
            .add(
                Condition::all()
                    .add(chat_messages::Column::FromUserId.eq(user_a))
                    .add(chat_messages::Column::ToUserId.eq(user_b)),
            )
            .add(
                Condition::all()
                    .add(chat_messages::Column::FromUserId.eq(user_b))
                    .add(chat_messages::Column::ToUserId.eq(user_a)),
            );
        let condition = Condition::all()
            .add(chat_messages::Column::Kind.eq(parley_core::ChatKind::PrivateMsg.to_string()))
            .add(between)
            .add(time_bounds(chat_messages::Column::CreatedAt, range));
        self.paged_chats(condition, page).await
    }
}
