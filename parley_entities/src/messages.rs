use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Agent-level exchange record. Rows are never updated after insert.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub sender_agent_id: Option<i64>,
    pub receiver_agent_id: Option<i64>,
    pub session_id: Option<String>,
    pub room_id: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub model_type: Option<String>,
    pub model_name: Option<String>,
    pub role_id: Option<i64>,
    /// `IN` or `OUT`.
    pub direction: String,
    /// Epoch milliseconds.
    pub created_at: i64,
    pub round_id: Option<i64>,
    pub is_autonomous: bool,
    #[sea_orm(column_type = "Text", nullable)]
    pub metadata: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
