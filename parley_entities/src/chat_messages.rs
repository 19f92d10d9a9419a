use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Group or private chat frame relayed by the gateway.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// `GROUP_MSG` or `PRIVATE_MSG`.
    pub kind: String,
    pub from_user_id: String,
    pub to_user_id: Option<String>,
    pub room_id: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
