//! Message entity - Pointer to a chat post that shows an order to someone.
//!
//! Rows are never updated: when a participant's view is superseded the old rows
//! are deleted and new ones inserted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Whose view of the order a message belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MessageKind {
    #[sea_orm(string_value = "INITIATOR")]
    Initiator,
    #[sea_orm(string_value = "INSPECTOR")]
    Inspector,
    #[sea_orm(string_value = "PAYEER")]
    Payeer,
}

/// Message database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Discord channel id
    pub chat_id: String,
    /// Discord message id
    pub message_id: String,
    pub kind: MessageKind,
    pub order_id: i64,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
