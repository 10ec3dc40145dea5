//! Setting entity - Key-value pairs for runtime configuration.
//! Holds the escalation bands and the payeer chat, both editable by admins
//! while the bot is running.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Setting database model - stores key-value configuration pairs
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "settings")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Configuration key (e.g., `"relation_conditions"`)
    #[sea_orm(unique)]
    pub key: String,
    /// Configuration value stored as string
    #[sea_orm(column_type = "Text")]
    pub value: String,
    /// When this configuration was last modified
    pub updated_at: DateTimeUtc,
}

/// `Setting` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
