//! User role entity - A user holds one row per role.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// What a user is allowed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Role {
    #[sea_orm(string_value = "INITIATOR")]
    Initiator,
    #[sea_orm(string_value = "INSPECTOR")]
    Inspector,
    #[sea_orm(string_value = "PAYEER")]
    Payeer,
    #[sea_orm(string_value = "ADMIN")]
    Admin,
    /// Registered but waiting for an administrator
    #[sea_orm(string_value = "UNKNOWN")]
    Unknown,
}

impl Role {
    /// Human-readable role name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Initiator => "initiator",
            Self::Inspector => "inspector",
            Self::Payeer => "payeer",
            Self::Admin => "administrator",
            Self::Unknown => "pending",
        }
    }
}

/// User role database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_roles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: i64,
    pub role: Role,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
