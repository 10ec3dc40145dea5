//! Chain entity - The fixed four-slot inspector chain of one initiator.
//!
//! Any slot may be empty; routing skips empty slots.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Chain database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chains")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Initiator owning this chain
    #[sea_orm(unique)]
    pub initiator_id: i64,
    #[sea_orm(nullable)]
    pub first_inspector_id: Option<i64>,
    #[sea_orm(nullable)]
    pub second_inspector_id: Option<i64>,
    #[sea_orm(nullable)]
    pub third_inspector_id: Option<i64>,
    #[sea_orm(nullable)]
    pub fourth_inspector_id: Option<i64>,
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeUtc>,
}

impl Model {
    /// The inspector slots in routing order.
    #[must_use]
    pub const fn slots(&self) -> [Option<i64>; 4] {
        [
            self.first_inspector_id,
            self.second_inspector_id,
            self.third_inspector_id,
            self.fourth_inspector_id,
        ]
    }

    /// The inspector bound to a 1-based step, if any.
    #[must_use]
    pub fn inspector_at(&self, step: i32) -> Option<i64> {
        crate::core::routing::slot_at(&self.slots(), step)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::InitiatorId",
        to = "super::user::Column::Id"
    )]
    Initiator,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Initiator.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
