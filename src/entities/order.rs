//! Order entity - One approval request travelling through an inspector chain.
//!
//! `level` is fixed at submission, `step` advances as inspectors approve and
//! reaches 5 once the chain is exhausted. Orders are never deleted; terminal
//! states are kept as the audit trail.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum OrderState {
    /// Transient state before the first insert; rows are written as `Pending`
    #[sea_orm(string_value = "CREATED")]
    Created,
    /// Waiting on an inspector or the payeer
    #[sea_orm(string_value = "PENDING")]
    Pending,
    /// Approved by the whole chain, no payment stage
    #[sea_orm(string_value = "SUCCESS")]
    Success,
    /// Rejected at any step
    #[sea_orm(string_value = "CANCELED")]
    Canceled,
    /// Paid out by a payeer
    #[sea_orm(string_value = "PAID")]
    Paid,
}

impl OrderState {
    /// Terminal states accept no further transitions.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Canceled | Self::Paid)
    }

    /// Status line shown in order captions.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "Order created [✉️]",
            Self::Pending => "Order in review [✍️]",
            Self::Success => "Order approved [✔️]",
            Self::Canceled => "Order rejected [❌]",
            Self::Paid => "Order paid [💰]",
        }
    }
}

/// Currency an order amount was submitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
pub enum Currency {
    #[sea_orm(string_value = "RUB")]
    Rub,
    #[sea_orm(string_value = "USD")]
    Usd,
}

impl Currency {
    /// ISO code, also used in button ids.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Rub => "RUB",
            Self::Usd => "USD",
        }
    }

    /// Parses an ISO code, case-insensitively.
    #[must_use]
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "RUB" => Some(Self::Rub),
            "USD" => Some(Self::Usd),
            _ => None,
        }
    }
}

/// Order database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Unique identifier for the order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Escalation tier (1-4), fixed at creation
    pub level: i32,
    /// Current position in the chain (0-5)
    pub step: i32,
    /// Lifecycle state
    pub state: OrderState,
    /// User who submitted the order
    pub initiator_id: i64,
    /// Free-text description, at most 700 characters
    #[sea_orm(column_type = "Text")]
    pub description: String,
    /// Amount in the submitted currency
    pub amount: f64,
    /// Submitted currency
    pub currency: Currency,
    /// Rationale attached on the terminal transition
    #[sea_orm(column_type = "Text", nullable)]
    pub reply: Option<String>,
    /// When the order was submitted
    pub created_at: DateTimeUtc,
    /// When step, state or reply last changed
    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeUtc>,
}

/// Defines relationships between Order and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each order belongs to its initiator
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::InitiatorId",
        to = "super::user::Column::Id"
    )]
    Initiator,
    /// One order has many chat messages
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
    /// One order has many attachments
    #[sea_orm(has_many = "super::file::Entity")]
    Files,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Initiator.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl Related<super::file::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
