//! File entity - An attachment stored on disk for the lifetime of an order.
//!
//! The bytes are removed once the order reaches a terminal state; `purged_at`
//! records that removal so it happens exactly once while the row itself stays.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How an attachment is presented when re-posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum MediaKind {
    #[sea_orm(string_value = "DOCUMENT")]
    Document,
    #[sea_orm(string_value = "PHOTO")]
    Photo,
    #[sea_orm(string_value = "VIDEO")]
    Video,
}

impl MediaKind {
    /// Classifies an attachment by its MIME type; anything that is not an
    /// image or a video is sent as a document.
    #[must_use]
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(ct) if ct.starts_with("image/") => Self::Photo,
            Some(ct) if ct.starts_with("video/") => Self::Video,
            _ => Self::Document,
        }
    }
}

/// File database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Location of the stored bytes
    #[sea_orm(unique)]
    pub path: String,
    /// Name the attachment was uploaded with
    pub filename: String,
    pub media_kind: MediaKind,
    pub order_id: i64,
    pub created_at: DateTimeUtc,
    /// Set once the stored bytes have been removed
    #[sea_orm(nullable)]
    pub purged_at: Option<DateTimeUtc>,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_content_type() {
        assert_eq!(MediaKind::from_content_type(Some("image/png")), MediaKind::Photo);
        assert_eq!(MediaKind::from_content_type(Some("video/mp4")), MediaKind::Video);
        assert_eq!(
            MediaKind::from_content_type(Some("application/pdf")),
            MediaKind::Document
        );
        assert_eq!(MediaKind::from_content_type(None), MediaKind::Document);
    }
}
