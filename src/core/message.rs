//! Message records - Which chat posts currently show an order, and to whom.

use crate::{
    core::chat::PostedMessage,
    entities::{Message, MessageKind, message},
    errors::Result,
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, prelude::*};
use tracing::debug;

/// Records posted messages of one kind for an order.
pub async fn record_messages<C>(
    db: &C,
    order_id: i64,
    kind: MessageKind,
    posted: &[PostedMessage],
) -> Result<Vec<message::Model>>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let mut saved = Vec::with_capacity(posted.len());
    for post in posted {
        let model = message::ActiveModel {
            chat_id: Set(post.chat_id.clone()),
            message_id: Set(post.message_id.clone()),
            kind: Set(kind),
            order_id: Set(order_id),
            created_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        saved.push(model);
    }
    debug!(order_id, ?kind, count = saved.len(), "Recorded messages");
    Ok(saved)
}

/// Messages of an order, oldest first. `kind` narrows to one audience.
pub async fn messages_for_order<C>(
    db: &C,
    order_id: i64,
    kind: Option<MessageKind>,
) -> Result<Vec<message::Model>>
where
    C: ConnectionTrait,
{
    let mut query = Message::find().filter(message::Column::OrderId.eq(order_id));
    if let Some(kind) = kind {
        query = query.filter(message::Column::Kind.eq(kind));
    }
    query
        .order_by_asc(message::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes the given records. Returns how many rows went away.
pub async fn delete_messages<C>(db: &C, ids: &[i64]) -> Result<u64>
where
    C: ConnectionTrait,
{
    if ids.is_empty() {
        return Ok(0);
    }
    let result = Message::delete_many()
        .filter(message::Column::Id.is_in(ids.iter().copied()))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}

/// Deletes every record of an order.
pub async fn delete_messages_for_order<C>(db: &C, order_id: i64) -> Result<u64>
where
    C: ConnectionTrait,
{
    let result = Message::delete_many()
        .filter(message::Column::OrderId.eq(order_id))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
