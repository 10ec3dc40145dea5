//! Message synchronizer - Keeps the posted copies of an order in line with its state.
//!
//! Every transition follows the same order of operations: post the new
//! copies first, then commit the state change together with the message
//! records in one transaction, and only then delete the superseded posts.
//! A failed post therefore never leaves an order without visible messages,
//! and deletions are best-effort: a post that cannot be removed is logged
//! and forgotten.

use crate::{
    core::{
        chat::{ChatClient, Controls, Deletion, OutgoingMedia, PostedMessage},
        file::purge_order_files,
        message::{delete_messages, delete_messages_for_order, messages_for_order, record_messages},
        order::{advance_step, finish_order, review_text, status_text},
    },
    entities::{FileModel, MessageKind, MessageModel, OrderModel, OrderState, UserModel},
    errors::{Error, Result},
};
use sea_orm::{DatabaseConnection, TransactionTrait};
use std::path::PathBuf;
use tracing::{debug, error, info, instrument, warn};

/// Who an order is currently shown to besides its initiator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub chat_id: String,
    pub kind: MessageKind,
}

impl Participant {
    #[must_use]
    pub fn inspector(user: &UserModel) -> Self {
        Self {
            chat_id: user.chat_id.clone(),
            kind: MessageKind::Inspector,
        }
    }

    #[must_use]
    pub fn payeer(chat_id: &str) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            kind: MessageKind::Payeer,
        }
    }

    fn prompt(&self, order_id: i64, step: i32) -> (String, Controls) {
        match self.kind {
            MessageKind::Payeer => (
                format!("💰 Order #{order_id} is approved and waiting for payment."),
                Controls::Payment { order_id, step },
            ),
            _ => (
                format!("✍️ Order #{order_id} is waiting for your decision."),
                Controls::Review { order_id, step },
            ),
        }
    }
}

/// Turns stored files into a media group; only the last item is captioned.
#[must_use]
pub fn build_media_group(files: &[FileModel], caption: &str) -> Vec<OutgoingMedia> {
    let last = files.len().saturating_sub(1);
    files
        .iter()
        .enumerate()
        .map(|(index, file)| OutgoingMedia {
            path: PathBuf::from(&file.path),
            filename: file.filename.clone(),
            kind: file.media_kind,
            caption: (index == last).then(|| caption.to_string()),
        })
        .collect()
}

/// Posts an order view to one chat.
///
/// Attachments go out as a media group carrying `caption`, or the caption is
/// sent as plain text when there are none. An optional prompt with controls
/// follows as a reply to the last post. If any post fails, the ones already
/// made are deleted again.
pub async fn post_order(
    chat: &dyn ChatClient,
    chat_id: &str,
    files: &[FileModel],
    caption: &str,
    prompt: Option<(String, Controls)>,
) -> Result<Vec<PostedMessage>> {
    let mut posted = if files.is_empty() {
        vec![chat.send_text(chat_id, caption, None, None).await?]
    } else {
        chat.send_media_group(chat_id, &build_media_group(files, caption))
            .await?
    };

    if let Some((text, controls)) = prompt {
        let reply_to = posted.last().map(|p| p.message_id.clone());
        match chat
            .send_text(chat_id, &text, reply_to.as_deref(), Some(controls))
            .await
        {
            Ok(message) => posted.push(message),
            Err(e) => {
                retire_posted(chat, &posted).await;
                return Err(e);
            }
        }
    }
    Ok(posted)
}

/// An order together with what is needed to render it.
#[derive(Debug, Clone, Copy)]
pub struct OrderView<'a> {
    pub order: &'a OrderModel,
    pub files: &'a [FileModel],
    pub initiator: &'a UserModel,
}

impl OrderView<'_> {
    fn review_caption(&self) -> String {
        review_text(self.order, &self.initiator.username)
    }
}

/// Posts a freshly submitted order to its initiator and first participant,
/// and records the posts.
///
/// On failure every post made so far is deleted again and the error is
/// returned; the caller decides what happens to the order.
#[instrument(skip_all, fields(order_id = view.order.id))]
pub async fn publish(
    db: &DatabaseConnection,
    chat: &dyn ChatClient,
    view: &OrderView<'_>,
    participant: &Participant,
) -> Result<()> {
    let order = view.order;
    let own = post_order(
        chat,
        &view.initiator.chat_id,
        view.files,
        &status_text(order),
        None,
    )
    .await?;

    let theirs = match post_order(
        chat,
        &participant.chat_id,
        view.files,
        &view.review_caption(),
        Some(participant.prompt(order.id, order.step)),
    )
    .await
    {
        Ok(posted) => posted,
        Err(e) => {
            retire_posted(chat, &own).await;
            return Err(e);
        }
    };

    let recorded = async {
        let txn = db.begin().await?;
        record_messages(&txn, order.id, MessageKind::Initiator, &own).await?;
        record_messages(&txn, order.id, participant.kind, &theirs).await?;
        txn.commit().await?;
        Ok::<(), Error>(())
    }
    .await;
    if let Err(e) = recorded {
        retire_posted(chat, &own).await;
        retire_posted(chat, &theirs).await;
        return Err(e);
    }

    info!(
        participant = %participant.chat_id,
        kind = ?participant.kind,
        "Order published"
    );
    Ok(())
}

/// Moves an order from its current step to `new_step`, shown to `participant`.
///
/// The initiator's copy is left alone; every participant-facing copy is
/// replaced. `note` is stored as the order's reply when given.
#[instrument(skip_all, fields(order_id = view.order.id, from = view.order.step, to = new_step))]
pub async fn relocate(
    db: &DatabaseConnection,
    chat: &dyn ChatClient,
    view: &OrderView<'_>,
    participant: &Participant,
    new_step: i32,
    note: Option<String>,
) -> Result<()> {
    let order = view.order;
    let posted = post_order(
        chat,
        &participant.chat_id,
        view.files,
        &view.review_caption(),
        Some(participant.prompt(order.id, new_step)),
    )
    .await?;

    let committed = async {
        let txn = db.begin().await?;
        advance_step(&txn, order.id, order.step, new_step, note).await?;
        let superseded: Vec<MessageModel> = messages_for_order(&txn, order.id, None)
            .await?
            .into_iter()
            .filter(|m| m.kind != MessageKind::Initiator)
            .collect();
        let ids: Vec<i64> = superseded.iter().map(|m| m.id).collect();
        delete_messages(&txn, &ids).await?;
        record_messages(&txn, order.id, participant.kind, &posted).await?;
        txn.commit().await?;
        Ok::<_, Error>(superseded)
    }
    .await;

    match committed {
        Ok(superseded) => {
            retire(chat, &superseded).await;
            info!(participant = %participant.chat_id, "Order relocated");
            Ok(())
        }
        Err(e) => {
            retire_posted(chat, &posted).await;
            Err(e)
        }
    }
}

/// Moves an order into a terminal state and cleans up after it.
///
/// The initiator receives one consolidated notice with the attachments and
/// the outcome. Every other post of the order is deleted and the stored
/// attachments are purged from disk.
#[instrument(skip_all, fields(order_id = view.order.id, ?state))]
pub async fn finalize(
    db: &DatabaseConnection,
    chat: &dyn ChatClient,
    view: &OrderView<'_>,
    state: OrderState,
    reply: Option<String>,
) -> Result<()> {
    let order = view.order;
    let outcome = OrderModel {
        state,
        reply: reply.clone(),
        ..order.clone()
    };
    let notice = post_order(
        chat,
        &view.initiator.chat_id,
        view.files,
        &status_text(&outcome),
        None,
    )
    .await?;

    let committed = async {
        let txn = db.begin().await?;
        finish_order(&txn, order.id, order.step, state, reply).await?;
        let superseded = messages_for_order(&txn, order.id, None).await?;
        delete_messages_for_order(&txn, order.id).await?;
        record_messages(&txn, order.id, MessageKind::Initiator, &notice).await?;
        txn.commit().await?;
        Ok::<_, Error>(superseded)
    }
    .await;

    let superseded = match committed {
        Ok(superseded) => superseded,
        Err(e) => {
            retire_posted(chat, &notice).await;
            return Err(e);
        }
    };
    retire(chat, &superseded).await;

    // The state change is committed; a purge failure only leaves bytes behind
    if let Err(e) = purge_order_files(db, order.id).await {
        error!(error = %e, "Failed to purge attachments after terminal transition");
    }
    info!("Order finalized");
    Ok(())
}

/// Deletes recorded posts, best-effort.
pub async fn retire(chat: &dyn ChatClient, messages: &[MessageModel]) {
    for message in messages {
        delete_quietly(chat, &message.chat_id, &message.message_id).await;
    }
}

/// Deletes posts that were never recorded, best-effort.
pub async fn retire_posted(chat: &dyn ChatClient, posted: &[PostedMessage]) {
    for message in posted {
        delete_quietly(chat, &message.chat_id, &message.message_id).await;
    }
}

async fn delete_quietly(chat: &dyn ChatClient, chat_id: &str, message_id: &str) {
    match chat.delete_message(chat_id, message_id).await {
        Ok(Deletion::Deleted) => {}
        Ok(Deletion::AlreadyGone) => {
            debug!(chat_id, message_id, "Message was already gone");
        }
        Err(e) => {
            warn!(chat_id, message_id, error = %e, "Failed to delete message");
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::chat::Controls;
    use crate::core::file::{download_all, files_for_order, record_files};
    use crate::core::order::require_order;
    use crate::entities::{MediaKind, Role};
    use crate::test_utils::{
        RecordingChat, create_test_order, create_test_user, setup_test_db, test_attachment,
    };

    fn file(id: i64, name: &str) -> FileModel {
        FileModel {
            id,
            path: format!("/tmp/{name}"),
            filename: name.to_string(),
            media_kind: MediaKind::Photo,
            order_id: 1,
            created_at: chrono::Utc::now(),
            purged_at: None,
        }
    }

    #[test]
    fn test_only_last_item_is_captioned() {
        let group = build_media_group(&[file(1, "a"), file(2, "b"), file(3, "c")], "ID: 1");
        let captions: Vec<_> = group.iter().map(|m| m.caption.as_deref()).collect();
        assert_eq!(captions, vec![None, None, Some("ID: 1")]);
        assert!(build_media_group(&[], "x").is_empty());
    }

    #[tokio::test]
    async fn test_post_order_prompt_replies_to_last_item() -> Result<()> {
        let chat = RecordingChat::new();
        let posted = post_order(
            &chat,
            "insp",
            &[file(1, "a"), file(2, "b")],
            "caption",
            Some(("decide".to_string(), Controls::Review { order_id: 1, step: 1 })),
        )
        .await?;

        assert_eq!(posted.len(), 3);
        let sent = chat.sent();
        assert_eq!(sent[2].reply_to.as_deref(), Some(posted[1].message_id.as_str()));
        assert_eq!(sent[2].controls, Some(Controls::Review { order_id: 1, step: 1 }));
        Ok(())
    }

    #[tokio::test]
    async fn test_post_order_undoes_partial_posts() -> Result<()> {
        let chat = RecordingChat::new();
        chat.fail_sends_after(1);
        let result = post_order(
            &chat,
            "insp",
            &[],
            "caption",
            Some(("decide".to_string(), Controls::Cancel)),
        )
        .await;

        assert!(matches!(result, Err(Error::Delivery { .. })));
        assert!(chat.live("insp").is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_relocate_replaces_participant_posts() -> Result<()> {
        let db = setup_test_db().await?;
        let chat = RecordingChat::new();
        let initiator = create_test_user(&db, "uma", &[Role::Initiator]).await?;
        let first = create_test_user(&db, "vic", &[Role::Inspector]).await?;
        let second = create_test_user(&db, "walt", &[Role::Inspector]).await?;
        let order = create_test_order(&db, initiator.id, 2, 1).await?;

        let view = OrderView { order: &order, files: &[], initiator: &initiator };
        publish(&db, &chat, &view, &Participant::inspector(&first)).await?;
        assert_eq!(chat.live(&first.chat_id).len(), 2);

        relocate(&db, &chat, &view, &Participant::inspector(&second), 2, None).await?;

        assert!(chat.live(&first.chat_id).is_empty());
        assert_eq!(chat.live(&second.chat_id).len(), 2);
        assert_eq!(chat.live(&initiator.chat_id).len(), 1);

        let inspector_rows = messages_for_order(&db, order.id, Some(MessageKind::Inspector)).await?;
        assert!(inspector_rows.iter().all(|m| m.chat_id == second.chat_id));
        assert_eq!(require_order(&db, order.id).await?.step, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_relocate_delivery_failure_changes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        let storage = tempfile::tempdir()?;
        let chat = RecordingChat::new();
        let initiator = create_test_user(&db, "xena", &[Role::Initiator]).await?;
        let first = create_test_user(&db, "yuri", &[Role::Inspector]).await?;
        let second = create_test_user(&db, "zoe", &[Role::Inspector]).await?;
        let order = create_test_order(&db, initiator.id, 2, 1).await?;
        let stored = download_all(&chat, storage.path(), &[test_attachment("a.png")]).await?;
        let files = record_files(&db, order.id, &stored).await?;
        let view = OrderView { order: &order, files: &files, initiator: &initiator };
        publish(&db, &chat, &view, &Participant::inspector(&first)).await?;
        let before = messages_for_order(&db, order.id, None).await?;

        chat.fail_sends_after(0);
        let result = relocate(&db, &chat, &view, &Participant::inspector(&second), 2, None).await;

        assert!(matches!(result, Err(Error::Delivery { .. })));
        assert_eq!(messages_for_order(&db, order.id, None).await?, before);
        assert_eq!(require_order(&db, order.id).await?.step, 1);
        assert!(stored[0].path.exists());
        assert_eq!(chat.live(&first.chat_id).len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_relocate_losing_race_removes_new_posts() -> Result<()> {
        let db = setup_test_db().await?;
        let chat = RecordingChat::new();
        let initiator = create_test_user(&db, "abe", &[Role::Initiator]).await?;
        let first = create_test_user(&db, "bea", &[Role::Inspector]).await?;
        let second = create_test_user(&db, "cal", &[Role::Inspector]).await?;
        let order = create_test_order(&db, initiator.id, 2, 1).await?;
        let view = OrderView { order: &order, files: &[], initiator: &initiator };
        publish(&db, &chat, &view, &Participant::inspector(&first)).await?;

        // Another click already moved the order on
        advance_step(&db, order.id, 1, 2, None).await?;
        let result = relocate(&db, &chat, &view, &Participant::inspector(&second), 2, None).await;

        assert!(matches!(result, Err(Error::StaleAction { .. })));
        assert!(chat.live(&second.chat_id).is_empty());
        assert_eq!(chat.live(&first.chat_id).len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_cleans_up_once() -> Result<()> {
        let db = setup_test_db().await?;
        let storage = tempfile::tempdir()?;
        let chat = RecordingChat::new();
        let initiator = create_test_user(&db, "dan", &[Role::Initiator]).await?;
        let inspector = create_test_user(&db, "eve", &[Role::Inspector]).await?;
        let order = create_test_order(&db, initiator.id, 1, 1).await?;
        let stored = download_all(
            &chat,
            storage.path(),
            &[test_attachment("a.png"), test_attachment("b.pdf")],
        )
        .await?;
        let files = record_files(&db, order.id, &stored).await?;
        let view = OrderView { order: &order, files: &files, initiator: &initiator };
        publish(&db, &chat, &view, &Participant::inspector(&inspector)).await?;

        finalize(
            &db,
            &chat,
            &view,
            OrderState::Canceled,
            Some("over budget".to_string()),
        )
        .await?;

        assert!(chat.live(&inspector.chat_id).is_empty());
        let notice = chat.live(&initiator.chat_id);
        assert_eq!(notice.len(), 2);
        let caption = notice[1].caption.clone().unwrap();
        assert!(caption.contains("Rationale: over budget"));
        assert!(caption.contains(OrderState::Canceled.label()));

        let rows = messages_for_order(&db, order.id, None).await?;
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|m| m.kind == MessageKind::Initiator));
        assert!(stored.iter().all(|f| !f.path.exists()));
        assert!(
            files_for_order(&db, order.id)
                .await?
                .iter()
                .all(|f| f.purged_at.is_some())
        );

        // A replayed decision is stale and leaves everything as it is
        let replay = finalize(&db, &chat, &view, OrderState::Success, None).await;
        assert!(matches!(replay, Err(Error::StaleAction { .. })));
        assert_eq!(chat.live(&initiator.chat_id).len(), 2);
        assert_eq!(require_order(&db, order.id).await?.state, OrderState::Canceled);
        Ok(())
    }

    #[tokio::test]
    async fn test_finalize_notice_failure_keeps_order_pending() -> Result<()> {
        let db = setup_test_db().await?;
        let storage = tempfile::tempdir()?;
        let chat = RecordingChat::new();
        let initiator = create_test_user(&db, "fay", &[Role::Initiator]).await?;
        let inspector = create_test_user(&db, "gus", &[Role::Inspector]).await?;
        let order = create_test_order(&db, initiator.id, 1, 1).await?;
        let stored = download_all(&chat, storage.path(), &[test_attachment("a.png")]).await?;
        let files = record_files(&db, order.id, &stored).await?;
        let view = OrderView { order: &order, files: &files, initiator: &initiator };
        publish(&db, &chat, &view, &Participant::inspector(&inspector)).await?;

        chat.fail_sends_after(0);
        let result = finalize(&db, &chat, &view, OrderState::Success, None).await;

        assert!(result.is_err());
        assert_eq!(require_order(&db, order.id).await?.state, OrderState::Pending);
        assert_eq!(messages_for_order(&db, order.id, None).await?.len(), 3);
        assert!(stored[0].path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_deletion_failures_do_not_abort_transition() -> Result<()> {
        let db = setup_test_db().await?;
        let chat = RecordingChat::new();
        let initiator = create_test_user(&db, "hal", &[Role::Initiator]).await?;
        let inspector = create_test_user(&db, "ida", &[Role::Inspector]).await?;
        let order = create_test_order(&db, initiator.id, 1, 1).await?;
        let view = OrderView { order: &order, files: &[], initiator: &initiator };
        publish(&db, &chat, &view, &Participant::inspector(&inspector)).await?;

        chat.fail_deletes(true);
        finalize(&db, &chat, &view, OrderState::Success, None).await?;

        assert_eq!(require_order(&db, order.id).await?.state, OrderState::Success);
        assert_eq!(messages_for_order(&db, order.id, None).await?.len(), 1);
        Ok(())
    }
}
