//! Chat platform seam - What the workflow needs from the messaging platform.
//!
//! Identifiers are opaque strings (Discord snowflakes in production). The
//! Discord implementation lives in `bot::chat`; tests use a recording fake.

use crate::{entities::MediaKind, errors::Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// A message the platform accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub chat_id: String,
    pub message_id: String,
}

/// One item of a media group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMedia {
    pub path: PathBuf,
    pub filename: String,
    pub kind: MediaKind,
    /// Only the last item of a group carries a caption
    pub caption: Option<String>,
}

/// An attachment received from a participant, not downloaded yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingAttachment {
    pub url: String,
    pub filename: String,
    pub kind: MediaKind,
}

/// Outcome of a delete request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    Deleted,
    /// The message no longer existed
    AlreadyGone,
}

/// Which decision a review button stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approve,
    Reject,
}

/// Interactive controls attached to a text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Controls {
    /// Approve / reject buttons for the inspector at `step`
    Review { order_id: i64, step: i32 },
    /// Pay / reject buttons for the payeer stage
    Payment { order_id: i64, step: i32 },
    /// Currency choice while drafting an order
    Currency,
    /// Skip and cancel buttons
    SkipOrCancel,
    /// A single cancel button
    Cancel,
}

/// Operations the workflow performs on the chat platform.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Posts a text message, optionally as a reply and with controls.
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
        controls: Option<Controls>,
    ) -> Result<PostedMessage>;

    /// Posts the items in order, one message per item.
    async fn send_media_group(
        &self,
        chat_id: &str,
        items: &[OutgoingMedia],
    ) -> Result<Vec<PostedMessage>>;

    /// Deletes a message. A message that no longer exists is not an error.
    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<Deletion>;

    /// Downloads an attachment into `dir` and returns where it was stored.
    async fn download_attachment(
        &self,
        attachment: &IncomingAttachment,
        dir: &Path,
    ) -> Result<PathBuf>;
}
