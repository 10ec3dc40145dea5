//! Discord implementation of the chat seam.
//!
//! Channel and message ids travel through the core as strings and are
//! parsed back into snowflakes here. Attachments are re-uploaded from the
//! storage directory, one message per file, under their original names.

use crate::{
    bot::keyboards::action_rows,
    core::{
        chat::{ChatClient, Controls, Deletion, IncomingAttachment, OutgoingMedia, PostedMessage},
        file::storage_path,
    },
    errors::{Error, Result},
};
use async_trait::async_trait;
use poise::serenity_prelude::{self as serenity, ChannelId, CreateAttachment, CreateMessage, MessageId};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, warn};

/// Attachment downloads give up after this long.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Talks to Discord through serenity's HTTP client.
#[derive(Clone)]
pub struct DiscordChat {
    http: Arc<serenity::Http>,
    client: reqwest::Client,
}

impl DiscordChat {
    pub fn new(http: Arc<serenity::Http>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()?;
        Ok(Self { http, client })
    }
}

fn snowflake(raw: &str) -> Result<u64> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| Error::Delivery {
            message: format!("'{raw}' is not a Discord id"),
        })
}

fn delivery(e: &serenity::Error) -> Error {
    Error::Delivery {
        message: e.to_string(),
    }
}

fn posted(message: &serenity::Message) -> PostedMessage {
    PostedMessage {
        chat_id: message.channel_id.to_string(),
        message_id: message.id.to_string(),
    }
}

#[async_trait]
impl ChatClient for DiscordChat {
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
        controls: Option<Controls>,
    ) -> Result<PostedMessage> {
        let channel = ChannelId::new(snowflake(chat_id)?);
        let mut builder = CreateMessage::new().content(text);
        if let Some(reply_to) = reply_to {
            builder = builder.reference_message((channel, MessageId::new(snowflake(reply_to)?)));
        }
        if let Some(controls) = controls {
            builder = builder.components(action_rows(&controls));
        }
        let message = channel
            .send_message(&self.http, builder)
            .await
            .map_err(|e| delivery(&e))?;
        Ok(posted(&message))
    }

    async fn send_media_group(
        &self,
        chat_id: &str,
        items: &[OutgoingMedia],
    ) -> Result<Vec<PostedMessage>> {
        let channel = ChannelId::new(snowflake(chat_id)?);
        let mut sent = Vec::with_capacity(items.len());
        for item in items {
            let result = async {
                let bytes = tokio::fs::read(&item.path).await?;
                let mut builder = CreateMessage::new()
                    .add_file(CreateAttachment::bytes(bytes, item.filename.clone()));
                if let Some(caption) = &item.caption {
                    builder = builder.content(caption);
                }
                channel
                    .send_message(&self.http, builder)
                    .await
                    .map_err(|e| delivery(&e))
            }
            .await;

            match result {
                Ok(message) => sent.push(posted(&message)),
                Err(e) => {
                    // Take back the part of the group that already went out
                    for message in &sent {
                        if let Err(undo) = self.delete_message(&message.chat_id, &message.message_id).await {
                            warn!(error = %undo, "Failed to undo partial media group");
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(sent)
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<Deletion> {
        let channel = ChannelId::new(snowflake(chat_id)?);
        let message = MessageId::new(snowflake(message_id)?);
        match channel.delete_message(&self.http, message).await {
            Ok(()) => Ok(Deletion::Deleted),
            Err(serenity::Error::Http(e)) if e.status_code().map(|s| s.as_u16()) == Some(404) => {
                Ok(Deletion::AlreadyGone)
            }
            Err(e) => Err(delivery(&e)),
        }
    }

    async fn download_attachment(
        &self,
        attachment: &IncomingAttachment,
        dir: &Path,
    ) -> Result<PathBuf> {
        let bytes = self
            .client
            .get(&attachment.url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        let path = storage_path(dir, &attachment.filename);
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), size = bytes.len(), "Attachment stored");
        Ok(path)
    }
}
