//! Shared test utilities for `ApprovalBuddy`.
//!
//! This module provides common helper functions for setting up test databases,
//! creating test entities with sensible defaults, and a recording chat client
//! that stands in for Discord.

#![allow(clippy::unwrap_used)]

use crate::{
    core::{
        chat::{
            ChatClient, Controls, Deletion, IncomingAttachment, OutgoingMedia, PostedMessage,
        },
        directory,
        exchange::RateSource,
        file::storage_path,
        order::{self, NewOrder},
    },
    entities::{self, Currency, MediaKind, Role},
    errors::{Error, Result},
};
use async_trait::async_trait;
use sea_orm::DatabaseConnection;
use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Registers a user holding `roles`.
///
/// # Defaults
/// * `discord_id`: `id-{username}`
/// * `chat_id`: `dm-{username}`
pub async fn create_test_user(
    db: &DatabaseConnection,
    username: &str,
    roles: &[Role],
) -> Result<entities::user::Model> {
    let (user, _) = directory::register_user(
        db,
        &format!("id-{username}"),
        username,
        &format!("dm-{username}"),
    )
    .await?;
    for role in roles {
        directory::grant_role(db, user.id, *role).await?;
    }
    Ok(user)
}

/// Creates a pending order with sensible defaults.
///
/// # Defaults
/// * description: "Office chair"
/// * amount: 150.0 USD
pub async fn create_test_order(
    db: &DatabaseConnection,
    initiator_id: i64,
    level: i32,
    step: i32,
) -> Result<entities::order::Model> {
    order::create_order(
        db,
        NewOrder {
            initiator_id,
            description: "Office chair".to_string(),
            amount: 150.0,
            currency: Currency::Usd,
            level,
            step,
        },
    )
    .await
}

/// An attachment as Discord would announce it.
pub fn test_attachment(filename: &str) -> IncomingAttachment {
    IncomingAttachment {
        url: format!("https://cdn.example.test/{filename}"),
        filename: filename.to_string(),
        kind: if filename.ends_with(".png") {
            MediaKind::Photo
        } else {
            MediaKind::Document
        },
    }
}

/// Rate source whose every lookup fails.
pub struct FailingRate;

#[async_trait]
impl RateSource for FailingRate {
    async fn rub_per_usd(&self) -> Result<f64> {
        Err(Error::ExchangeRate {
            message: "all mirrors unreachable".to_string(),
        })
    }
}

/// One message the fake accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: String,
    pub message_id: String,
    pub text: Option<String>,
    pub caption: Option<String>,
    pub media: Option<String>,
    pub reply_to: Option<String>,
    pub controls: Option<Controls>,
    pub deleted: bool,
}

#[derive(Debug, Default)]
struct ChatState {
    next_id: u64,
    sent: Vec<SentMessage>,
    send_budget: Option<usize>,
    download_budget: Option<usize>,
    fail_deletes: bool,
}

impl ChatState {
    fn take_send(&mut self) -> Result<()> {
        match self.send_budget.as_mut() {
            Some(0) => Err(Error::Delivery {
                message: "injected send failure".to_string(),
            }),
            Some(left) => {
                *left -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn push(&mut self, mut message: SentMessage) -> PostedMessage {
        self.next_id += 1;
        message.message_id = self.next_id.to_string();
        let posted = PostedMessage {
            chat_id: message.chat_id.clone(),
            message_id: message.message_id.clone(),
        };
        self.sent.push(message);
        posted
    }
}

/// In-memory `ChatClient` that records everything and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingChat {
    state: Mutex<ChatState>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every message ever sent, deleted or not, in send order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Messages in `chat_id` that have not been deleted.
    pub fn live(&self, chat_id: &str) -> Vec<SentMessage> {
        self.state
            .lock()
            .unwrap()
            .sent
            .iter()
            .filter(|m| m.chat_id == chat_id && !m.deleted)
            .cloned()
            .collect()
    }

    /// Lets `count` more posts through, then fails every send.
    pub fn fail_sends_after(&self, count: usize) {
        self.state.lock().unwrap().send_budget = Some(count);
    }

    /// Lets `count` more downloads through, then fails every download.
    pub fn fail_downloads_after(&self, count: usize) {
        self.state.lock().unwrap().download_budget = Some(count);
    }

    /// Makes every delete request fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().unwrap().fail_deletes = fail;
    }
}

#[async_trait]
impl ChatClient for RecordingChat {
    async fn send_text(
        &self,
        chat_id: &str,
        text: &str,
        reply_to: Option<&str>,
        controls: Option<Controls>,
    ) -> Result<PostedMessage> {
        let mut state = self.state.lock().unwrap();
        state.take_send()?;
        Ok(state.push(SentMessage {
            chat_id: chat_id.to_string(),
            message_id: String::new(),
            text: Some(text.to_string()),
            caption: None,
            media: None,
            reply_to: reply_to.map(str::to_string),
            controls,
            deleted: false,
        }))
    }

    async fn send_media_group(
        &self,
        chat_id: &str,
        items: &[OutgoingMedia],
    ) -> Result<Vec<PostedMessage>> {
        let mut state = self.state.lock().unwrap();
        state.take_send()?;
        Ok(items
            .iter()
            .map(|item| {
                state.push(SentMessage {
                    chat_id: chat_id.to_string(),
                    message_id: String::new(),
                    text: None,
                    caption: item.caption.clone(),
                    media: Some(item.filename.clone()),
                    reply_to: None,
                    controls: None,
                    deleted: false,
                })
            })
            .collect())
    }

    async fn delete_message(&self, chat_id: &str, message_id: &str) -> Result<Deletion> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            return Err(Error::Delivery {
                message: "injected delete failure".to_string(),
            });
        }
        match state
            .sent
            .iter_mut()
            .find(|m| m.chat_id == chat_id && m.message_id == message_id && !m.deleted)
        {
            Some(message) => {
                message.deleted = true;
                Ok(Deletion::Deleted)
            }
            None => Ok(Deletion::AlreadyGone),
        }
    }

    async fn download_attachment(
        &self,
        attachment: &IncomingAttachment,
        dir: &Path,
    ) -> Result<PathBuf> {
        {
            let mut state = self.state.lock().unwrap();
            match state.download_budget.as_mut() {
                Some(0) => {
                    return Err(Error::Delivery {
                        message: "injected download failure".to_string(),
                    });
                }
                Some(left) => *left -= 1,
                None => {}
            }
        }
        let path = storage_path(dir, &attachment.filename);
        tokio::fs::write(&path, attachment.url.as_bytes()).await?;
        Ok(path)
    }
}
