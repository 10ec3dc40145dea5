//! Conversation sessions - Per-user state of a multi-step dialogue.
//!
//! A session remembers what the bot is waiting for from a user (the next
//! draft field, or the note for a review decision), the draft collected so
//! far and the last prompt posted, so the next prompt can replace it.

use crate::{
    core::chat::{PostedMessage, Verdict},
    entities::Currency,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// What the next message from the user is interpreted as.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PendingInput {
    #[default]
    Idle,
    Description,
    Currency,
    Amount,
    Attachments,
    /// Note or reason for a decision on `order_id` at `step`
    Reply {
        order_id: i64,
        step: i32,
        verdict: Verdict,
    },
}

/// Order fields collected so far.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Draft {
    pub description: Option<String>,
    pub currency: Option<Currency>,
    pub amount: Option<f64>,
}

/// State of one user's conversation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Session {
    /// Last prompt shown to the user
    pub anchor: Option<PostedMessage>,
    pub pending: PendingInput,
    pub draft: Draft,
}

impl Session {
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending == PendingInput::Idle
    }
}

/// Sessions of every user, keyed by Discord user id.
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a user's session; an unknown user gets an idle one.
    pub async fn get(&self, user: &str) -> Session {
        self.sessions
            .read()
            .await
            .get(user)
            .cloned()
            .unwrap_or_default()
    }

    /// Applies `f` to the user's session, creating it if needed.
    pub async fn update<R>(&self, user: &str, f: impl FnOnce(&mut Session) -> R) -> R {
        let mut sessions = self.sessions.write().await;
        f(sessions.entry(user.to_string()).or_default())
    }

    /// Replaces the user's session.
    pub async fn set(&self, user: &str, session: Session) {
        self.sessions
            .write()
            .await
            .insert(user.to_string(), session);
    }

    /// Ends the user's conversation and returns what it held.
    pub async fn clear(&self, user: &str) -> Option<Session> {
        self.sessions.write().await.remove(user)
    }

    /// Records a new prompt and returns the one it replaces.
    pub async fn swap_anchor(&self, user: &str, anchor: PostedMessage) -> Option<PostedMessage> {
        self.update(user, |session| session.anchor.replace(anchor))
            .await
    }
}
