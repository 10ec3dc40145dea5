//! Discord interaction handlers
//!
//! This module routes gateway events that are not slash commands: direct
//! messages that answer a prompt, and button clicks.

/// Button click handling
pub mod components;
/// The multi-step order and review dialogues
pub mod conversation;

use crate::{
    bot::BotData,
    core::{
        chat::{ChatClient, Controls},
        sync::retire_posted,
    },
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use tracing::{error, info};

/// Entry point for every non-command gateway event.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, BotData, Error>,
    data: &BotData,
) -> Result<()> {
    match event {
        serenity::FullEvent::Message { new_message } => {
            conversation::on_message(data, new_message).await
        }
        serenity::FullEvent::InteractionCreate {
            interaction: serenity::Interaction::Component(component),
        } => components::on_component(ctx, data, component).await,
        _ => Ok(()),
    }
}

/// Posts a prompt and deletes the one it replaces.
pub(crate) async fn prompt(
    data: &BotData,
    user_id: &str,
    chat_id: &str,
    text: &str,
    controls: Option<Controls>,
) -> Result<()> {
    let posted = data.chat.send_text(chat_id, text, None, controls).await?;
    if let Some(previous) = data.sessions.swap_anchor(user_id, posted).await {
        retire_posted(&data.chat, &[previous]).await;
    }
    Ok(())
}

/// Clears the user's conversation and deletes its last prompt.
pub(crate) async fn end_conversation(data: &BotData, user_id: &str) {
    if let Some(anchor) = data.sessions.clear(user_id).await.and_then(|s| s.anchor) {
        retire_posted(&data.chat, &[anchor]).await;
    }
}

/// Tells the user why their input was not accepted.
pub(crate) async fn report(data: &BotData, chat_id: &str, error: &Error) {
    match error {
        Error::Database(_)
        | Error::Io(_)
        | Error::Http(_)
        | Error::Framework(_)
        | Error::Config { .. } => {
            error!(chat_id, error = %error, "Action failed");
        }
        _ => info!(chat_id, error = %error, "Action refused"),
    }
    let text = error.user_message();
    if let Err(e) = data.chat.send_text(chat_id, &text, None, None).await {
        error!(chat_id, error = %e, "Failed to report error to user");
    }
}
