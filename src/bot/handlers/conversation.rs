//! The multi-step dialogues: drafting an order and answering a review prompt.
//!
//! Each step reads the user's session, validates the input, stores it and
//! posts the next prompt in place of the previous one. Invalid input is
//! reported and the current prompt stays, so the user can simply try again.

use super::{end_conversation, prompt, report};
use crate::{
    bot::BotData,
    core::{
        chat::{ChatClient, Controls, IncomingAttachment, Verdict},
        order,
        session::{Draft, PendingInput, Session},
        sync::retire_posted,
        workflow::Submission,
    },
    entities::{Currency, MediaKind},
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use tracing::{debug, info};

/// Most attachments accepted with one order.
pub const MAX_ATTACHMENTS: usize = 10;

/// Starts a new order draft in `chat_id`, replacing any running dialogue.
pub async fn begin_order(data: &BotData, user_id: &str, chat_id: &str) -> Result<()> {
    end_conversation(data, user_id).await;
    data.sessions
        .set(
            user_id,
            Session {
                pending: PendingInput::Description,
                ..Session::default()
            },
        )
        .await;
    prompt(
        data,
        user_id,
        chat_id,
        &format!(
            "📝 Describe the order (up to {} characters).",
            order::MAX_DESCRIPTION_CHARS
        ),
        Some(Controls::Cancel),
    )
    .await
}

/// Handles a message that may answer the user's current prompt.
pub async fn on_message(data: &BotData, message: &serenity::Message) -> Result<()> {
    if message.author.bot {
        return Ok(());
    }
    let user_id = message.author.id.to_string();
    let chat_id = message.channel_id.to_string();
    let session = data.sessions.get(&user_id).await;

    // Outside DMs only the channel holding the user's prompt is listened to
    let anchored_here = session
        .anchor
        .as_ref()
        .is_some_and(|anchor| anchor.chat_id == chat_id);
    if message.guild_id.is_some() && !anchored_here {
        return Ok(());
    }

    match session.pending {
        PendingInput::Idle => Ok(()),
        PendingInput::Description => {
            accept_description(data, &user_id, &chat_id, &message.content).await
        }
        PendingInput::Currency => match Currency::from_code(&message.content) {
            Some(currency) => accept_currency(data, &user_id, &chat_id, currency).await,
            None => {
                data.chat
                    .send_text(&chat_id, "💱 Press one of the currency buttons.", None, None)
                    .await?;
                Ok(())
            }
        },
        PendingInput::Amount => accept_amount(data, &user_id, &chat_id, &message.content).await,
        PendingInput::Attachments => {
            if message.attachments.is_empty() {
                data.chat
                    .send_text(
                        &chat_id,
                        "📎 Attach the files to a message, or press Skip.",
                        None,
                        None,
                    )
                    .await?;
                return Ok(());
            }
            if message.attachments.len() > MAX_ATTACHMENTS {
                data.chat
                    .send_text(
                        &chat_id,
                        &format!("❌ At most {MAX_ATTACHMENTS} files can be attached."),
                        None,
                        None,
                    )
                    .await?;
                return Ok(());
            }
            let attachments = message
                .attachments
                .iter()
                .map(|a| IncomingAttachment {
                    url: a.url.clone(),
                    filename: a.filename.clone(),
                    kind: MediaKind::from_content_type(a.content_type.as_deref()),
                })
                .collect::<Vec<_>>();
            submit_draft(data, &user_id, &chat_id, &attachments).await
        }
        PendingInput::Reply { .. } => {
            apply_reply(data, &user_id, &chat_id, Some(&message.content)).await
        }
    }
}

async fn accept_description(
    data: &BotData,
    user_id: &str,
    chat_id: &str,
    text: &str,
) -> Result<()> {
    let description = match order::validate_description(text) {
        Ok(description) => description,
        Err(e) => {
            report(data, chat_id, &e).await;
            return Ok(());
        }
    };
    data.sessions
        .update(user_id, |s| {
            s.draft.description = Some(description);
            s.pending = PendingInput::Currency;
        })
        .await;
    prompt(
        data,
        user_id,
        chat_id,
        "💱 Choose the currency of the amount.",
        Some(Controls::Currency),
    )
    .await
}

/// Stores the chosen currency and asks for the amount.
pub async fn accept_currency(
    data: &BotData,
    user_id: &str,
    chat_id: &str,
    currency: Currency,
) -> Result<()> {
    data.sessions
        .update(user_id, |s| {
            s.draft.currency = Some(currency);
            s.pending = PendingInput::Amount;
        })
        .await;
    prompt(
        data,
        user_id,
        chat_id,
        &format!("💵 Enter the amount in {}.", currency.code()),
        Some(Controls::Cancel),
    )
    .await
}

async fn accept_amount(data: &BotData, user_id: &str, chat_id: &str, text: &str) -> Result<()> {
    let amount = match order::parse_amount(text) {
        Ok(amount) => amount,
        Err(e) => {
            report(data, chat_id, &e).await;
            return Ok(());
        }
    };
    data.sessions
        .update(user_id, |s| {
            s.draft.amount = Some(amount);
            s.pending = PendingInput::Attachments;
        })
        .await;
    prompt(
        data,
        user_id,
        chat_id,
        &format!(
            "📎 Send up to {MAX_ATTACHMENTS} attachments in one message, or press Skip."
        ),
        Some(Controls::SkipOrCancel),
    )
    .await
}

/// Submits the finished draft with the given attachments and ends the dialogue.
pub async fn submit_draft(
    data: &BotData,
    user_id: &str,
    chat_id: &str,
    attachments: &[IncomingAttachment],
) -> Result<()> {
    let draft = data.sessions.get(user_id).await.draft;
    end_conversation(data, user_id).await;

    let Draft {
        description: Some(description),
        currency: Some(currency),
        amount: Some(amount),
    } = draft
    else {
        data.chat
            .send_text(
                chat_id,
                "❌ The draft is incomplete. Start again with `/order`.",
                None,
                None,
            )
            .await?;
        return Ok(());
    };

    let working = data
        .chat
        .send_text(chat_id, "⏳ Submitting your order...", None, None)
        .await?;
    let result = data
        .workflow()
        .submit(
            user_id,
            Submission {
                description,
                currency,
                amount,
            },
            attachments,
        )
        .await;
    retire_posted(&data.chat, &[working]).await;

    match result {
        Ok((order, outcome)) => {
            info!(order_id = order.id, ?outcome, "Order submitted");
            Ok(())
        }
        Err(e) => {
            report(data, chat_id, &e).await;
            Ok(())
        }
    }
}

/// Asks the user for the note or reason of a decision they just clicked.
pub async fn request_reply(
    data: &BotData,
    user_id: &str,
    chat_id: &str,
    verdict: Verdict,
    order_id: i64,
    step: i32,
) -> Result<()> {
    // Settled orders and other users' buttons are refused before asking for text
    if let Err(e) = data.workflow().authorize(user_id, order_id, step).await {
        report(data, chat_id, &e).await;
        return Ok(());
    }

    end_conversation(data, user_id).await;
    data.sessions
        .set(
            user_id,
            Session {
                pending: PendingInput::Reply {
                    order_id,
                    step,
                    verdict,
                },
                ..Session::default()
            },
        )
        .await;
    let (text, controls) = match verdict {
        Verdict::Approve => (
            format!(
                "📝 Write a note for order #{order_id} (up to {} characters), or press Skip.",
                order::MAX_REPLY_CHARS
            ),
            Controls::SkipOrCancel,
        ),
        Verdict::Reject => (
            format!(
                "📝 Write the reason for rejecting order #{order_id} (up to {} characters).",
                order::MAX_REPLY_CHARS
            ),
            Controls::Cancel,
        ),
    };
    prompt(data, user_id, chat_id, &text, Some(controls)).await
}

/// Applies the pending decision with the user's note or reason.
pub async fn apply_reply(
    data: &BotData,
    user_id: &str,
    chat_id: &str,
    text: Option<&str>,
) -> Result<()> {
    let PendingInput::Reply {
        order_id,
        step,
        verdict,
    } = data.sessions.get(user_id).await.pending
    else {
        debug!(user_id, "No decision pending");
        return Ok(());
    };

    match data
        .workflow()
        .review(user_id, order_id, step, verdict, text)
        .await
    {
        Ok(outcome) => {
            end_conversation(data, user_id).await;
            data.chat
                .send_text(chat_id, &outcome.describe(order_id), None, None)
                .await?;
        }
        // The user can answer again
        Err(e @ (Error::ReasonRequired | Error::NoteNotAllowed | Error::ReplyTooLong { .. })) => {
            report(data, chat_id, &e).await;
        }
        Err(e) => {
            end_conversation(data, user_id).await;
            report(data, chat_id, &e).await;
        }
    }
    Ok(())
}
