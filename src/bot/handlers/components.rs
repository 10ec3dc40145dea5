//! Button click handling.

use super::{conversation, end_conversation};
use crate::{
    bot::{BotData, keyboards::Action},
    core::{chat::Verdict, session::PendingInput},
    errors::Result,
};
use poise::serenity_prelude as serenity;
use tracing::{debug, warn};

/// Handles a click on one of the bot's buttons.
pub async fn on_component(
    ctx: &serenity::Context,
    data: &BotData,
    component: &serenity::ComponentInteraction,
) -> Result<()> {
    component
        .create_response(ctx, serenity::CreateInteractionResponse::Acknowledge)
        .await?;

    let Some(action) = Action::parse(&component.data.custom_id) else {
        warn!(custom_id = %component.data.custom_id, "Unknown button");
        return Ok(());
    };
    let user_id = component.user.id.to_string();
    let chat_id = component.channel_id.to_string();
    let pending = data.sessions.get(&user_id).await.pending;
    debug!(user_id = %user_id, ?action, ?pending, "Button pressed");

    if let Some((verdict, order_id, step)) = action.decision() {
        return conversation::request_reply(data, &user_id, &chat_id, verdict, order_id, step)
            .await;
    }

    match (action, pending) {
        (Action::Cancel, _) => {
            end_conversation(data, &user_id).await;
            Ok(())
        }
        (Action::Currency(currency), PendingInput::Currency) => {
            conversation::accept_currency(data, &user_id, &chat_id, currency).await
        }
        (Action::Skip, PendingInput::Attachments) => {
            conversation::submit_draft(data, &user_id, &chat_id, &[]).await
        }
        (
            Action::Skip,
            PendingInput::Reply {
                verdict: Verdict::Approve,
                ..
            },
        ) => conversation::apply_reply(data, &user_id, &chat_id, None).await,
        // Buttons of an earlier prompt
        _ => {
            debug!(user_id = %user_id, "Ignoring button that does not match the dialogue");
            Ok(())
        }
    }
}
