//! Order Discord commands - `order`, `orders` and `cancel`.
//!
//! The commands only open or close a dialogue; the dialogue itself runs in
//! the user's direct messages and is driven by the handlers.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{Context, handlers},
        core::{
            directory,
            order::{get_orders_for_initiator, summary_line},
        },
        entities::Role,
        errors::Result,
    };
    use poise::CreateReply;

    /// Starts a new order.
    ///
    /// The bot asks for the description, currency, amount and attachments in
    /// your direct messages.
    #[poise::command(slash_command)]
    pub async fn order(ctx: Context<'_>) -> Result<()> {
        let data = ctx.data();
        let db = &data.database;
        let discord_id = ctx.author().id.to_string();

        let user = directory::require_user(db, &discord_id).await?;
        directory::require_role(db, user.id, Role::Initiator).await?;
        directory::require_chain(db, user.id).await?;

        handlers::conversation::begin_order(data, &discord_id, &user.chat_id).await?;
        ctx.send(
            CreateReply::default()
                .content("📨 Check your direct messages to describe the order.")
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }

    /// Lists your most recent orders and where they stand.
    #[poise::command(slash_command)]
    pub async fn orders(ctx: Context<'_>) -> Result<()> {
        const LIMIT: u64 = 10;
        let db = &ctx.data().database;
        let user = directory::require_user(db, &ctx.author().id.to_string()).await?;

        let recent = get_orders_for_initiator(db, user.id, LIMIT).await?;
        let text = if recent.is_empty() {
            "ℹ️ You have not submitted any orders yet.".to_string()
        } else {
            let lines = recent.iter().map(summary_line).collect::<Vec<_>>();
            format!("🧾 Your latest orders:\n{}", lines.join("\n"))
        };
        ctx.send(CreateReply::default().content(text).ephemeral(true))
            .await?;
        Ok(())
    }

    /// Aborts the dialogue you are in.
    #[poise::command(slash_command)]
    pub async fn cancel(ctx: Context<'_>) -> Result<()> {
        let data = ctx.data();
        let discord_id = ctx.author().id.to_string();

        let text = if data.sessions.get(&discord_id).await.is_idle() {
            "ℹ️ There is nothing to cancel."
        } else {
            handlers::end_conversation(data, &discord_id).await;
            "✅ Canceled."
        };
        ctx.send(CreateReply::default().content(text).ephemeral(true))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
