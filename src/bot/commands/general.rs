//! General Discord commands - registration, ping and help.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::Context,
        core::{chat::ChatClient, directory},
        entities::Role,
        errors::Result,
    };
    use tracing::{info, warn};

    /// Registers you with the bot, or refreshes your registration.
    ///
    /// The bot remembers your direct message channel so it can send you
    /// orders. New users start without a role until an administrator grants one.
    #[poise::command(slash_command)]
    pub async fn start(ctx: Context<'_>) -> Result<()> {
        let data = ctx.data();
        let db = &data.database;
        let author = ctx.author();
        let dm = author.create_dm_channel(ctx.serenity_context()).await?;

        let (user, created) = directory::register_user(
            db,
            &author.id.to_string(),
            &author.name,
            &dm.id.to_string(),
        )
        .await?;

        let is_configured_admin = data
            .config
            .bot
            .admin_username
            .as_deref()
            .is_some_and(|admin| admin.eq_ignore_ascii_case(&author.name));
        if is_configured_admin {
            directory::grant_role(db, user.id, Role::Admin).await?;
        }

        let mut roles = directory::roles_for_user(db, user.id).await?;
        if roles.is_empty() {
            directory::grant_role(db, user.id, Role::Unknown).await?;
            roles.push(Role::Unknown);
        }

        if created && !is_configured_admin {
            info!(user_id = user.id, username = %user.username, "Notifying admins of new user");
            let notice = format!(
                "👤 New user @{} registered. Grant a role with `/admin role grant`.",
                user.username
            );
            for admin in directory::users_with_role(db, Role::Admin).await? {
                if let Err(e) = data.chat.send_text(&admin.chat_id, &notice, None, None).await {
                    warn!(admin_id = admin.id, error = %e, "Failed to notify admin");
                }
            }
        }

        let roles = roles.iter().map(|r| r.label()).collect::<Vec<_>>().join(", ");
        let greeting = if created { "Welcome" } else { "Welcome back" };
        ctx.say(format!("👋 {greeting}, {}! Your roles: {roles}.", user.username))
            .await?;
        Ok(())
    }

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: Context<'_>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: Context<'_>) -> Result<()> {
        let help_text = "**ApprovalBuddy Help**\n\
        Orders are approved by up to four inspectors, depending on the amount, \
        and then paid out by a payeer.\n\n\
        **Everyone**\n\
        • `/start` - Registers you with the bot.\n\
        • `/cancel` - Aborts the dialogue you are in.\n\
        • `/ping` - Checks if the bot is responsive.\n\
        • `/help` - Shows this help message.\n\n\
        **Initiators**\n\
        • `/order` - Submits a new order through a short dialogue in your DMs.\n\
        • `/orders` - Lists your latest orders and their status.\n\n\
        **Inspectors and payeers**\n\
        Use the buttons under the orders the bot sends you.\n\n\
        **Administrators**\n\
        • `/admin role grant|revoke <user> <role>` - Manages roles.\n\
        • `/admin chain <initiator> [first] [second] [third] [fourth]` - Sets who inspects an initiator's orders.\n\
        • `/admin payeer_chat` - Makes this channel receive approved orders for payment.\n\
        • `/admin bands show|set` - Shows or changes the escalation amounts (USD).";

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
