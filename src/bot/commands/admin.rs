//! Administration commands - roles, approval chains, the payeer chat and the
//! escalation bands.
//!
//! Every subcommand checks for the ADMIN role itself, so a subcommand can
//! never be reached without it.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::Context,
        core::{directory, escalation::EscalationBands, settings},
        entities::{Role, UserModel},
        errors::Result,
    };
    use poise::serenity_prelude as serenity;
    use tracing::info;

    /// Roles an administrator can hand out.
    #[derive(Debug, Clone, Copy, poise::ChoiceParameter)]
    pub enum RoleChoice {
        Initiator,
        Inspector,
        Payeer,
        Admin,
    }

    impl From<RoleChoice> for Role {
        fn from(choice: RoleChoice) -> Self {
            match choice {
                RoleChoice::Initiator => Self::Initiator,
                RoleChoice::Inspector => Self::Inspector,
                RoleChoice::Payeer => Self::Payeer,
                RoleChoice::Admin => Self::Admin,
            }
        }
    }

    async fn ensure_admin(ctx: Context<'_>) -> Result<()> {
        let db = &ctx.data().database;
        let caller = directory::require_user(db, &ctx.author().id.to_string()).await?;
        directory::require_role(db, caller.id, Role::Admin).await
    }

    /// Finds the registration of a Discord user, telling the caller when there is none.
    async fn registered(ctx: Context<'_>, user: &serenity::User) -> Result<Option<UserModel>> {
        let found =
            directory::get_user_by_discord_id(&ctx.data().database, &user.id.to_string()).await?;
        if found.is_none() {
            ctx.say(format!("❌ @{} has not used `/start` yet.", user.name))
                .await?;
        }
        Ok(found)
    }

    /// Administration commands.
    #[poise::command(
        slash_command,
        subcommands("role", "chain", "payeer_chat", "bands"),
        subcommand_required
    )]
    pub async fn admin(_ctx: Context<'_>) -> Result<()> {
        Ok(())
    }

    /// Grants or revokes roles.
    #[poise::command(slash_command, subcommands("grant", "revoke"), subcommand_required)]
    pub async fn role(_ctx: Context<'_>) -> Result<()> {
        Ok(())
    }

    /// Grants a role to a registered user.
    #[poise::command(slash_command)]
    pub async fn grant(
        ctx: Context<'_>,
        #[description = "User to grant the role to"] user: serenity::User,
        #[description = "Role to grant"] role: RoleChoice,
    ) -> Result<()> {
        ensure_admin(ctx).await?;
        let Some(target) = registered(ctx, &user).await? else {
            return Ok(());
        };
        let role = Role::from(role);
        directory::grant_role(&ctx.data().database, target.id, role).await?;
        info!(admin = %ctx.author().name, user_id = target.id, role = role.label(), "Role granted by admin");
        ctx.say(format!("✅ @{} is now {}.", target.username, role.label()))
            .await?;
        Ok(())
    }

    /// Revokes a role from a registered user.
    #[poise::command(slash_command)]
    pub async fn revoke(
        ctx: Context<'_>,
        #[description = "User to revoke the role from"] user: serenity::User,
        #[description = "Role to revoke"] role: RoleChoice,
    ) -> Result<()> {
        ensure_admin(ctx).await?;
        let Some(target) = registered(ctx, &user).await? else {
            return Ok(());
        };
        let role = Role::from(role);
        let removed = directory::revoke_role(&ctx.data().database, target.id, role).await?;
        let reply = if removed {
            format!("✅ @{} is no longer {}.", target.username, role.label())
        } else {
            format!("ℹ️ @{} was not {}.", target.username, role.label())
        };
        ctx.say(reply).await?;
        Ok(())
    }

    /// Sets the inspectors who review an initiator's orders, in order.
    ///
    /// Leaving a slot empty skips it. Orders above the last tier with an
    /// inspector go straight to approval.
    #[poise::command(slash_command)]
    pub async fn chain(
        ctx: Context<'_>,
        #[description = "Initiator whose chain is set"] initiator: serenity::User,
        #[description = "Inspector for tier 1 and up"] first: Option<serenity::User>,
        #[description = "Inspector for tier 2 and up"] second: Option<serenity::User>,
        #[description = "Inspector for tier 3 and up"] third: Option<serenity::User>,
        #[description = "Inspector for tier 4"] fourth: Option<serenity::User>,
    ) -> Result<()> {
        ensure_admin(ctx).await?;
        let db = &ctx.data().database;
        let Some(owner) = registered(ctx, &initiator).await? else {
            return Ok(());
        };

        let mut slots = [None; 4];
        let mut names = Vec::with_capacity(4);
        for (index, candidate) in [first, second, third, fourth].iter().enumerate() {
            let Some(candidate) = candidate else {
                names.push(format!("{}. -", index + 1));
                continue;
            };
            let Some(inspector) = registered(ctx, candidate).await? else {
                return Ok(());
            };
            if !directory::has_role(db, inspector.id, Role::Inspector).await? {
                ctx.say(format!(
                    "❌ @{} does not hold the {} role.",
                    inspector.username,
                    Role::Inspector.label()
                ))
                .await?;
                return Ok(());
            }
            slots[index] = Some(inspector.id);
            names.push(format!("{}. @{}", index + 1, inspector.username));
        }

        directory::set_chain(db, owner.id, slots).await?;
        let mut reply = format!(
            "✅ Approval chain of @{}:\n{}",
            owner.username,
            names.join("\n")
        );
        if slots.iter().all(Option::is_none) {
            reply.push_str("\n⚠️ No inspectors assigned: orders will be approved without review.");
        }
        ctx.say(reply).await?;
        Ok(())
    }

    /// Makes this channel receive approved orders for payment.
    #[poise::command(slash_command, guild_only)]
    pub async fn payeer_chat(ctx: Context<'_>) -> Result<()> {
        ensure_admin(ctx).await?;
        let channel = ctx.channel_id().to_string();
        settings::set_payeer_chat(&ctx.data().database, &channel).await?;
        ctx.say("✅ Approved orders will be posted here for payment.")
            .await?;
        Ok(())
    }

    /// Shows or changes the escalation bands.
    #[poise::command(slash_command, subcommands("show", "set"), subcommand_required)]
    pub async fn bands(_ctx: Context<'_>) -> Result<()> {
        Ok(())
    }

    /// Shows the current escalation bands.
    #[poise::command(slash_command)]
    pub async fn show(ctx: Context<'_>) -> Result<()> {
        ensure_admin(ctx).await?;
        let data = ctx.data();
        let bands = settings::get_bands(&data.database, &data.config.escalation).await?;
        ctx.say(format!("📊 Escalation bands (USD):\n{}", bands.describe()))
            .await?;
        Ok(())
    }

    /// Changes the escalation bands. Each tier starts where the previous one ends.
    #[poise::command(slash_command)]
    pub async fn set(
        ctx: Context<'_>,
        #[description = "Lower bound of tier 1 (exclusive)"] first_low: f64,
        #[description = "Upper bound of tier 1"] first_high: f64,
        #[description = "Upper bound of tier 2"] second_high: f64,
        #[description = "Upper bound of tier 3"] third_high: f64,
    ) -> Result<()> {
        ensure_admin(ctx).await?;
        let bands = EscalationBands {
            first_low,
            first_high,
            second_low: first_high,
            second_high,
            third_low: second_high,
            third_high,
            fourth_low: third_high,
        };
        settings::set_bands(&ctx.data().database, &bands).await?;
        info!(admin = %ctx.author().name, ?bands, "Escalation bands updated");
        ctx.say(format!("✅ Escalation bands updated:\n{}", bands.describe()))
            .await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
