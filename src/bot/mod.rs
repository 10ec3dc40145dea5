//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for ApprovalBuddy: slash
//! commands, the DM conversation and button handlers, and the serenity-backed
//! chat client the workflow posts through.

/// Discord implementation of the chat seam
pub mod chat;
/// Discord command implementations (order, admin, general)
pub mod commands;
/// Discord interaction handlers (DM messages, button clicks)
pub mod handlers;
/// Button rows and custom id encoding
pub mod keyboards;

use crate::{
    config::AppConfig,
    core::{
        exchange::{FixedRate, HttpRateSource, RateSource},
        session::SessionStore,
        workflow::Workflow,
    },
    errors::{Error, Result},
};
use chat::DiscordChat;
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands and event handlers.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Startup configuration
    pub config: Arc<AppConfig>,
    /// Per-user conversation state
    pub sessions: SessionStore,
    /// Exchange rate lookup used when classifying orders
    pub rates: Arc<dyn RateSource>,
    /// Outgoing Discord messages
    pub chat: DiscordChat,
}

impl BotData {
    /// The workflow bound to this bot's database, chat and configuration.
    #[must_use]
    pub fn workflow(&self) -> Workflow<'_> {
        Workflow {
            db: &self.database,
            chat: &self.chat,
            rates: self.rates.as_ref(),
            config: &self.config,
        }
    }
}

/// Poise context used by every command.
pub type Context<'a> = poise::Context<'a, BotData, Error>;

/// Picks the rate source the configuration asks for.
pub fn rate_source(config: &AppConfig) -> Result<Arc<dyn RateSource>> {
    Ok(match config.exchange.fixed_rate {
        Some(rate) => {
            info!(rate, "Using fixed exchange rate");
            Arc::new(FixedRate(rate))
        }
        None => Arc::new(HttpRateSource::new(&config.exchange)?),
    })
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {error:?}");
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Error in command `{}`: {:?}", ctx.command().name, error);
            let reply = poise::CreateReply::default()
                .content(error.user_message())
                .ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error message: {e}");
            }
        }
        poise::FrameworkError::EventHandler { error, event, .. } => {
            error!(
                "Error while handling event `{}`: {:?}",
                event.snake_case_name(),
                error
            );
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {e}");
            }
        }
    }
}

/// Connects to Discord and runs until the gateway connection ends.
#[instrument(skip_all)]
pub async fn run_bot(
    token: String,
    config: Arc<AppConfig>,
    database: DatabaseConnection,
) -> Result<()> {
    let rates = rate_source(&config)?;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::start(),
                commands::order(),
                commands::orders(),
                commands::cancel(),
                commands::admin(),
                commands::ping(),
                commands::help(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handlers::event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                info!("Registered slash commands globally");
                Ok(BotData {
                    database,
                    config,
                    sessions: SessionStore::new(),
                    rates,
                    chat: DiscordChat::new(Arc::clone(&ctx.http))?,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::DIRECT_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    info!("Starting Discord client");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await?;
    client.start().await?;
    Ok(())
}

pub use commands::*;
