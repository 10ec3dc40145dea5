use approval_buddy::{
    bot, config,
    core::settings,
    errors::{Error, Result},
};
use dotenvy::dotenv;
use std::{env, sync::Arc};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; the variables may also be set externally
    dotenv().ok();

    // 3. Load the application configuration
    let app_config = config::load_app_configuration()
        .inspect_err(|e| error!("Critical error loading application configuration: {}", e))?;
    info!("Successfully processed application configuration.");

    // 4. Attachments live under the data directory, which the database file shares
    tokio::fs::create_dir_all(&app_config.storage.files_dir)
        .await
        .inspect_err(|e| {
            error!(
                "Failed to create files directory {:?}: {}",
                app_config.storage.files_dir, e
            );
        })?;

    // 5. Connect to the database and make sure the tables exist
    let db = config::database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    config::database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;
    let bands = settings::get_bands(&db, &app_config.escalation).await?;
    info!(?bands, "Escalation bands loaded");

    // 6. Run the bot
    // DISCORD_BOT_TOKEN is loaded here, directly before use, not stored in AppConfig
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {}", e))
        .map_err(Error::EnvVar)?;

    bot::run_bot(token, Arc::new(app_config), db).await
}
