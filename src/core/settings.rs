//! Runtime settings stored in the `settings` table.
//!
//! Two keys are used: the escalation bands (TOML text) and the payeer chat id.
//! Both are read lazily: the bands are seeded from the startup configuration
//! the first time they are read, and the payeer chat stays unset until an
//! admin designates one.

use crate::{
    core::escalation::EscalationBands,
    entities::{Setting, setting},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Set, prelude::*};
use tracing::{debug, info};

const BANDS_KEY: &str = "relation_conditions";
const PAYEER_CHAT_KEY: &str = "payeer_chat_id";

/// Reads a raw value from the settings table.
pub async fn get_setting<C>(db: &C, key: &str) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    let value = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?
        .map(|s| s.value);
    debug!("Setting '{}': {:?}", key, value);
    Ok(value)
}

/// Inserts or replaces a value in the settings table.
pub async fn set_setting<C>(db: &C, key: &str, value: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let existing = Setting::find()
        .filter(setting::Column::Key.eq(key))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: setting::ActiveModel = state.into();
        active_model.value = Set(value.to_string());
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        let active_model = setting::ActiveModel {
            key: Set(key.to_string()),
            value: Set(value.to_string()),
            updated_at: Set(now),
            ..Default::default()
        };
        active_model.insert(db).await?;
    }
    Ok(())
}

/// Returns the escalation bands, seeding `defaults` on first read.
pub async fn get_bands<C>(db: &C, defaults: &EscalationBands) -> Result<EscalationBands>
where
    C: ConnectionTrait,
{
    match get_setting(db, BANDS_KEY).await? {
        Some(raw) => parse_bands(&raw),
        None => seed_bands(db, defaults).await,
    }
}

/// Inserts `defaults` unless another reader stored bands first, in which case
/// those win.
async fn seed_bands<C>(db: &C, defaults: &EscalationBands) -> Result<EscalationBands>
where
    C: ConnectionTrait,
{
    defaults.validate()?;
    let raw = toml::to_string(defaults).map_err(|e| Error::Config {
        message: format!("Failed to serialize escalation bands: {e}"),
    })?;
    let seed = setting::ActiveModel {
        key: Set(BANDS_KEY.to_string()),
        value: Set(raw),
        updated_at: Set(Utc::now()),
        ..Default::default()
    };
    match seed.insert(db).await {
        Ok(_) => {
            info!("No escalation bands stored yet, seeded defaults");
            Ok(defaults.clone())
        }
        Err(e) => match get_setting(db, BANDS_KEY).await? {
            Some(raw) => {
                debug!(error = %e, "Escalation bands were seeded concurrently");
                parse_bands(&raw)
            }
            None => Err(e.into()),
        },
    }
}

fn parse_bands(raw: &str) -> Result<EscalationBands> {
    toml::from_str(raw).map_err(|e| Error::Config {
        message: format!("Stored escalation bands are unreadable: {e}"),
    })
}

/// Validates and stores new escalation bands.
pub async fn set_bands<C>(db: &C, bands: &EscalationBands) -> Result<()>
where
    C: ConnectionTrait,
{
    bands.validate()?;
    let raw = toml::to_string(bands).map_err(|e| Error::Config {
        message: format!("Failed to serialize escalation bands: {e}"),
    })?;
    set_setting(db, BANDS_KEY, &raw).await
}

/// Returns the chat that receives orders at the payeer stage, if one is set.
pub async fn get_payeer_chat<C>(db: &C) -> Result<Option<String>>
where
    C: ConnectionTrait,
{
    Ok(get_setting(db, PAYEER_CHAT_KEY)
        .await?
        .filter(|chat| !chat.is_empty() && chat != "0"))
}

/// Designates the chat that receives orders at the payeer stage.
pub async fn set_payeer_chat<C>(db: &C, chat_id: &str) -> Result<()>
where
    C: ConnectionTrait,
{
    info!(chat_id, "Payeer chat updated");
    set_setting(db, PAYEER_CHAT_KEY, chat_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::setup_test_db;

    #[tokio::test]
    async fn test_bands_seeded_on_first_read() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get_setting(&db, BANDS_KEY).await?.is_none());

        let defaults = EscalationBands::default();
        let bands = get_bands(&db, &defaults).await?;
        assert_eq!(bands, defaults);
        assert!(get_setting(&db, BANDS_KEY).await?.is_some());
        Ok(())
    }

    #[tokio::test]
    async fn test_seeding_after_another_reader_keeps_their_bands() -> Result<()> {
        let db = setup_test_db().await?;
        let stored = EscalationBands {
            first_high: 750.0,
            second_low: 750.0,
            ..EscalationBands::default()
        };
        // Another reader won the race between our read and our insert
        set_bands(&db, &stored).await?;

        let bands = seed_bands(&db, &EscalationBands::default()).await?;
        assert_eq!(bands, stored);
        assert_eq!(get_bands(&db, &EscalationBands::default()).await?, stored);
        Ok(())
    }

    #[tokio::test]
    async fn test_stored_bands_win_over_defaults() -> Result<()> {
        let db = setup_test_db().await?;
        let custom = EscalationBands {
            first_high: 500.0,
            second_low: 500.0,
            ..EscalationBands::default()
        };
        set_bands(&db, &custom).await?;

        let bands = get_bands(&db, &EscalationBands::default()).await?;
        assert_eq!(bands, custom);
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_bands_are_not_stored() -> Result<()> {
        let db = setup_test_db().await?;
        let broken = EscalationBands {
            second_low: 2500.0,
            ..EscalationBands::default()
        };
        assert!(matches!(
            set_bands(&db, &broken).await,
            Err(Error::InvalidBands { .. })
        ));
        assert!(get_setting(&db, BANDS_KEY).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_payeer_chat_roundtrip() -> Result<()> {
        let db = setup_test_db().await?;
        assert!(get_payeer_chat(&db).await?.is_none());

        set_payeer_chat(&db, "555").await?;
        assert_eq!(get_payeer_chat(&db).await?.as_deref(), Some("555"));

        set_payeer_chat(&db, "777").await?;
        assert_eq!(get_payeer_chat(&db).await?.as_deref(), Some("777"));
        Ok(())
    }

    #[tokio::test]
    async fn test_zero_payeer_chat_counts_as_unset() -> Result<()> {
        let db = setup_test_db().await?;
        set_setting(&db, PAYEER_CHAT_KEY, "0").await?;
        assert!(get_payeer_chat(&db).await?.is_none());
        Ok(())
    }
}
