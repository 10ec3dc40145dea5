//! Application configuration loading from config.toml
//!
//! Every section is optional: a missing file or a missing key falls back to the
//! defaults below. The escalation bands in this file only seed the settings
//! table on first use; afterwards admins edit them at runtime.

use crate::core::escalation::EscalationBands;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Mirrors serving `{"usd": {"rub": <rate>, ...}}`, tried in order.
const DEFAULT_RATE_URLS: [&str; 2] = [
    "https://cdn.jsdelivr.net/npm/@fawazahmed0/currency-api@latest/v1/currencies/usd.json",
    "https://latest.currency-api.pages.dev/v1/currencies/usd.json",
];

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub storage: StorageConfig,
    pub exchange: ExchangeConfig,
    /// Default bands written to the settings table on first read
    pub escalation: EscalationBands,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Discord username that is made an administrator on `/start`
    pub admin_username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory attachments are downloaded into
    pub files_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            files_dir: PathBuf::from("data/files"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    /// Rate mirrors, tried once each in order
    pub urls: Vec<String>,
    /// RUB per USD used when every mirror fails
    pub fallback_rate: f64,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Skip the lookup entirely and always use this rate
    pub fixed_rate: Option<f64>,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            urls: DEFAULT_RATE_URLS.iter().map(ToString::to_string).collect(),
            fallback_rate: 100.0,
            timeout_secs: 5,
            fixed_rate: None,
        }
    }
}

/// Parses configuration from TOML text and validates it.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()?;
    Ok(config)
}

/// Loads configuration from a TOML file
///
/// A missing file yields the defaults; an unreadable or malformed one is an error.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path);
    if !path.exists() {
        info!("No config file at {:?}, using defaults", path);
        return Ok(AppConfig::default());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path.display()),
    })?;
    parse_config(&contents)
}

/// Loads configuration from `CONFIG_PATH` (default `./config.toml`) and applies
/// the `ADMIN_USERNAME` override.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    let mut config = load_config(&path)?;
    if let Ok(admin) = std::env::var("ADMIN_USERNAME") {
        config.bot.admin_username = Some(admin);
    }
    Ok(config)
}

impl AppConfig {
    fn validate(&self) -> Result<()> {
        if !(self.exchange.fallback_rate.is_finite() && self.exchange.fallback_rate > 0.0) {
            return Err(Error::Config {
                message: "exchange.fallback_rate must be a positive number".to_string(),
            });
        }
        if let Some(rate) = self.exchange.fixed_rate {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(Error::Config {
                    message: "exchange.fixed_rate must be a positive number".to_string(),
                });
            }
        }
        self.escalation.validate().map_err(|e| Error::Config {
            message: format!("[escalation] {e}"),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            [bot]
            admin_username = "boss"

            [storage]
            files_dir = "/var/lib/approvals"

            [exchange]
            urls = ["https://rates.example/usd.json"]
            fallback_rate = 90.5
            timeout_secs = 2

            [escalation]
            first_low = 0
            first_high = 1000
            second_low = 1000
            second_high = 5000
            third_low = 5000
            third_high = 9000
            fourth_low = 9000
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.bot.admin_username.as_deref(), Some("boss"));
        assert_eq!(config.storage.files_dir, PathBuf::from("/var/lib/approvals"));
        assert_eq!(config.exchange.urls.len(), 1);
        assert_eq!(config.exchange.fallback_rate, 90.5);
        assert_eq!(config.exchange.timeout_secs, 2);
        assert_eq!(config.escalation.second_high, 5000.0);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config = parse_config("[bot]\nadmin_username = \"boss\"\n").unwrap();
        assert_eq!(config.storage.files_dir, PathBuf::from("data/files"));
        assert_eq!(config.exchange.fallback_rate, 100.0);
        assert_eq!(config.exchange.urls.len(), 2);
        assert_eq!(config.escalation, EscalationBands::default());
    }

    #[test]
    fn test_rejects_gapped_bands() {
        let toml_str = r"
            [escalation]
            first_low = 0
            first_high = 1000
            second_low = 1500
            second_high = 5000
            third_low = 5000
            third_high = 9000
            fourth_low = 9000
        ";
        assert!(matches!(parse_config(toml_str), Err(Error::Config { .. })));
    }

    #[test]
    fn test_rejects_non_positive_fallback_rate() {
        let result = parse_config("[exchange]\nfallback_rate = 0.0\n");
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = load_config("/definitely/not/here/config.toml").unwrap();
        assert!(config.bot.admin_username.is_none());
    }
}
