//! Exchange-rate lookup used to normalize RUB amounts to USD.
//!
//! The HTTP source asks each configured mirror once, in order, and returns the
//! first usable answer. It never retries beyond that; the caller applies the
//! fallback rate when every mirror fails.

use crate::{
    config::app::ExchangeConfig,
    errors::{Error, Result},
};
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Source of the RUB per USD exchange rate.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Current number of roubles per US dollar.
    async fn rub_per_usd(&self) -> Result<f64>;
}

/// A rate that never changes; used for offline deployments and tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedRate(pub f64);

#[async_trait]
impl RateSource for FixedRate {
    async fn rub_per_usd(&self) -> Result<f64> {
        Ok(self.0)
    }
}

/// Looks the rate up over HTTP.
#[derive(Debug, Clone)]
pub struct HttpRateSource {
    client: reqwest::Client,
    urls: Vec<String>,
}

impl HttpRateSource {
    /// Builds a source for the configured mirrors with a per-request timeout.
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            urls: config.urls.clone(),
        })
    }

    async fn fetch(&self, url: &str) -> Result<f64> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_rate(&body)
    }
}

/// Extracts the rate from a mirror body: `{"date": "...", "usd": {"rub": 92.4, ...}}`.
///
/// Only a positive, finite number is accepted.
pub fn parse_rate(body: &str) -> Result<f64> {
    let value: Value = serde_json::from_str(body).map_err(|e| Error::ExchangeRate {
        message: format!("malformed response: {e}"),
    })?;
    let rate = value
        .get("usd")
        .and_then(|usd| usd.get("rub"))
        .ok_or_else(|| Error::ExchangeRate {
            message: "response has no usd.rub entry".to_string(),
        })?;
    match rate.as_f64() {
        Some(rate) if rate.is_finite() && rate > 0.0 => Ok(rate),
        _ => Err(Error::ExchangeRate {
            message: format!("usd.rub is not a positive number: {rate}"),
        }),
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    #[instrument(skip(self))]
    async fn rub_per_usd(&self) -> Result<f64> {
        for url in &self.urls {
            match self.fetch(url).await {
                Ok(rate) => {
                    debug!(url = %url, rate, "Fetched exchange rate");
                    return Ok(rate);
                }
                Err(e) => warn!(url = %url, error = %e, "Exchange rate mirror failed"),
            }
        }
        Err(Error::ExchangeRate {
            message: format!("all {} mirrors failed", self.urls.len()),
        })
    }
}
