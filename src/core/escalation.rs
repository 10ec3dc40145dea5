//! Escalation classifier - Maps an order amount to its approval tier.
//!
//! Amounts are normalized to USD before they are compared against the bands.
//! Bands are half-open `(low, high]` ranges for tiers 1-3 and an open-ended
//! `(low, ∞)` range for tier 4, so a boundary value always belongs to the
//! lower tier.

use crate::{
    core::exchange::RateSource,
    entities::Currency,
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Number of tiers, which is also the length of an inspector chain.
pub const TIER_COUNT: i32 = 4;

/// Threshold bands in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationBands {
    pub first_low: f64,
    pub first_high: f64,
    pub second_low: f64,
    pub second_high: f64,
    pub third_low: f64,
    pub third_high: f64,
    pub fourth_low: f64,
}

impl Default for EscalationBands {
    fn default() -> Self {
        Self {
            first_low: 0.0,
            first_high: 2000.0,
            second_low: 2000.0,
            second_high: 20000.0,
            third_low: 20000.0,
            third_high: 40000.0,
            fourth_low: 40000.0,
        }
    }
}

impl EscalationBands {
    /// The bands as `(low, high)` pairs in tier order; tier 4 has no upper bound.
    #[must_use]
    pub const fn ranges(&self) -> [(f64, Option<f64>); 4] {
        [
            (self.first_low, Some(self.first_high)),
            (self.second_low, Some(self.second_high)),
            (self.third_low, Some(self.third_high)),
            (self.fourth_low, None),
        ]
    }

    /// Checks that the bands are finite, non-empty and contiguous.
    pub fn validate(&self) -> Result<()> {
        let ranges = self.ranges();
        for (index, &(low, high)) in ranges.iter().enumerate() {
            let tier = index + 1;
            if !low.is_finite() || high.is_some_and(|h| !h.is_finite()) {
                return Err(Error::InvalidBands {
                    message: format!("tier {tier} has a non-finite bound"),
                });
            }
            if let Some(high) = high {
                if high <= low {
                    return Err(Error::InvalidBands {
                        message: format!("tier {tier} upper bound {high} must exceed {low}"),
                    });
                }
            }
        }
        for (index, pair) in ranges.windows(2).enumerate() {
            let (_, upper) = pair[0];
            let (next_low, _) = pair[1];
            if upper != Some(next_low) {
                return Err(Error::InvalidBands {
                    message: format!(
                        "tier {} must start where tier {} ends ({:?} vs {next_low})",
                        index + 2,
                        index + 1,
                        upper
                    ),
                });
            }
        }
        Ok(())
    }

    /// Returns the tier (1-4) whose band contains `usd_amount`.
    pub fn classify(&self, usd_amount: f64) -> Result<i32> {
        let mut tier = 0;
        for (low, high) in self.ranges() {
            tier += 1;
            if usd_amount > low && high.is_none_or(|h| usd_amount <= h) {
                return Ok(tier);
            }
        }
        Err(Error::InvalidAmount { amount: usd_amount })
    }

    /// One line per tier, for admin replies.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut lines = Vec::with_capacity(4);
        let mut tier = 0;
        for (low, high) in self.ranges() {
            tier += 1;
            match high {
                Some(high) => lines.push(format!("Tier {tier}: {low} < amount ≤ {high} USD")),
                None => lines.push(format!("Tier {tier}: amount > {low} USD")),
            }
        }
        lines.join("\n")
    }
}

/// Converts `amount` in `currency` to USD using `rub_per_usd`.
#[must_use]
pub fn to_usd(amount: f64, currency: Currency, rub_per_usd: f64) -> f64 {
    match currency {
        Currency::Usd => amount,
        Currency::Rub => amount / rub_per_usd,
    }
}

/// Computes the tier of an order amount.
///
/// USD amounts are classified as-is. RUB amounts are converted with the live
/// rate from `rates`; when the lookup fails the `fallback_rate` is used
/// instead and a warning is logged.
pub async fn order_level<R>(
    rates: &R,
    fallback_rate: f64,
    bands: &EscalationBands,
    amount: f64,
    currency: Currency,
) -> Result<i32>
where
    R: RateSource + ?Sized,
{
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::InvalidAmount { amount });
    }

    let usd_amount = match currency {
        Currency::Usd => amount,
        Currency::Rub => {
            let rate = match rates.rub_per_usd().await {
                Ok(rate) => rate,
                Err(e) => {
                    warn!(
                        error = %e,
                        fallback_rate,
                        "Exchange rate lookup failed, using fallback rate"
                    );
                    fallback_rate
                }
            };
            to_usd(amount, currency, rate)
        }
    };

    let level = bands.classify(usd_amount)?;
    debug!(amount, ?currency, usd_amount, level, "Classified order amount");
    Ok(level)
}
