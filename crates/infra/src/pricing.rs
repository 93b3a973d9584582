//! Source → target price conversion.

use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, warn};

use catalog_core::CurrencyCode;
use catalog_products::to_money_scale;

use crate::rates::{RateClient, RateClientError};

pub const DEFAULT_RATE_TIMEOUT: Duration = Duration::from_secs(5);

/// The fixed source/target pair a deployment converts between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrencyPair {
    pub source: CurrencyCode,
    pub target: CurrencyCode,
}

impl CurrencyPair {
    pub fn new(source: CurrencyCode, target: CurrencyCode) -> Self {
        Self { source, target }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The provider answered but gave no usable rate.
    #[error("exchange rate unavailable: {0}")]
    RateUnavailable(String),

    /// The provider could not be reached in time.
    #[error("exchange rate service unreachable: {0}")]
    UpstreamUnreachable(String),
}

impl From<RateClientError> for ConversionError {
    fn from(err: RateClientError) -> Self {
        match err {
            RateClientError::Transport(_) | RateClientError::Timeout => {
                ConversionError::UpstreamUnreachable(err.to_string())
            }
            RateClientError::Status(_)
            | RateClientError::Decode(_)
            | RateClientError::UnsupportedPair { .. } => ConversionError::RateUnavailable(err.to_string()),
        }
    }
}

/// Converts prices using a fresh rate lookup per call.
#[derive(Debug, Clone)]
pub struct PriceConverter<R> {
    rates: R,
    timeout: Duration,
}

impl<R: RateClient> PriceConverter<R> {
    pub fn new(rates: R) -> Self {
        Self::with_timeout(rates, DEFAULT_RATE_TIMEOUT)
    }

    pub fn with_timeout(rates: R, timeout: Duration) -> Self {
        Self { rates, timeout }
    }

    /// The medium rate of the first record the provider returns.
    pub async fn current_rate(
        &self,
        source: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Result<Decimal, ConversionError> {
        debug!(%source, %target, "looking up exchange rate");

        let rates = tokio::time::timeout(self.timeout, self.rates.fetch_rates(source, target))
            .await
            .map_err(|_| {
                warn!(%source, %target, timeout_ms = self.timeout.as_millis() as u64, "rate lookup timed out");
                ConversionError::UpstreamUnreachable(format!(
                    "no answer within {} ms",
                    self.timeout.as_millis()
                ))
            })?
            .map_err(|e| {
                warn!(%source, %target, error = %e, "rate lookup failed");
                ConversionError::from(e)
            })?;

        let first = rates.first().ok_or_else(|| {
            warn!(%source, %target, "rate provider returned no records");
            ConversionError::RateUnavailable(format!("no {source}/{target} rate published"))
        })?;

        let raw = first.normalized_medium_rate();
        let rate = Decimal::from_str(&raw)
            .map_err(|_| ConversionError::RateUnavailable(format!("rate {raw:?} is not a number")))?;
        if rate <= Decimal::ZERO {
            return Err(ConversionError::RateUnavailable(format!("rate {raw} is not positive")));
        }
        Ok(rate)
    }

    /// `amount / rate`, rounded half-to-even to two decimals.
    pub async fn convert(
        &self,
        amount: Decimal,
        source: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Result<Decimal, ConversionError> {
        let rate = self.current_rate(source, target).await?;
        let converted = amount
            .checked_div(rate)
            .ok_or_else(|| ConversionError::RateUnavailable(format!("cannot divide {amount} by {rate}")))?;
        Ok(to_money_scale(converted))
    }
}
