//! Exchange-rate lookups.
//!
//! [`RateClient`] is the port the price converter depends on; [`hnb`] holds the
//! HTTP adapter for the Croatian National Bank rate list.

use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;

use catalog_core::CurrencyCode;

pub mod hnb;

pub use hnb::HnbRateClient;

/// One record of a provider's rate list.
///
/// Rates are kept as the provider's decimal strings, which may use a comma as
/// the decimal separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRate {
    pub source: CurrencyCode,
    pub target: CurrencyCode,
    /// Issuing country or area as the provider names it.
    pub country: Option<String>,
    /// ISO 4217 numeric code of `target`.
    pub currency_number: Option<String>,
    pub medium_rate: String,
    pub buying_rate: Option<String>,
    pub selling_rate: Option<String>,
    pub unit: u32,
    pub list_number: Option<String>,
    pub applied_on: Option<NaiveDate>,
}

impl ExchangeRate {
    /// The medium rate with `,` normalized to `.` so it parses as a decimal.
    pub fn normalized_medium_rate(&self) -> String {
        self.medium_rate.trim().replace(',', ".")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RateClientError {
    #[error("rate provider unreachable: {0}")]
    Transport(String),

    #[error("rate provider timed out")]
    Timeout,

    #[error("rate provider answered with status {0}")]
    Status(u16),

    #[error("rate provider response could not be decoded: {0}")]
    Decode(String),

    #[error("rate provider does not quote {base}/{quoted}")]
    UnsupportedPair { base: String, quoted: String },
}

#[async_trait::async_trait]
pub trait RateClient: Send + Sync {
    /// Current rate list for `source` → `target`; the first entry is the one
    /// in effect.
    async fn fetch_rates(
        &self,
        source: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Result<Vec<ExchangeRate>, RateClientError>;
}

#[async_trait::async_trait]
impl<R> RateClient for Arc<R>
where
    R: RateClient + ?Sized,
{
    async fn fetch_rates(
        &self,
        source: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Result<Vec<ExchangeRate>, RateClientError> {
        (**self).fetch_rates(source, target).await
    }
}
