//! HTTP client for the Croatian National Bank (HNB) rate list.
//!
//! `GET {base_url}/tecajn/v1?valuta={TARGET}` answers with a JSON array of
//! records keyed by Croatian field names. Rates are quoted against the kuna,
//! so the source currency is taken from the request rather than the payload.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::{debug, warn};

use catalog_core::CurrencyCode;

use super::{ExchangeRate, RateClient, RateClientError};

pub const DEFAULT_BASE_URL: &str = "https://api.hnb.hr";

const DATE_FORMAT: &str = "%d.%m.%Y";

#[derive(Debug, Clone)]
pub struct HnbRateClient {
    client: reqwest::Client,
    base_url: String,
}

impl HnbRateClient {
    /// Build a client whose requests are bounded by `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RateClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RateClientError::Transport(e.to_string()))?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }
}

/// Wire shape of one HNB record.
#[derive(Debug, Deserialize)]
struct HnbRateRecord {
    #[serde(rename = "Broj tečajnice", default)]
    list_number: Option<String>,
    #[serde(rename = "Datum primjene", default)]
    applied_on: Option<String>,
    #[serde(rename = "Država", default)]
    country: Option<String>,
    #[serde(rename = "Šifra valute", default)]
    currency_number: Option<String>,
    #[serde(rename = "Valuta")]
    currency: String,
    #[serde(rename = "Jedinica", default)]
    unit: Option<HnbUnit>,
    #[serde(rename = "Kupovni za devize", default)]
    buying_rate: Option<String>,
    #[serde(rename = "Srednji za devize")]
    medium_rate: String,
    #[serde(rename = "Prodajni za devize", default)]
    selling_rate: Option<String>,
}

/// The unit shows up both as a number and as a string depending on the API
/// version.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HnbUnit {
    Number(u32),
    Text(String),
}

impl HnbUnit {
    fn value(&self) -> Result<u32, RateClientError> {
        match self {
            HnbUnit::Number(n) => Ok(*n),
            HnbUnit::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| RateClientError::Decode(format!("invalid unit {s:?}"))),
        }
    }
}

impl HnbRateRecord {
    fn into_exchange_rate(self, source: &CurrencyCode) -> Result<ExchangeRate, RateClientError> {
        let target = CurrencyCode::new(&self.currency)
            .map_err(|e| RateClientError::Decode(e.to_string()))?;
        let unit = self.unit.as_ref().map(HnbUnit::value).transpose()?.unwrap_or(1);
        let applied_on = self
            .applied_on
            .as_deref()
            .map(|d| NaiveDate::parse_from_str(d.trim(), DATE_FORMAT))
            .transpose()
            .map_err(|e| RateClientError::Decode(format!("invalid application date: {e}")))?;

        Ok(ExchangeRate {
            source: source.clone(),
            target,
            country: self.country,
            currency_number: self.currency_number,
            medium_rate: self.medium_rate,
            buying_rate: self.buying_rate,
            selling_rate: self.selling_rate,
            unit,
            list_number: self.list_number,
            applied_on,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> RateClientError {
    if err.is_timeout() {
        RateClientError::Timeout
    } else if err.is_decode() {
        RateClientError::Decode(err.to_string())
    } else if let Some(status) = err.status() {
        RateClientError::Status(status.as_u16())
    } else {
        RateClientError::Transport(err.to_string())
    }
}

#[async_trait::async_trait]
impl RateClient for HnbRateClient {
    async fn fetch_rates(
        &self,
        source: &CurrencyCode,
        target: &CurrencyCode,
    ) -> Result<Vec<ExchangeRate>, RateClientError> {
        let url = format!("{}/tecajn/v1", self.base_url);
        debug!(%source, %target, %url, "fetching exchange rates");

        let response = self
            .client
            .get(&url)
            .query(&[("valuta", target.as_str())])
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            warn!(%source, %target, status = status.as_u16(), "rate provider returned an error status");
            return Err(RateClientError::Status(status.as_u16()));
        }

        let records: Vec<HnbRateRecord> = response.json().await.map_err(map_reqwest_error)?;
        let rates = records
            .into_iter()
            .map(|record| record.into_exchange_rate(source))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(first) = rates.first().filter(|rate| &rate.target != target) {
            return Err(RateClientError::UnsupportedPair {
                base: source.to_string(),
                quoted: first.target.to_string(),
            });
        }

        Ok(rates)
    }
}
