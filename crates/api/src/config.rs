use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use catalog_core::CurrencyCode;

// API configuration sourced from environment variables.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub rate_api_url: String,
    pub source_currency: CurrencyCode,
    pub target_currency: CurrencyCode,
    pub rate_timeout: Duration,
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
}

impl ApiConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in prod).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let bind_addr = var("CATALOG_BIND", "0.0.0.0:8080")
            .parse()
            .with_context(|| "parse CATALOG_BIND")?;
        let rate_api_url = var("CATALOG_RATE_API_URL", catalog_infra::rates::hnb::DEFAULT_BASE_URL);
        let source_currency = var("CATALOG_SOURCE_CURRENCY", "HRK")
            .parse()
            .with_context(|| "parse CATALOG_SOURCE_CURRENCY")?;
        let target_currency = var("CATALOG_TARGET_CURRENCY", "EUR")
            .parse()
            .with_context(|| "parse CATALOG_TARGET_CURRENCY")?;
        let timeout_ms: u64 = var("CATALOG_RATE_TIMEOUT_MS", "5000")
            .parse()
            .with_context(|| "parse CATALOG_RATE_TIMEOUT_MS")?;
        if timeout_ms == 0 {
            bail!("CATALOG_RATE_TIMEOUT_MS must be greater than zero");
        }
        let use_persistent_stores = var("USE_PERSISTENT_STORES", "false")
            .parse()
            .with_context(|| "parse USE_PERSISTENT_STORES")?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        if use_persistent_stores && database_url.is_none() {
            bail!("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        }

        Ok(Self {
            bind_addr,
            rate_api_url,
            source_currency,
            target_currency,
            rate_timeout: Duration::from_millis(timeout_ms),
            use_persistent_stores,
            database_url,
        })
    }

    /// Defaults with in-memory stores, a loopback ephemeral bind and the rate
    /// client pointed at `rate_api_url`.
    pub fn in_memory(rate_api_url: impl Into<String>) -> Result<Self> {
        let rate_api_url = rate_api_url.into();
        Self::from_lookup(|key| match key {
            "CATALOG_BIND" => Some("127.0.0.1:0".to_string()),
            "CATALOG_RATE_API_URL" => Some(rate_api_url.clone()),
            _ => None,
        })
    }
}
