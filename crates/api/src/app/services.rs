//! Infrastructure wiring: record store, rate client and the product service.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;

use catalog_infra::rates::HnbRateClient;
use catalog_infra::{
    CurrencyPair, InMemoryProductStore, PostgresProductStore, PriceConverter, ProductService, ProductStore,
    RateClient,
};
use catalog_products::ProductRules;

use crate::config::ApiConfig;

pub type CatalogService = ProductService<Arc<dyn ProductStore>, Arc<dyn RateClient>, ProductRules>;

pub struct AppServices {
    pub products: CatalogService,
}

impl AppServices {
    pub fn new(store: Arc<dyn ProductStore>, rates: Arc<dyn RateClient>, config: &ApiConfig) -> Self {
        let pair = CurrencyPair::new(config.source_currency.clone(), config.target_currency.clone());
        let converter = PriceConverter::with_timeout(rates, config.rate_timeout);
        Self {
            products: ProductService::new(store, converter, ProductRules, pair),
        }
    }
}

pub async fn build_services(config: &ApiConfig) -> Result<AppServices> {
    let rates: Arc<dyn RateClient> = Arc::new(
        HnbRateClient::new(config.rate_api_url.clone(), config.rate_timeout)
            .context("build exchange rate client")?,
    );

    let store: Arc<dyn ProductStore> = if config.use_persistent_stores {
        Arc::new(build_postgres_store(config).await?)
    } else {
        tracing::info!("using in-memory product store");
        Arc::new(InMemoryProductStore::new())
    };

    Ok(AppServices::new(store, rates, config))
}

async fn build_postgres_store(config: &ApiConfig) -> Result<PostgresProductStore> {
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;

    let pool = PgPool::connect(database_url)
        .await
        .context("connect to Postgres")?;
    let store = PostgresProductStore::new(pool);
    store.ensure_schema().await.context("create product schema")?;

    tracing::info!("using Postgres product store");
    Ok(store)
}
