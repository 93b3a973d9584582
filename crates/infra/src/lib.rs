//! Infrastructure layer: record stores, the exchange-rate client, price
//! conversion, and the product service that composes them.

pub mod pricing;
pub mod product_service;
pub mod rates;
pub mod store;

pub use pricing::{ConversionError, CurrencyPair, PriceConverter};
pub use product_service::{ProductService, ServiceError};
pub use rates::{ExchangeRate, RateClient, RateClientError};
pub use store::{InMemoryProductStore, PostgresProductStore, ProductStore, StoreError};
