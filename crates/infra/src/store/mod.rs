//! Product record storage abstractions.
//!
//! The store is the single commit point of every write. Implementations must
//! make each call atomic for the one record it touches and must enforce
//! uniqueness of the product code, reporting clashes as
//! [`StoreError::UniqueViolation`].

use std::sync::Arc;

use thiserror::Error;

use catalog_core::ProductId;
use catalog_products::{NewProduct, Product};

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryProductStore;
pub use postgres::PostgresProductStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A unique constraint (the product code) was violated.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    /// The row addressed by an update/delete does not exist.
    #[error("product {0} not found")]
    NotFound(ProductId),

    /// Any other backend failure (connection, poisoned lock, bad row data).
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Key-value store of products addressed by integer id.
#[async_trait::async_trait]
pub trait ProductStore: Send + Sync {
    /// All products, ordered by id.
    async fn find_all(&self) -> Result<Vec<Product>, StoreError>;

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    /// Insert a new record; the store assigns the id.
    async fn insert(&self, product: NewProduct) -> Result<Product, StoreError>;

    /// Overwrite an existing record (last write wins).
    async fn update(&self, product: Product) -> Result<Product, StoreError>;

    async fn delete(&self, id: ProductId) -> Result<(), StoreError>;
}

#[async_trait::async_trait]
impl<S> ProductStore for Arc<S>
where
    S: ProductStore + ?Sized,
{
    async fn find_all(&self) -> Result<Vec<Product>, StoreError> {
        (**self).find_all().await
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).find_by_id(id).await
    }

    async fn insert(&self, product: NewProduct) -> Result<Product, StoreError> {
        (**self).insert(product).await
    }

    async fn update(&self, product: Product) -> Result<Product, StoreError> {
        (**self).update(product).await
    }

    async fn delete(&self, id: ProductId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}
