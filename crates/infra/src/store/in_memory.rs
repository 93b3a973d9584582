use std::collections::BTreeMap;
use std::sync::RwLock;

use catalog_core::{Entity, ProductId};
use catalog_products::{NewProduct, Product};

use super::{ProductStore, StoreError};

#[derive(Debug)]
struct Rows {
    next_id: i32,
    products: BTreeMap<ProductId, Product>,
}

/// In-memory product store for tests/dev.
///
/// Ids start at 1 and are never reused, mirroring a database sequence.
#[derive(Debug)]
pub struct InMemoryProductStore {
    inner: RwLock<Rows>,
}

impl InMemoryProductStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Rows {
                next_id: 1,
                products: BTreeMap::new(),
            }),
        }
    }
}

impl Default for InMemoryProductStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned() -> StoreError {
    StoreError::Backend("product store lock poisoned".to_string())
}

fn ensure_code_free(rows: &Rows, code: &str, owner: Option<ProductId>) -> Result<(), StoreError> {
    let taken = rows
        .products
        .values()
        .any(|p| p.code() == code && Some(p.id()) != owner);
    if taken {
        Err(StoreError::UniqueViolation(format!("product code {code} already exists")))
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl ProductStore for InMemoryProductStore {
    async fn find_all(&self) -> Result<Vec<Product>, StoreError> {
        let rows = self.inner.read().map_err(|_| poisoned())?;
        Ok(rows.products.values().cloned().collect())
    }

    async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let rows = self.inner.read().map_err(|_| poisoned())?;
        Ok(rows.products.get(&id).cloned())
    }

    async fn insert(&self, product: NewProduct) -> Result<Product, StoreError> {
        let mut rows = self.inner.write().map_err(|_| poisoned())?;
        ensure_code_free(&rows, &product.fields.code, None)?;

        let id = ProductId::new(rows.next_id).map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.next_id = rows
            .next_id
            .checked_add(1)
            .ok_or_else(|| StoreError::Backend("product id sequence exhausted".to_string()))?;

        let stored = Product::from_new(id, product);
        rows.products.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update(&self, product: Product) -> Result<Product, StoreError> {
        let mut rows = self.inner.write().map_err(|_| poisoned())?;
        let id = product.id();
        if !rows.products.contains_key(&id) {
            return Err(StoreError::NotFound(id));
        }
        ensure_code_free(&rows, product.code(), Some(id))?;
        rows.products.insert(id, product.clone());
        Ok(product)
    }

    async fn delete(&self, id: ProductId) -> Result<(), StoreError> {
        let mut rows = self.inner.write().map_err(|_| poisoned())?;
        rows.products
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
