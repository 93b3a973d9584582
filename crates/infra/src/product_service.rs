//! Product orchestration: validation, price derivation and persistence.
//!
//! Every write follows the same shape: build the candidate, validate it, look
//! up a rate when the source price changed, then commit through the store.
//! Nothing is written when an earlier step fails.

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{debug, info, instrument};

use catalog_core::{Entity, ProductId};
use catalog_products::{
    NewProduct, Patch, PatchError, PriceUpdate, Product, ProductDraft, ProductFields, ValidationErrors, Validator,
};

use crate::pricing::{ConversionError, CurrencyPair, PriceConverter};
use crate::rates::RateClient;
use crate::store::{ProductStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Product with id {0} does not exist")]
    NotFound(ProductId),

    #[error(transparent)]
    Patch(#[from] PatchError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error("product code conflict: {0}")]
    UniquenessConflict(String),

    #[error("store failure: {0}")]
    Store(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UniqueViolation(msg) => ServiceError::UniquenessConflict(msg),
            StoreError::NotFound(id) => ServiceError::NotFound(id),
            StoreError::Backend(msg) => ServiceError::Store(msg),
        }
    }
}

pub struct ProductService<S, R, V> {
    store: S,
    converter: PriceConverter<R>,
    validator: V,
    pair: CurrencyPair,
}

impl<S, R, V> ProductService<S, R, V>
where
    S: ProductStore,
    R: RateClient,
    V: Validator,
{
    pub fn new(store: S, converter: PriceConverter<R>, validator: V, pair: CurrencyPair) -> Self {
        Self { store, converter, validator, pair }
    }

    #[instrument(skip(self, draft), fields(code = draft.code.as_deref().unwrap_or_default()), err)]
    pub async fn create(&self, draft: ProductDraft) -> Result<Product, ServiceError> {
        let fields = self.validated(draft)?;
        let price_target = self.convert(fields.price_source).await?;

        let product = self.store.insert(NewProduct::new(fields, price_target)).await?;
        info!(product_id = %product.id(), "product created");
        Ok(product)
    }

    pub async fn find_all(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self.store.find_all().await?)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn find(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.load(id).await
    }

    /// Overwrite every editable field; the target price is always recomputed.
    #[instrument(skip(self, draft), fields(product_id = %id), err)]
    pub async fn replace(&self, id: ProductId, draft: ProductDraft) -> Result<Product, ServiceError> {
        let fields = self.validated(draft)?;
        let mut product = self.load(id).await?;

        let price_target = self.convert(fields.price_source).await?;
        product.apply_edit(fields, PriceUpdate::Repriced { price_target });

        let product = self.store.update(product).await?;
        info!("product replaced");
        Ok(product)
    }

    /// Apply a JSON patch to the stored product.
    ///
    /// The target price is recomputed only when the patched source price
    /// differs (by decimal value) from the one in the pre-patch snapshot.
    #[instrument(skip(self, patch), fields(product_id = %id, ops = patch.operations().len()), err)]
    pub async fn patch(&self, id: ProductId, patch: &Patch) -> Result<Product, ServiceError> {
        let mut product = self.load(id).await?;
        let snapshot = product.draft();

        let patched = snapshot.apply_patch(patch)?;
        self.validator.validate(&patched).into_result()?;
        let price_changed = patched.price_source != snapshot.price_source;
        let fields = ProductFields::try_from(patched)?;

        let price = if price_changed {
            let price_target = self.convert(fields.price_source).await?;
            PriceUpdate::Repriced { price_target }
        } else {
            debug!("source price unchanged, keeping target price");
            PriceUpdate::Unchanged
        };
        product.apply_edit(fields, price);

        let product = self.store.update(product).await?;
        info!(repriced = price_changed, "product patched");
        Ok(product)
    }

    #[instrument(skip(self), fields(product_id = %id), err)]
    pub async fn delete(&self, id: ProductId) -> Result<(), ServiceError> {
        self.load(id).await?;
        self.store.delete(id).await?;
        info!("product deleted");
        Ok(())
    }

    async fn load(&self, id: ProductId) -> Result<Product, ServiceError> {
        self.store.find_by_id(id).await?.ok_or(ServiceError::NotFound(id))
    }

    fn validated(&self, draft: ProductDraft) -> Result<ProductFields, ServiceError> {
        self.validator.validate(&draft).into_result()?;
        Ok(ProductFields::try_from(draft)?)
    }

    async fn convert(&self, amount: Decimal) -> Result<Decimal, ServiceError> {
        Ok(self
            .converter
            .convert(amount, &self.pair.source, &self.pair.target)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rates::{ExchangeRate, RateClientError};
    use crate::store::InMemoryProductStore;
    use catalog_core::CurrencyCode;
    use catalog_products::validation::{CODE_INVALID, NAME_TOO_LONG, PRICE_NOT_POSITIVE};
    use catalog_products::{PatchOperation, ProductRules};
    use serde_json::json;
    use std::str::FromStr;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingRates {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl RateClient for CountingRates {
        async fn fetch_rates(
            &self,
            source: &CurrencyCode,
            target: &CurrencyCode,
        ) -> Result<Vec<ExchangeRate>, RateClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RateClientError::Transport("connection refused".to_string()));
            }
            Ok(vec![ExchangeRate {
                source: source.clone(),
                target: target.clone(),
                country: None,
                currency_number: None,
                medium_rate: "7,534500".to_string(),
                buying_rate: None,
                selling_rate: None,
                unit: 1,
                list_number: Some("141".to_string()),
                applied_on: None,
            }])
        }
    }

    /// Counts writes that reach the inner store.
    #[derive(Default)]
    struct CountingStore {
        inner: InMemoryProductStore,
        writes: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl ProductStore for CountingStore {
        async fn find_all(&self) -> Result<Vec<Product>, StoreError> {
            self.inner.find_all().await
        }

        async fn find_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
            self.inner.find_by_id(id).await
        }

        async fn insert(&self, product: NewProduct) -> Result<Product, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.insert(product).await
        }

        async fn update(&self, product: Product) -> Result<Product, StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.update(product).await
        }

        async fn delete(&self, id: ProductId) -> Result<(), StoreError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            self.inner.delete(id).await
        }
    }

    type TestService = ProductService<Arc<CountingStore>, Arc<CountingRates>, ProductRules>;

    fn service_with(rates: CountingRates) -> (TestService, Arc<CountingStore>, Arc<CountingRates>) {
        let store = Arc::new(CountingStore::default());
        let rates = Arc::new(rates);
        let pair = CurrencyPair::new(CurrencyCode::new("HRK").unwrap(), CurrencyCode::new("EUR").unwrap());
        let service = ProductService::new(store.clone(), PriceConverter::new(rates.clone()), ProductRules, pair);
        (service, store, rates)
    }

    fn service() -> (TestService, Arc<CountingStore>, Arc<CountingRates>) {
        service_with(CountingRates::default())
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn draft(code: &str) -> ProductDraft {
        ProductDraft {
            code: Some(code.to_string()),
            name: Some("Kettle".to_string()),
            price_source: Some(dec("1000.00")),
            description: Some("Stainless steel".to_string()),
            is_available: Some(true),
        }
    }

    fn patch(ops: serde_json::Value) -> Patch {
        serde_json::from_value(ops).unwrap()
    }

    #[tokio::test]
    async fn create_converts_and_stores() {
        let (service, store, rates) = service();
        let product = service.create(draft("ABCDE12345")).await.unwrap();

        assert_eq!(product.id().get(), 1);
        assert_eq!(product.price_source().to_string(), "1000.00");
        assert_eq!(product.price_target().to_string(), "132.72");
        assert_eq!(rates.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(service.find(product.id()).await.unwrap(), product);
    }

    #[tokio::test]
    async fn invalid_create_touches_neither_rates_nor_store() {
        let (service, store, rates) = service();
        let err = service.create(draft("abcde12345")).await.unwrap_err();

        match err {
            ServiceError::Validation(errors) => assert_eq!(errors.messages(), vec![CODE_INVALID]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(rates.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreachable_rates_abort_create() {
        let (service, store, _) = service_with(CountingRates { fail: true, ..Default::default() });
        let err = service.create(draft("ABCDE12345")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conversion(ConversionError::UpstreamUnreachable(_))));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_code_is_a_conflict() {
        let (service, _, _) = service();
        service.create(draft("ABCDE12345")).await.unwrap();
        let err = service.create(draft("ABCDE12345")).await.unwrap_err();
        assert!(matches!(err, ServiceError::UniquenessConflict(_)));
    }

    #[tokio::test]
    async fn missing_ids_are_not_found_without_mutation() {
        let (service, store, _) = service();
        let id = ProductId::new(42).unwrap();
        assert_eq!(service.find(id).await.unwrap_err(), ServiceError::NotFound(id));
        assert_eq!(service.delete(id).await.unwrap_err(), ServiceError::NotFound(id));
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn replace_validates_before_lookup_and_always_reprices() {
        let (service, _, rates) = service();
        let missing = ProductId::new(9).unwrap();
        let bad = ProductDraft { price_source: Some(Decimal::ZERO), ..draft("ABCDE12345") };
        assert!(matches!(service.replace(missing, bad).await, Err(ServiceError::Validation(_))));
        assert_eq!(
            service.replace(missing, draft("ABCDE12345")).await.unwrap_err(),
            ServiceError::NotFound(missing)
        );

        let created = service.create(draft("ABCDE12345")).await.unwrap();
        let before = rates.calls.load(Ordering::SeqCst);
        let replaced = service
            .replace(created.id(), ProductDraft { description: None, ..draft("ZZZZZ99999") })
            .await
            .unwrap();
        assert_eq!(rates.calls.load(Ordering::SeqCst), before + 1);
        assert_eq!(replaced.code(), "ZZZZZ99999");
        assert_eq!(replaced.description(), None);
        assert_eq!(replaced.price_target().to_string(), "132.72");
    }

    #[tokio::test]
    async fn description_patch_keeps_price_without_rate_lookup() {
        let (service, _, rates) = service();
        let created = service.create(draft("ABCDE12345")).await.unwrap();
        let calls = rates.calls.load(Ordering::SeqCst);

        let patched = service
            .patch(created.id(), &patch(json!([{"op": "replace", "path": "/description", "value": "Copper"}])))
            .await
            .unwrap();

        assert_eq!(patched.description(), Some("Copper"));
        assert_eq!(patched.price_target(), created.price_target());
        assert_eq!(rates.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn equal_price_patch_does_not_reprice() {
        let (service, _, rates) = service();
        let created = service.create(draft("ABCDE12345")).await.unwrap();
        let calls = rates.calls.load(Ordering::SeqCst);

        service
            .patch(created.id(), &patch(json!([{"op": "replace", "path": "/price_source", "value": 1000}])))
            .await
            .unwrap();
        assert_eq!(rates.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn price_patch_reprices() {
        let (service, _, rates) = service();
        let created = service.create(draft("ABCDE12345")).await.unwrap();
        let calls = rates.calls.load(Ordering::SeqCst);

        let patched = service
            .patch(created.id(), &patch(json!([{"op": "replace", "path": "/price_source", "value": 2000}])))
            .await
            .unwrap();
        assert_eq!(rates.calls.load(Ordering::SeqCst), calls + 1);
        assert_eq!(patched.price_source().to_string(), "2000.00");
        assert_eq!(patched.price_target().to_string(), "265.45");
    }

    #[tokio::test]
    async fn invalid_patch_results_are_rejected_with_all_messages() {
        let (service, store, _) = service();
        let created = service.create(draft("ABCDE12345")).await.unwrap();
        let writes = store.writes.load(Ordering::SeqCst);

        let err = service
            .patch(
                created.id(),
                &patch(json!([
                    {"op": "replace", "path": "/name", "value": "n".repeat(33)},
                    {"op": "replace", "path": "/price_source", "value": -5}
                ])),
            )
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.messages(), vec![NAME_TOO_LONG, PRICE_NOT_POSITIVE])
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(store.writes.load(Ordering::SeqCst), writes);
        assert_eq!(service.find(created.id()).await.unwrap(), created);
    }

    #[tokio::test]
    async fn failing_patch_operations_surface_as_patch_errors() {
        let (service, _, _) = service();
        let created = service.create(draft("ABCDE12345")).await.unwrap();

        let failed_test = Patch::new(vec![PatchOperation::Test {
            path: "/name".to_string(),
            value: json!("Toaster"),
        }]);
        assert!(matches!(
            service.patch(created.id(), &failed_test).await,
            Err(ServiceError::Patch(PatchError::TestFailed { .. }))
        ));

        let missing = Patch::new(vec![PatchOperation::Remove { path: "/nope".to_string() }]);
        assert!(matches!(service.patch(created.id(), &missing).await, Err(ServiceError::Patch(_))));
    }

    #[tokio::test]
    async fn delete_removes_the_product() {
        let (service, _, _) = service();
        let created = service.create(draft("ABCDE12345")).await.unwrap();
        service.delete(created.id()).await.unwrap();
        assert!(service.find_all().await.unwrap().is_empty());
        assert_eq!(service.find(created.id()).await.unwrap_err(), ServiceError::NotFound(created.id()));
    }
}
