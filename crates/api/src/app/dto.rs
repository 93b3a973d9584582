use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::json;

use catalog_core::Entity;
use catalog_products::{Product, ProductDraft};

/// Body of `POST /api/products` and `PUT /api/products/:id`.
///
/// Unknown members (e.g. a client echoing `id` or `price_target`) are ignored.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price_source: Option<Decimal>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_available: Option<bool>,
}

impl From<ProductRequest> for ProductDraft {
    fn from(req: ProductRequest) -> Self {
        ProductDraft {
            code: req.code,
            name: req.name,
            price_source: req.price_source,
            description: req.description,
            is_available: req.is_available,
        }
    }
}

pub fn product_to_json(product: &Product) -> serde_json::Value {
    json!({
        "id": product.id().get(),
        "code": product.code(),
        "name": product.name(),
        "price_source": product.price_source().to_f64(),
        "price_target": product.price_target().to_f64(),
        "description": product.description(),
        "is_available": product.is_available(),
    })
}
