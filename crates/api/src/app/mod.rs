//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: infrastructure wiring (record store, rate client, product service)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request DTOs and JSON mapping helpers
//! - `errors.rs`: consistent `{"errors": [...]}` responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub async fn build_app(config: &ApiConfig) -> anyhow::Result<Router> {
    let services = services::build_services(config).await?;
    Ok(router(Arc::new(services)))
}

/// Router over already-built services.
pub fn router(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::trace_requests))
                .layer(Extension(services)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use catalog_core::CurrencyCode;
    use catalog_infra::{ExchangeRate, InMemoryProductStore, RateClient, RateClientError};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct FixedRate(&'static str);

    #[async_trait::async_trait]
    impl RateClient for FixedRate {
        async fn fetch_rates(
            &self,
            source: &CurrencyCode,
            target: &CurrencyCode,
        ) -> Result<Vec<ExchangeRate>, RateClientError> {
            Ok(vec![ExchangeRate {
                source: source.clone(),
                target: target.clone(),
                country: None,
                currency_number: None,
                medium_rate: self.0.to_string(),
                buying_rate: None,
                selling_rate: None,
                unit: 1,
                list_number: None,
                applied_on: None,
            }])
        }
    }

    struct DownRates;

    #[async_trait::async_trait]
    impl RateClient for DownRates {
        async fn fetch_rates(
            &self,
            _source: &CurrencyCode,
            _target: &CurrencyCode,
        ) -> Result<Vec<ExchangeRate>, RateClientError> {
            Err(RateClientError::Status(503))
        }
    }

    fn app_with(rates: Arc<dyn RateClient>) -> Router {
        let config = ApiConfig::in_memory("http://unused.invalid").unwrap();
        let services = services::AppServices::new(Arc::new(InMemoryProductStore::new()), rates, &config);
        router(Arc::new(services))
    }

    fn app() -> Router {
        app_with(Arc::new(FixedRate("7,534500")))
    }

    async fn send(app: &Router, method: Method, uri: &str, content_type: &str, body: Option<Value>) -> (StatusCode, Value) {
        let body = body.map(|v| Body::from(v.to_string())).unwrap_or_else(Body::empty);
        let req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type)
            .body(body)
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    fn kettle() -> Value {
        json!({
            "code": "ABCDE12345",
            "name": "Kettle",
            "price_source": 1000.00,
            "description": "Stainless steel",
            "is_available": true
        })
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, _) = send(&app(), Method::GET, "/health", "application/json", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn create_then_read() {
        let app = app();
        let (status, created) = send(&app, Method::POST, "/api/products", "application/json", Some(kettle())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], json!(1));
        assert_eq!(created["price_target"], json!(132.72));

        let (status, fetched) = send(&app, Method::GET, "/api/products/1", "application/json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, list) = send(&app, Method::GET, "/api/products", "application/json", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, json!([created]));
    }

    #[tokio::test]
    async fn validation_errors_are_listed() {
        let mut body = kettle();
        body["code"] = json!("bad");
        body["price_source"] = json!(0);
        let (status, res) = send(&app(), Method::POST, "/api/products", "application/json", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            res,
            json!({"errors": ["The product code is invalid", "The product price must be positive"]})
        );
    }

    #[tokio::test]
    async fn malformed_bodies_and_ids_are_bad_requests() {
        let app = app();
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/products")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        for uri in ["/api/products/0", "/api/products/-3", "/api/products/abc"] {
            let (status, res) = send(&app, Method::GET, uri, "application/json", None).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
            assert_eq!(res, json!({"errors": ["Id must be positive integer"]}));
        }
    }

    #[tokio::test]
    async fn missing_products_are_not_found() {
        let (status, res) = send(&app(), Method::DELETE, "/api/products/7", "application/json", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(res, json!({"errors": ["Product with id 7 does not exist"]}));
    }

    #[tokio::test]
    async fn patch_uses_json_patch_media_type() {
        let app = app();
        send(&app, Method::POST, "/api/products", "application/json", Some(kettle())).await;

        let ops = json!([{"op": "replace", "path": "/description", "value": "Copper"}]);
        let (status, res) =
            send(&app, Method::PATCH, "/api/products/1", "application/json-patch+json", Some(ops)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["description"], json!("Copper"));
        assert_eq!(res["price_target"], json!(132.72));

        let ops = json!([{"op": "test", "path": "/name", "value": "Toaster"}]);
        let (status, res) =
            send(&app, Method::PATCH, "/api/products/1", "application/json-patch+json", Some(ops)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res["errors"].as_array().unwrap().len(), 1);

        let ops = json!([{"op": "frobnicate", "path": "/name"}]);
        let (status, res) =
            send(&app, Method::PATCH, "/api/products/1", "application/json-patch+json", Some(ops)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(res, json!({"errors": ["JSON processing error"]}));
    }

    #[tokio::test]
    async fn patch_rejects_other_media_types() {
        let app = app();
        send(&app, Method::POST, "/api/products", "application/json", Some(kettle())).await;

        let ops = json!([{"op": "replace", "path": "/description", "value": "Copper"}]);
        for content_type in ["application/json", "application/merge-patch+json", "text/plain"] {
            let (status, res) = send(&app, Method::PATCH, "/api/products/1", content_type, Some(ops.clone())).await;
            assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE, "{content_type}");
            assert_eq!(res, json!({"errors": ["Content type must be application/json-patch+json"]}));
        }

        let (status, res) = send(
            &app,
            Method::PATCH,
            "/api/products/1",
            "application/json-patch+json; charset=utf-8",
            Some(ops),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(res["description"], json!("Copper"));
    }

    #[tokio::test]
    async fn patched_values_of_the_wrong_type_get_a_fixed_message() {
        let app = app();
        send(&app, Method::POST, "/api/products", "application/json", Some(kettle())).await;

        let ops = json!([{"op": "replace", "path": "/is_available", "value": "yes"}]);
        let (status, res) =
            send(&app, Method::PATCH, "/api/products/1", "application/json-patch+json", Some(ops)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(res, json!({"errors": ["JSON processing error"]}));

        let (_, fetched) = send(&app, Method::GET, "/api/products/1", "application/json", None).await;
        assert_eq!(fetched["is_available"], json!(true));
    }

    #[tokio::test]
    async fn duplicate_code_conflicts() {
        let app = app();
        send(&app, Method::POST, "/api/products", "application/json", Some(kettle())).await;
        let (status, res) = send(&app, Method::POST, "/api/products", "application/json", Some(kettle())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(res, json!({"errors": ["Product code already exists"]}));
    }

    #[tokio::test]
    async fn rate_outage_is_bad_gateway() {
        let app = app_with(Arc::new(DownRates));
        let (status, res) = send(&app, Method::POST, "/api/products", "application/json", Some(kettle())).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(res, json!({"errors": ["Exchange rate service unavailable"]}));

        let (_, list) = send(&app, Method::GET, "/api/products", "application/json", None).await;
        assert_eq!(list, json!([]));
    }
}
