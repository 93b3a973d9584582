use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use catalog_core::ProductId;
use catalog_infra::ServiceError;
use catalog_products::PatchError;

pub const INVALID_JSON: &str = "JSON processing error";
pub const CODE_CONFLICT: &str = "Product code already exists";
pub const RATE_UNAVAILABLE: &str = "Exchange rate service unavailable";
pub const STORE_FAILURE: &str = "Database error";
pub const UNSUPPORTED_MEDIA_TYPE: &str = "Content type must be application/json-patch+json";

pub fn not_found_message(id: ProductId) -> String {
    format!("Product with id {id} does not exist")
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Validation(errors) => json_errors(StatusCode::BAD_REQUEST, errors.messages()),
        ServiceError::NotFound(id) => json_error(StatusCode::NOT_FOUND, not_found_message(id)),
        ServiceError::Patch(PatchError::InvalidValue(detail)) => {
            tracing::debug!(error = %detail, "patched document is not a product");
            json_error(StatusCode::UNPROCESSABLE_ENTITY, INVALID_JSON)
        }
        ServiceError::Patch(e) => json_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()),
        ServiceError::UniquenessConflict(_) => json_error(StatusCode::CONFLICT, CODE_CONFLICT),
        ServiceError::Conversion(e) => {
            tracing::warn!(error = %e, "price conversion failed");
            json_error(StatusCode::BAD_GATEWAY, RATE_UNAVAILABLE)
        }
        ServiceError::Store(msg) => {
            tracing::error!(error = %msg, "product store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, STORE_FAILURE)
        }
    }
}

pub fn json_error(status: StatusCode, message: impl Into<String>) -> axum::response::Response {
    json_errors(status, [message.into()])
}

/// `{"errors": [...]}` with the given status.
pub fn json_errors<I, M>(status: StatusCode, messages: I) -> axum::response::Response
where
    I: IntoIterator<Item = M>,
    M: Into<String>,
{
    let messages: Vec<String> = messages.into_iter().map(Into::into).collect();
    (status, axum::Json(json!({ "errors": messages }))).into_response()
}
