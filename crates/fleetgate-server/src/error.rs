//! Maps [`GatewayError`] onto the OpenAI-compatible error body and status
//! codes the client wire protocol specifies (spec.md §6/§7).

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use fleetgate_dispatch::GatewayError;

/// Newtype so this crate can provide the `IntoResponse` impl the orphan
/// rule otherwise forbids for a foreign error type.
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = &self.0;
        let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(serde_json::json!({
            "error": {
                "message": err.to_string(),
                "type": err.error_type(),
                "code": err.error_type(),
            }
        }));

        let mut response = (status, body).into_response();
        if let Some(secs) = err.retry_after_secs() {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(HeaderName::from_static("retry-after"), value);
            }
        }
        response
    }
}
