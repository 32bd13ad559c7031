//! Route handlers for the OpenAI-compatible surface (spec.md §6).

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use fleetgate_dispatch::DispatchOutcome;

use crate::error::ApiError;
use crate::state::AppState;

/// `Authorization: Bearer <key>` or `X-API-Key: <key>` (spec.md §6).
fn extract_credential(headers: &HeaderMap) -> Result<String, ApiError> {
    if let Some(value) = headers.get(axum::http::header::AUTHORIZATION) {
        if let Ok(s) = value.to_str() {
            if let Some(token) = s.strip_prefix("Bearer ") {
                return Ok(token.to_string());
            }
        }
    }
    if let Some(value) = headers.get("X-API-Key") {
        if let Ok(s) = value.to_str() {
            return Ok(s.to_string());
        }
    }
    Err(ApiError(fleetgate_dispatch::GatewayError::Authentication(
        "missing Authorization bearer token or X-API-Key header".to_string(),
    )))
}

/// Shared by every dispatch-backed route: resolves the credential, runs the
/// pipeline, and turns the outcome into an HTTP response.
async fn dispatch(state: AppState, headers: HeaderMap, body: bytes::Bytes) -> Result<Response, ApiError> {
    let credential = extract_credential(&headers)?;
    let outcome = state.pipeline.handle(&credential, &body).await?;
    Ok(outcome_to_response(outcome))
}

fn outcome_to_response(outcome: DispatchOutcome) -> Response {
    match outcome {
        DispatchOutcome::Unary {
            request_id,
            status,
            headers,
            body,
            cache_hit,
            model,
            upstream_latency_ms,
        } => {
            let mut response = Response::builder()
                .status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK))
                .body(Body::from(body))
                .expect("well-formed response");
            let out_headers = response.headers_mut();
            for (name, value) in headers {
                if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::from_str(&value)) {
                    out_headers.insert(name, value);
                }
            }
            set_common_headers(out_headers, &request_id, &model, upstream_latency_ms);
            out_headers.insert(
                HeaderName::from_static("x-cache"),
                HeaderValue::from_static(if cache_hit { "HIT" } else { "MISS" }),
            );
            response
        }
        DispatchOutcome::Streaming {
            request_id,
            status,
            stream,
            model,
        } => {
            let mut response = Response::builder()
                .status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK))
                .header(axum::http::header::CONTENT_TYPE, "text/event-stream")
                .header(axum::http::header::CACHE_CONTROL, "no-cache")
                .body(Body::from_stream(stream))
                .expect("well-formed response");
            set_common_headers(response.headers_mut(), &request_id, &model, None);
            response
        }
    }
}

fn set_common_headers(headers: &mut HeaderMap, request_id: &str, model: &str, upstream_latency_ms: Option<u64>) {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        headers.insert(HeaderName::from_static("x-request-id"), value);
    }
    if let Ok(value) = HeaderValue::from_str(model) {
        headers.insert(HeaderName::from_static("x-upstream-model"), value);
    }
    if let Some(ms) = upstream_latency_ms {
        if let Ok(value) = HeaderValue::from_str(&ms.to_string()) {
            headers.insert(HeaderName::from_static("x-upstream-latency-ms"), value);
        }
    }
}

pub async fn chat_completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ApiError> {
    dispatch(state, headers, body).await
}

/// Legacy text completions: the core only cares about admission, routing,
/// and settlement, not the request shape, so it is dispatched through the
/// same pipeline as chat completions (spec.md §6: both are OpenAI-compatible
/// JSON bodies carrying a `model` field).
pub async fn completions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ApiError> {
    dispatch(state, headers, body).await
}

/// Embeddings are always unary; `ChatRequest::stream` defaults to `false`
/// and an embeddings body carries no `messages`, so it flows through
/// [`fleetgate_dispatch::DispatchPipeline`] unchanged.
pub async fn embeddings(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, ApiError> {
    dispatch(state, headers, body).await
}

/// `GET /v1/models` — the aggregated list of configured logical model names
/// (spec.md §6), deduplicated across instances sharing a name.
pub async fn list_models(State(state): State<AppState>) -> impl IntoResponse {
    let instances = state.pipeline.context().registry.list_all();
    let mut names: Vec<String> = instances.into_iter().map(|i| i.logical_model).collect();
    names.sort();
    names.dedup();

    Json(serde_json::json!({
        "object": "list",
        "data": names
            .into_iter()
            .map(|id| serde_json::json!({"id": id, "object": "model"}))
            .collect::<Vec<_>>(),
    }))
}

/// `GET /health` — liveness: 200 if the process is up, unconditionally.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// `GET /ready` — readiness: 200 only if the registry has at least one
/// enabled instance to dispatch to. The shared store and upstream
/// reachability are not checked synchronously here: both degrade
/// gracefully per spec.md §7 and a slow store should not flap readiness.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.pipeline.context().registry.stats();
    if stats.enabled_instances > 0 {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
