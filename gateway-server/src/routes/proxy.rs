//! The chat-completion surface (§6): `/api/v1/proxy` and the Ollama
//! convenience endpoint `/api/v1/ollama/chat`. Both run the full Interceptor
//! pipeline — provider detection, the Aggregator, the Upstream Forwarder,
//! and the Content Masker.

use axum::body::Body;
use axum::extract::{ConnectInfo, Extension, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use bridge::{InterceptOutcome, Priority, ProviderTag};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;

use crate::auth::ApiKeyRecord;
use crate::state::AppState;

/// Rejects `model` against the authenticated key's allow-list (§4.11). Runs
/// here, not in the C11 middleware, because the model only becomes known
/// once the request body is parsed.
fn model_not_allowed(key: &ApiKeyRecord, model: Option<&str>) -> Option<Response> {
    let model = model?;
    if key.allows_model(model) {
        return None;
    }
    Some(
        (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": {
                    "type": "model_not_allowed",
                    "message": format!("API key '{}' is not permitted to use model '{model}'", key.name),
                    "code": 403,
                }
            })),
        )
            .into_response(),
    )
}

fn parse_priority(headers: &HeaderMap) -> Priority {
    match headers.get("x-priority").and_then(|v| v.to_str().ok()) {
        Some(value) if value.eq_ignore_ascii_case("high") => Priority::High,
        Some(value) if value.eq_ignore_ascii_case("low") => Priority::Low,
        _ => Priority::Normal,
    }
}

fn apply_headers(response: &mut Response, headers: &HashMap<String, String>) {
    for (key, value) in headers {
        let (Ok(name), Ok(val)) = (HeaderName::from_bytes(key.as_bytes()), HeaderValue::from_str(value)) else {
            continue;
        };
        response.headers_mut().insert(name, val);
    }
}

async fn run_intercept(state: &AppState, headers: &HeaderMap, client_address: SocketAddr, body: Value, target_url: &str) -> Response {
    let priority = parse_priority(headers);
    let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let correlation_header = headers.get("x-conversation-id").and_then(|v| v.to_str().ok());

    let mut upstream_headers = HashMap::new();
    if let Some(auth) = auth_header {
        upstream_headers.insert("authorization".to_string(), auth.to_string());
    }
    upstream_headers.insert("content-type".to_string(), "application/json".to_string());

    let outcome = state
        .interceptor
        .intercept(
            body,
            target_url,
            upstream_headers,
            auth_header,
            correlation_header,
            &client_address.to_string(),
            priority,
        )
        .await;

    match outcome {
        InterceptOutcome::Json { status, body, headers: resp_headers } => {
            let mut response =
                (StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR), Json(body)).into_response();
            apply_headers(&mut response, &resp_headers);
            response
        }
        InterceptOutcome::Streaming { status, stream, headers: resp_headers } => {
            let byte_stream = stream.into_byte_stream();
            let body = Body::from_stream(byte_stream);
            let mut response = Response::builder()
                .status(StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY))
                .body(body)
                .expect("status and body are always a valid response");
            apply_headers(&mut response, &resp_headers);
            response
        }
    }
}

/// `POST /api/v1/proxy` — forwards to whichever provider the body/headers
/// imply. `X-Priority: high|normal|low` selects the queue lane (§6).
pub async fn proxy(
    State(state): State<AppState>,
    ConnectInfo(client_address): ConnectInfo<SocketAddr>,
    key: Option<Extension<ApiKeyRecord>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let model_hint = body.get("model").and_then(|v| v.as_str());
    if let Some(Extension(key)) = &key {
        if let Some(rejection) = model_not_allowed(key, model_hint) {
            return rejection;
        }
    }
    let auth_header = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    let provider = bridge::protocol::detect_provider("", auth_header, model_hint);
    let target_url = state.target_url(provider);
    run_intercept(&state, &headers, client_address, body, &target_url).await
}

/// `POST /api/v1/ollama/chat` — convenience endpoint that always targets
/// the configured Ollama backend (§6).
pub async fn chat(
    State(state): State<AppState>,
    ConnectInfo(client_address): ConnectInfo<SocketAddr>,
    key: Option<Extension<ApiKeyRecord>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let model_hint = body.get("model").and_then(|v| v.as_str());
    if let Some(Extension(key)) = &key {
        if let Some(rejection) = model_not_allowed(key, model_hint) {
            return rejection;
        }
    }
    let target_url = state.target_url(ProviderTag::Ollama);
    run_intercept(&state, &headers, client_address, body, &target_url).await
}
