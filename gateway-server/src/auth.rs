//! Auth + Rate-Limit Middleware (C11): per-key authentication, a
//! fixed-window per-key-per-minute rate limiter, and the public-path
//! bypass list (§6).

use crate::state::AppState;
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::RwLock;

/// One configured API key's record (§6 `{name, permissions[],
/// rateLimitPerMinute, allowedModels[]}`). A `"*"` entry in `permissions`
/// or `allowed_models` grants all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyRecord {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub rate_limit_per_minute: u32,
    #[serde(default)]
    pub allowed_models: Vec<String>,
}

impl ApiKeyRecord {
    pub fn allows_model(&self, model: &str) -> bool {
        self.allowed_models.is_empty()
            || self.allowed_models.iter().any(|m| m == "*" || m == model)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == "*" || p == permission)
    }
}

/// Loaded once at startup from `api_keys.json`: a map of API key string to
/// its record. CRUD over keys is an operator file edit plus a restart, not
/// an HTTP surface spec.md names.
pub struct ApiKeyStore {
    keys: HashMap<String, ApiKeyRecord>,
}

impl ApiKeyStore {
    /// Loads `path` if present; an absent file means no keys are
    /// configured, which is valid (every authenticated call then fails
    /// closed with 401, surfaced as a config warning — see
    /// `Config::validate`).
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let keys = if path.exists() {
            let raw = fs::read(path)?;
            serde_json::from_slice(&raw).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "failed to parse api_keys.json, starting with no keys");
                HashMap::new()
            })
        } else {
            HashMap::new()
        };
        Ok(ApiKeyStore { keys })
    }

    pub fn get(&self, key: &str) -> Option<&ApiKeyRecord> {
        self.keys.get(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One fixed window's call count for one key.
struct Window {
    minute: i64,
    count: u32,
}

/// Fixed-window (not sliding) per-key-per-minute limiter: simplest
/// implementation that matches the documented `X-RateLimit-*` contract,
/// at the cost of allowing up to `2x limit` calls across a window boundary.
pub struct RateLimiter {
    windows: RwLock<HashMap<String, Window>>,
}

pub struct RateLimitOutcome {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_epoch_secs: i64,
    pub used: u32,
}

impl RateLimiter {
    pub fn new() -> Self {
        RateLimiter {
            windows: RwLock::new(HashMap::new()),
        }
    }

    pub fn check(&self, key: &str, limit: u32, now_millis: i64) -> RateLimitOutcome {
        let minute = now_millis / 60_000;
        let mut windows = self.windows.write().expect("rate limiter lock poisoned");
        let window = windows.entry(key.to_string()).or_insert(Window { minute, count: 0 });
        if window.minute != minute {
            window.minute = minute;
            window.count = 0;
        }

        let reset_epoch_secs = (minute + 1) * 60;
        if window.count >= limit {
            return RateLimitOutcome {
                allowed: false,
                limit,
                remaining: 0,
                reset_epoch_secs,
                used: window.count,
            };
        }

        window.count += 1;
        RateLimitOutcome {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(window.count),
            reset_epoch_secs,
            used: window.count,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

const PUBLIC_PATHS: &[&str] = &["/docs", "/api/v1/health", "/api/v1/health/status", "/favicon.ico"];

fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || path.starts_with("/static/")
}

/// Key extraction order (§6): `X-API-Key` header, then `Authorization:
/// Bearer`, then `?api_key=` query param, then the `api_key` cookie.
fn extract_api_key(req: &Request<Body>) -> Option<String> {
    if let Some(value) = req.headers().get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(value.to_string());
    }
    if let Some(value) = req.headers().get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        if let Some(token) = value.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }
    if let Some(query) = req.uri().query() {
        for pair in query.split('&') {
            if let Some(value) = pair.strip_prefix("api_key=") {
                return Some(value.to_string());
            }
        }
    }
    if let Some(cookie_header) = req.headers().get(axum::http::header::COOKIE).and_then(|v| v.to_str().ok()) {
        for cookie in cookie_header.split(';') {
            let cookie = cookie.trim();
            if let Some(value) = cookie.strip_prefix("api_key=") {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn error_response(status: StatusCode, kind: &str, message: &str) -> Response {
    (
        status,
        Json(json!({
            "error": {
                "type": kind,
                "message": message,
                "code": status.as_u16(),
            }
        })),
    )
        .into_response()
}

fn rate_limited_response(outcome: &RateLimitOutcome) -> Response {
    let mut response = error_response(
        StatusCode::TOO_MANY_REQUESTS,
        "rate_limited",
        "rate limit exceeded for this API key",
    );
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", outcome.limit.into());
    headers.insert("X-RateLimit-Remaining", outcome.remaining.into());
    headers.insert("X-RateLimit-Reset", outcome.reset_epoch_secs.into());
    headers.insert("X-RateLimit-Used", outcome.used.into());
    let retry_after = (outcome.reset_epoch_secs - bridge::types::now_millis() / 1000).max(0);
    headers.insert("Retry-After", retry_after.into());
    response
}

/// The C11 middleware: bypasses public paths, otherwise authenticates by
/// API key and, if enabled, enforces the key's per-minute rate limit.
/// Allowed-model enforcement happens in the route handlers instead, since
/// the request body hasn't been parsed yet at this layer.
pub async fn auth_and_rate_limit(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let path = req.uri().path().to_string();
    if is_public_path(&path) {
        return next.run(req).await;
    }

    if !state.config.security.enable_api_auth {
        return next.run(req).await;
    }

    let Some(key) = extract_api_key(&req) else {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "missing API key");
    };
    let Some(record) = state.api_keys.get(&key).cloned() else {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "invalid API key");
    };

    if state.config.security.enable_rate_limiting {
        let outcome = state.rate_limiter.check(&key, record.rate_limit_per_minute, bridge::types::now_millis());
        if !outcome.allowed {
            return rate_limited_response(&outcome);
        }
    }

    let mut req = req;
    req.extensions_mut().insert(record);
    next.run(req).await
}
