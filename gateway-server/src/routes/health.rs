//! Health and readiness (§6). Both paths are in the public bypass list
//! (C11), so they answer even when an operator has locked down every other
//! route behind API keys.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use bridge::types::now_millis;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub uptime_millis: i64,
    pub rules_degraded: bool,
    pub rules_loaded_at: String,
    pub queue_depth: usize,
    pub workers_available: usize,
    pub worker_count: usize,
}

/// Liveness probe: if the process can answer at all, it's up.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Readiness probe with enough detail for an operator dashboard to show
/// something useful without hitting `/metrics`.
pub async fn health_status(State(state): State<AppState>) -> Json<HealthStatus> {
    let snapshot = state.rule_store.snapshot();
    Json(HealthStatus {
        status: if snapshot.degraded() { "degraded" } else { "ok" },
        uptime_millis: now_millis() - state.started_at_millis,
        rules_degraded: snapshot.degraded(),
        rules_loaded_at: snapshot.loaded_at().to_rfc3339(),
        queue_depth: state.interceptor.queue_depth(),
        workers_available: state.interceptor.available_workers(),
        worker_count: state.interceptor.worker_count(),
    })
}
