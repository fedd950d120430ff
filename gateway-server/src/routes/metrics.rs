//! Metrics (§6): a combined overview plus a per-resource breakdown, built
//! from the same counters `health_status` uses — there is no separate
//! metrics backend, just different views over the live subsystems.

use crate::routes::error::json_error;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rule_engine::EventQuery;
use serde_json::json;

fn requests_metrics(state: &AppState) -> serde_json::Value {
    json!({
        "queueDepth": state.interceptor.queue_depth(),
        "workersAvailable": state.interceptor.available_workers(),
        "workerCount": state.interceptor.worker_count(),
        "maxConcurrentRequests": state.config.proxy.max_concurrent_requests,
        "requestQueueSize": state.config.proxy.request_queue_size,
    })
}

fn events_metrics(state: &AppState) -> serde_json::Value {
    let stats = state.events.stats(&EventQuery::default());
    serde_json::to_value(stats).unwrap_or(json!({}))
}

fn models_metrics(state: &AppState) -> serde_json::Value {
    let models: Vec<_> = state
        .model_rules
        .list_model_configs()
        .into_iter()
        .map(|(model, config)| {
            json!({
                "model": model,
                "associationCount": config.associations.len(),
                "securityScore": state.model_rules.security_score(&model),
                "priorityConflicts": state.model_rules.priority_conflicts(&model).len(),
            })
        })
        .collect();
    json!({ "models": models })
}

fn queues_metrics(state: &AppState) -> serde_json::Value {
    json!({
        "depth": state.interceptor.queue_depth(),
        "workerCount": state.interceptor.worker_count(),
        "workersAvailable": state.interceptor.available_workers(),
    })
}

/// `GET /api/v1/metrics` — everything at once.
pub async fn overview(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "requests": requests_metrics(&state),
        "events": events_metrics(&state),
        "models": models_metrics(&state),
        "queues": queues_metrics(&state),
    }))
}

/// `GET /api/v1/metrics/{resource}` — one of `requests`, `events`, `models`,
/// `queues`.
pub async fn resource(State(state): State<AppState>, Path(resource): Path<String>) -> Response {
    match resource.as_str() {
        "requests" => Json(requests_metrics(&state)).into_response(),
        "events" => Json(events_metrics(&state)).into_response(),
        "models" => Json(models_metrics(&state)).into_response(),
        "queues" => Json(queues_metrics(&state)).into_response(),
        other => json_error(StatusCode::NOT_FOUND, format!("unknown metrics resource {other:?}")),
    }
}
