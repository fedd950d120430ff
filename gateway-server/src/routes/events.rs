//! Event Logger routes (§4.10, §6): querying and paginating the security
//! event log the Aggregator writes to on every blocking decision.

use crate::routes::error::json_error;
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rule_engine::{DetectionKind, EventQuery, EventStats, Severity, SecurityEvent};
use serde::Deserialize;

fn parse_detection_kind(value: &str) -> Option<DetectionKind> {
    DetectionKind::all().iter().copied().find(|kind| kind.to_string().eq_ignore_ascii_case(value))
}

fn parse_severity(value: &str) -> Option<Severity> {
    match value.to_ascii_lowercase().as_str() {
        "low" => Some(Severity::Low),
        "medium" => Some(Severity::Medium),
        "high" => Some(Severity::High),
        "critical" => Some(Severity::Critical),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
pub struct EventsQueryParams {
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub detection_type: Option<String>,
    pub severity: Option<String>,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    50
}

impl EventsQueryParams {
    fn to_filter(&self) -> EventQuery {
        EventQuery {
            start_millis: self.start_time,
            end_millis: self.end_time,
            detection_kind: self.detection_type.as_deref().and_then(parse_detection_kind),
            severity: self.severity.as_deref().and_then(parse_severity),
            offset: self.page.saturating_sub(1).saturating_mul(self.page_size),
            limit: self.page_size,
        }
    }
}

/// `GET /api/v1/events?start_time=&end_time=&detection_type=&severity=&page=&page_size=`
pub async fn list_events(State(state): State<AppState>, Query(params): Query<EventsQueryParams>) -> Json<serde_json::Value> {
    let query = params.to_filter();
    let total = state.events.count(&query);
    let events: Vec<SecurityEvent> = state.events.query(&query);
    Json(serde_json::json!({
        "events": events,
        "page": params.page,
        "pageSize": params.page_size,
        "total": total,
    }))
}

/// `GET /api/v1/events/{id}`
pub async fn get_event(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.events.get(&id) {
        Some(event) => Json(event).into_response(),
        None => json_error(StatusCode::NOT_FOUND, format!("no event with id {id:?}")),
    }
}

/// `GET /api/v1/events/stats`
pub async fn stats(State(state): State<AppState>, Query(params): Query<EventsQueryParams>) -> Json<EventStats> {
    let query = params.to_filter();
    Json(state.events.stats(&query))
}
