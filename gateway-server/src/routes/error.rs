//! Shared JSON error-response helpers for the CRUD routes (rules, templates,
//! model-rules). The proxy/chat routes use the Interceptor's own envelope
//! shape instead (§6) — this one is for admin-surface failures only.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rule_engine::RuleEngineError;
use serde_json::json;

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(json!({ "error": { "message": message.into(), "code": status.as_u16() } })),
    )
        .into_response()
}

pub fn rule_engine_error(err: RuleEngineError) -> Response {
    let status = match err {
        RuleEngineError::ModelConfigExists(_) | RuleEngineError::DuplicateRuleId(_) => StatusCode::CONFLICT,
        RuleEngineError::ModelConfigNotFound(_) | RuleEngineError::TemplateNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.to_string())
}
