//! HTTP surface (§6): builds the axum `Router`, wiring every route handler
//! and the C11 auth/rate-limit middleware onto `AppState`.

mod error;
mod events;
mod health;
mod metrics;
mod ollama;
mod proxy;
mod rules;

use crate::auth::auth_and_rate_limit;
use crate::state::AppState;
use axum::middleware;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/proxy", post(proxy::proxy))
        .route("/api/v1/ollama/chat", post(proxy::chat))
        .route("/api/v1/ollama/models", get(ollama::models))
        .route("/api/v1/ollama/pull", post(ollama::pull))
        .route("/api/v1/ollama/delete/:model", delete(ollama::delete_model))
        .route("/api/v1/ollama/pull/progress/:model", get(ollama::pull_progress))
        .route("/api/v1/rules", get(rules::list_rules))
        .route(
            "/api/v1/rules/:id",
            get(rules::get_rule).put(rules::update_rule).delete(rules::delete_rule),
        )
        .route("/api/v1/rules/:id/priority", patch(rules::update_priority))
        .route(
            "/api/v1/rule-templates",
            get(rules::list_templates).post(rules::create_template),
        )
        .route(
            "/api/v1/rule-templates/:id",
            get(rules::get_template).put(rules::update_template).delete(rules::delete_template),
        )
        .route(
            "/api/v1/model-rules",
            get(rules::list_model_rules).post(rules::create_model_rules),
        )
        .route(
            "/api/v1/model-rules/:model_id",
            get(rules::get_model_rules)
                .post(rules::upsert_model_rule_association)
                .delete(rules::delete_model_rules),
        )
        .route("/api/v1/models/:id/apply-template/:tid", post(rules::apply_template))
        .route("/api/v1/events", get(events::list_events))
        .route("/api/v1/events/stats", get(events::stats))
        .route("/api/v1/events/:id", get(events::get_event))
        .route("/api/v1/metrics", get(metrics::overview))
        .route("/api/v1/metrics/:resource", get(metrics::resource))
        .route("/api/v1/health", get(health::health))
        .route("/api/v1/health/status", get(health::health_status))
        .layer(middleware::from_fn_with_state(state.clone(), auth_and_rate_limit))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
