//! Rule, rule-template, and model-rule CRUD (§4.1, §4.4, §6). These are the
//! operator-facing surface over the Rule Store and Model Rule Manager; the
//! detection pipeline itself never calls through HTTP.

use crate::routes::error::{json_error, rule_engine_error};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use rule_engine::{ModelRuleAssociation, RuleDefinition, RuleSetTemplate, SecurityRule};
use serde::Deserialize;
use serde_json::json;

/// `GET /api/v1/rules` — every rule across every family.
pub async fn list_rules(State(state): State<AppState>) -> Json<Vec<RuleDefinition>> {
    let rules = state.rule_store.list_rules().iter().map(SecurityRule::to_definition).collect();
    Json(rules)
}

/// `GET /api/v1/rules/{id}`
pub async fn get_rule(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.rule_store.find_rule(&id) {
        Some((_, rule)) => Json(rule.to_definition()).into_response(),
        None => json_error(StatusCode::NOT_FOUND, format!("no rule with id {id:?}")),
    }
}

/// `PUT /api/v1/rules/{id}` — upserts a rule. The body's `detectionKind`
/// selects which family file it is persisted under; `id` in the path and
/// body must agree.
pub async fn update_rule(State(state): State<AppState>, Path(id): Path<String>, Json(mut def): Json<RuleDefinition>) -> Response {
    def.id = id;
    let kind = def.detection_kind;
    let rule = SecurityRule::compile(def);
    match state.rule_store.upsert_rule(kind, rule.clone()) {
        Ok(()) => Json(rule.to_definition()).into_response(),
        Err(err) => rule_engine_error(err),
    }
}

/// `DELETE /api/v1/rules/{id}`
pub async fn delete_rule(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some((kind, _)) = state.rule_store.find_rule(&id) else {
        return json_error(StatusCode::NOT_FOUND, format!("no rule with id {id:?}"));
    };
    match state.rule_store.delete_rule(kind, &id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, format!("no rule with id {id:?}")),
        Err(err) => rule_engine_error(err),
    }
}

#[derive(Deserialize)]
pub struct PriorityUpdate {
    pub priority: u32,
}

/// `PATCH /api/v1/rules/{id}/priority`
pub async fn update_priority(State(state): State<AppState>, Path(id): Path<String>, Json(body): Json<PriorityUpdate>) -> Response {
    let Some((kind, _)) = state.rule_store.find_rule(&id) else {
        return json_error(StatusCode::NOT_FOUND, format!("no rule with id {id:?}"));
    };
    match state.rule_store.set_priority(kind, &id, body.priority) {
        Ok(true) => Json(json!({ "id": id, "priority": body.priority })).into_response(),
        Ok(false) => json_error(StatusCode::NOT_FOUND, format!("no rule with id {id:?}")),
        Err(err) => rule_engine_error(err),
    }
}

/// `GET /api/v1/rule-templates`
pub async fn list_templates(State(state): State<AppState>) -> Json<Vec<RuleSetTemplate>> {
    Json(state.model_rules.list_templates())
}

/// `POST /api/v1/rule-templates`
pub async fn create_template(State(state): State<AppState>, Json(template): Json<RuleSetTemplate>) -> Response {
    state.model_rules.register_template(template.clone());
    (StatusCode::CREATED, Json(template)).into_response()
}

/// `GET /api/v1/rule-templates/{id}`
pub async fn get_template(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match state.model_rules.get_template(&id) {
        Some(template) => Json(template).into_response(),
        None => json_error(StatusCode::NOT_FOUND, format!("no template named {id:?}")),
    }
}

/// `PUT /api/v1/rule-templates/{id}` — replaces the named template wholesale.
pub async fn update_template(State(state): State<AppState>, Path(id): Path<String>, Json(mut template): Json<RuleSetTemplate>) -> Response {
    template.name = id;
    state.model_rules.register_template(template.clone());
    Json(template).into_response()
}

/// `DELETE /api/v1/rule-templates/{id}`
pub async fn delete_template(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    if state.model_rules.delete_template(&id) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        json_error(StatusCode::NOT_FOUND, format!("no template named {id:?}"))
    }
}

#[derive(Deserialize)]
pub struct CreateModelConfig {
    pub model: String,
}

/// `GET /api/v1/model-rules`
pub async fn list_model_rules(State(state): State<AppState>) -> Json<serde_json::Value> {
    let configs: Vec<_> = state
        .model_rules
        .list_model_configs()
        .into_iter()
        .map(|(model, config)| json!({ "model": model, "config": config }))
        .collect();
    Json(json!({ "models": configs }))
}

/// `POST /api/v1/model-rules` — creates an empty overlay config for a model.
pub async fn create_model_rules(State(state): State<AppState>, Json(body): Json<CreateModelConfig>) -> Response {
    match state.model_rules.create_model_config(body.model.clone()) {
        Ok(()) => (StatusCode::CREATED, Json(json!({ "model": body.model }))).into_response(),
        Err(err) => rule_engine_error(err),
    }
}

/// `GET /api/v1/model-rules/{modelId}`
pub async fn get_model_rules(State(state): State<AppState>, Path(model_id): Path<String>) -> Response {
    match state.model_rules.get_model_config(&model_id) {
        Ok(config) => Json(config).into_response(),
        Err(err) => rule_engine_error(err),
    }
}

/// `POST /api/v1/model-rules/{modelId}` — upserts one association (override
/// or model-only addition) onto the model's overlay.
pub async fn upsert_model_rule_association(
    State(state): State<AppState>,
    Path(model_id): Path<String>,
    Json(assoc): Json<ModelRuleAssociation>,
) -> Response {
    state.model_rules.upsert_association(&model_id, assoc.clone());
    Json(assoc).into_response()
}

/// `DELETE /api/v1/model-rules/{modelId}`
pub async fn delete_model_rules(State(state): State<AppState>, Path(model_id): Path<String>) -> Response {
    match state.model_rules.remove_model_config(&model_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => rule_engine_error(err),
    }
}

/// `POST /api/v1/models/{id}/apply-template/{tid}`
pub async fn apply_template(State(state): State<AppState>, Path((model_id, template_id)): Path<(String, String)>) -> Response {
    match state.model_rules.apply_template(&model_id, &template_id) {
        Ok(()) => Json(json!({ "model": model_id, "template": template_id, "applied": true })).into_response(),
        Err(err) => rule_engine_error(err),
    }
}
