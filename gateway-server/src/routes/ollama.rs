//! Ollama admin endpoints (§6): model listing, pulling, and deletion. These
//! talk straight to the local Ollama runtime and never touch the Aggregator —
//! there is no chat content here to detect against.

use crate::ollama_admin::PullProgress;
use crate::routes::error::json_error;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

/// `GET /api/v1/ollama/models`
pub async fn models(State(state): State<AppState>) -> Response {
    let url = format!("{}/api/tags", state.ollama_base());
    match state.http_client.get(&url).send().await {
        Ok(response) => {
            let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY);
            match response.json::<Value>().await {
                Ok(body) => (status, Json(body)).into_response(),
                Err(err) => json_error(StatusCode::BAD_GATEWAY, format!("malformed response from ollama: {err}")),
            }
        }
        Err(err) => json_error(StatusCode::BAD_GATEWAY, format!("ollama unreachable: {err}")),
    }
}

/// `POST /api/v1/ollama/pull` — kicks off the pull in the background and
/// returns immediately; progress is polled via `pull_progress`.
pub async fn pull(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    let Some(model) = body.get("model").and_then(|v| v.as_str()).map(String::from) else {
        return json_error(StatusCode::BAD_REQUEST, "body must include \"model\"");
    };

    state.pull_tracker.set(&model, "pulling", false);

    let client = state.http_client.clone();
    let url = format!("{}/api/pull", state.ollama_base());
    let tracker = state.pull_tracker.clone();
    let task_model = model.clone();
    tokio::spawn(async move {
        match client.post(&url).json(&json!({ "model": task_model, "stream": false })).send().await {
            Ok(response) if response.status().is_success() => {
                tracker.set(&task_model, "success", true);
            }
            Ok(response) => {
                tracker.set(&task_model, format!("upstream returned {}", response.status()), true);
            }
            Err(err) => {
                tracker.set(&task_model, format!("pull failed: {err}"), true);
            }
        }
    });

    (StatusCode::ACCEPTED, Json(json!({ "model": model, "status": "pulling" }))).into_response()
}

/// `GET /api/v1/ollama/pull/progress/{model}`
pub async fn pull_progress(State(state): State<AppState>, Path(model): Path<String>) -> Response {
    match state.pull_tracker.get(&model) {
        Some(progress) => Json(progress).into_response(),
        None => {
            let unknown = PullProgress { status: "unknown".to_string(), done: true };
            Json(unknown).into_response()
        }
    }
}

/// `DELETE /api/v1/ollama/delete/{model}`
pub async fn delete_model(State(state): State<AppState>, Path(model): Path<String>) -> Response {
    let url = format!("{}/api/delete", state.ollama_base());
    match state.http_client.delete(&url).json(&json!({ "model": model })).send().await {
        Ok(response) => StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::BAD_GATEWAY).into_response(),
        Err(err) => json_error(StatusCode::BAD_GATEWAY, format!("ollama unreachable: {err}")),
    }
}
