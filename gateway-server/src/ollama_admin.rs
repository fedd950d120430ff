//! In-memory tracking for `/api/v1/ollama/pull`'s background pull, polled by
//! `/api/v1/ollama/pull/progress/{model}`. These admin endpoints manage the
//! local Ollama runtime itself and bypass the detection pipeline entirely —
//! there is no request/response text here for C3 to evaluate.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct PullProgress {
    pub status: String,
    pub done: bool,
}

#[derive(Clone, Default)]
pub struct PullTracker {
    progress: Arc<RwLock<HashMap<String, PullProgress>>>,
}

impl PullTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, model: &str, status: impl Into<String>, done: bool) {
        self.progress.write().insert(model.to_string(), PullProgress { status: status.into(), done });
    }

    pub fn get(&self, model: &str) -> Option<PullProgress> {
        self.progress.read().get(model).cloned()
    }
}
