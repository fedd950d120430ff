//! Shared application state: every subsystem the route handlers need,
//! wired together once in `main` and handed to axum as `State<AppState>`.

use crate::auth::{ApiKeyStore, RateLimiter};
use crate::config::Config;
use crate::ollama_admin::PullTracker;
use bridge::{Aggregator, ConversationTracker, Interceptor, ProviderEndpoint, ProviderRegistry, ProviderTag};
use rule_engine::{EventLogger, ModelRuleManager, RuleStore};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rule_store: Arc<RuleStore>,
    pub model_rules: Arc<ModelRuleManager>,
    pub events: Arc<EventLogger>,
    pub aggregator: Arc<Aggregator>,
    pub conversations: Arc<ConversationTracker>,
    pub provider_registry: Arc<ProviderRegistry>,
    pub interceptor: Arc<Interceptor>,
    pub api_keys: Arc<ApiKeyStore>,
    pub rate_limiter: Arc<RateLimiter>,
    pub pull_tracker: PullTracker,
    pub http_client: reqwest::Client,
    pub started_at_millis: i64,
}

impl AppState {
    /// Resolves the upstream URL for a `/api/v1/proxy` or
    /// `/api/v1/ollama/chat` call: the provider's configured `apiBase` plus
    /// that provider's well-known completion path. Falls back to the
    /// `custom` entry (if any) when no endpoint is registered for the
    /// detected provider — the operator is expected to point `custom` at
    /// whatever internal gateway it has, per `llmProviders`' open schema.
    pub fn target_url(&self, provider: ProviderTag) -> String {
        let base = self
            .provider_registry
            .endpoint(provider)
            .or_else(|| self.provider_registry.endpoint(ProviderTag::Custom))
            .map(|endpoint| endpoint.api_base.clone())
            .unwrap_or_default();
        format!("{}{}", base.trim_end_matches('/'), default_completion_path(provider))
    }

    /// Base URL for the Ollama admin endpoints (`/models`, `/pull`,
    /// `/delete`), which bypass the detection pipeline entirely.
    pub fn ollama_base(&self) -> String {
        self.provider_registry
            .endpoint(ProviderTag::Ollama)
            .map(|endpoint| endpoint.api_base.clone())
            .unwrap_or_else(|| "http://localhost:11434".to_string())
    }
}

fn default_completion_path(provider: ProviderTag) -> &'static str {
    match provider {
        ProviderTag::OpenAi => "/v1/chat/completions",
        ProviderTag::Anthropic => "/v1/messages",
        ProviderTag::Cohere => "/v1/chat",
        ProviderTag::HuggingFace => "/models/inference",
        ProviderTag::Ollama => "/api/chat",
        ProviderTag::Custom => "",
    }
}

/// Builds a [`ProviderRegistry`] from `config.llm_providers`, falling back
/// to `config.proxy.timeout_secs` for any provider that doesn't set its own.
pub fn build_provider_registry(config: &Config) -> ProviderRegistry {
    let mut registry = ProviderRegistry::new(std::time::Duration::from_secs(config.proxy.timeout_secs));
    for (name, provider) in &config.llm_providers {
        registry.register(
            name.clone(),
            ProviderEndpoint {
                api_base: provider.api_base.clone(),
                timeout: std::time::Duration::from_secs(provider.timeout_secs),
            },
        );
    }
    registry
}
