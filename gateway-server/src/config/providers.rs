//! `llmProviders` configuration: the `providerName -> {apiBase, timeout}`
//! table the Upstream Forwarder's [`bridge::ProviderRegistry`] is built
//! from (§6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmProviderConfig {
    pub api_base: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_timeout() -> u64 {
    60
}

pub type LlmProvidersConfig = HashMap<String, LlmProviderConfig>;

/// Sane out-of-the-box targets for every provider the Protocol Adapter
/// knows how to speak to, so a fresh install can proxy without an operator
/// writing `llmProviders` by hand first.
pub fn default_providers() -> LlmProvidersConfig {
    let mut providers = HashMap::new();
    providers.insert(
        "openai".to_string(),
        LlmProviderConfig {
            api_base: "https://api.openai.com".to_string(),
            timeout_secs: 60,
        },
    );
    providers.insert(
        "anthropic".to_string(),
        LlmProviderConfig {
            api_base: "https://api.anthropic.com".to_string(),
            timeout_secs: 60,
        },
    );
    providers.insert(
        "cohere".to_string(),
        LlmProviderConfig {
            api_base: "https://api.cohere.ai".to_string(),
            timeout_secs: 60,
        },
    );
    providers.insert(
        "huggingface".to_string(),
        LlmProviderConfig {
            api_base: "https://api-inference.huggingface.co".to_string(),
            timeout_secs: 60,
        },
    );
    providers.insert(
        "ollama".to_string(),
        LlmProviderConfig {
            api_base: "http://localhost:11434".to_string(),
            timeout_secs: 120,
        },
    );
    providers
}
