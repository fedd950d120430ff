//! `proxy.*` configuration: the HTTP listener and admission limits (§6).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_queue_size")]
    pub request_queue_size: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_max_concurrent() -> usize {
    100
}
fn default_queue_size() -> usize {
    500
}

impl Default for ProxyConfig {
    fn default() -> Self {
        ProxyConfig {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            max_concurrent_requests: default_max_concurrent(),
            request_queue_size: default_queue_size(),
        }
    }
}
