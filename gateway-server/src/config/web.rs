//! `web.*` configuration: the operator dashboard's own listener and session
//! settings. The dashboard UI itself is out of scope (Non-goal), but its
//! configuration surface is still part of the gateway's configuration
//! contract and is carried here unused beyond validation.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_secret_key")]
    pub secret_key: String,
    #[serde(default = "default_token_expire")]
    pub token_expire_minutes: u32,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8081
}
fn default_secret_key() -> String {
    "change-me".to_string()
}
fn default_token_expire() -> u32 {
    60
}

impl Default for WebConfig {
    fn default() -> Self {
        WebConfig {
            host: default_host(),
            port: default_port(),
            secret_key: default_secret_key(),
            token_expire_minutes: default_token_expire(),
        }
    }
}
