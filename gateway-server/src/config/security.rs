//! `security.*` configuration: feature toggles and the file paths C1/C11
//! read from (§6). The per-family `*RulesPath` options spec.md names
//! collapse into a single [`super::rules::RulesConfig::rules_path`]
//! directory here — the Rule Store already owns one directory of
//! per-family files (see `rule_store::family_path`), so a configurable
//! path per family would just mean a directory it never reads from.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_max_prompt_length")]
    pub max_prompt_length: usize,
    #[serde(default = "default_max_response_length")]
    pub max_response_length: usize,
    #[serde(default = "default_true")]
    pub enable_api_auth: bool,
    #[serde(default = "default_true")]
    pub enable_rate_limiting: bool,
    #[serde(default = "default_true")]
    pub enable_content_masking: bool,
    #[serde(default = "default_true")]
    pub enable_context_aware_detection: bool,
    #[serde(default = "default_true")]
    pub enable_model_specific_detection: bool,
    #[serde(default)]
    pub api_keys_path: PathBuf,
    #[serde(default)]
    pub rate_limit_path: PathBuf,
    #[serde(default)]
    pub sensitive_info_patterns_path: Option<PathBuf>,
}

fn default_max_prompt_length() -> usize {
    8192
}
fn default_max_response_length() -> usize {
    16384
}
fn default_true() -> bool {
    true
}

impl Default for SecurityConfig {
    fn default() -> Self {
        SecurityConfig {
            max_prompt_length: default_max_prompt_length(),
            max_response_length: default_max_response_length(),
            enable_api_auth: true,
            enable_rate_limiting: true,
            enable_content_masking: true,
            enable_context_aware_detection: true,
            enable_model_specific_detection: true,
            api_keys_path: PathBuf::new(),
            rate_limit_path: PathBuf::new(),
            sensitive_info_patterns_path: None,
        }
    }
}
