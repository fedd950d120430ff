//! `rules.*` configuration: where C1 persists rule families and how often
//! an operator-triggered reload is expected to pick up edits (§6).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub rules_path: PathBuf,
    #[serde(default = "default_refresh_interval")]
    pub rules_refresh_interval_secs: u64,
    #[serde(default = "default_cache_size")]
    pub rules_cache_size: usize,
}

fn default_refresh_interval() -> u64 {
    300
}
fn default_cache_size() -> usize {
    1000
}

impl Default for RulesConfig {
    fn default() -> Self {
        RulesConfig {
            rules_path: PathBuf::new(),
            rules_refresh_interval_secs: default_refresh_interval(),
            rules_cache_size: default_cache_size(),
        }
    }
}
