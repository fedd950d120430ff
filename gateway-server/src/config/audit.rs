//! `audit.*` configuration: where C10's event log lives and how long it is
//! kept (§6). Retention is advisory — enforcing it is left to an operator's
//! log-rotation tooling, matching `original_source`'s own behavior of never
//! truncating the file itself.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub audit_log_path: PathBuf,
    #[serde(default = "default_retention_days")]
    pub audit_log_retention_days: u32,
    #[serde(default = "default_format")]
    pub audit_log_format: String,
}

fn default_retention_days() -> u32 {
    90
}
fn default_format() -> String {
    "json".to_string()
}

impl Default for AuditConfig {
    fn default() -> Self {
        AuditConfig {
            audit_log_path: PathBuf::new(),
            audit_log_retention_days: default_retention_days(),
            audit_log_format: default_format(),
        }
    }
}
