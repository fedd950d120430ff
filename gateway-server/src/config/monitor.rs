//! `monitor.*` configuration: metrics polling cadence and alert thresholds
//! surfaced by the metrics routes (§6).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_metrics_interval")]
    pub metrics_interval_secs: u64,
    #[serde(default = "default_prometheus_port")]
    pub prometheus_port: u16,
    #[serde(default)]
    pub alert_thresholds: HashMap<String, f64>,
}

fn default_metrics_interval() -> u64 {
    30
}
fn default_prometheus_port() -> u16 {
    9090
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            metrics_interval_secs: default_metrics_interval(),
            prometheus_port: default_prometheus_port(),
            alert_thresholds: HashMap::new(),
        }
    }
}
