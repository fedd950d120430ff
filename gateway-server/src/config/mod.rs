//! Top-level configuration: one TOML file, overlaid with environment
//! variables, composed from one submodule per `§6` option group. Follows
//! the `Config`/`ConfigError`/`validate()` shape `domain::config` uses —
//! non-panicking, warnings and errors both collected and reported rather
//! than failing fast on the first bad field.

mod audit;
mod monitor;
mod providers;
mod proxy;
mod rules;
mod security;
mod web;

pub use audit::AuditConfig;
pub use monitor::MonitorConfig;
pub use providers::{LlmProviderConfig, LlmProvidersConfig};
pub use proxy::ProxyConfig;
pub use rules::RulesConfig;
pub use security::SecurityConfig;
pub use web::WebConfig;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default = "providers::default_providers")]
    pub llm_providers: LlmProvidersConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl Default for Config {
    fn default() -> Self {
        let mut config = Config {
            data_dir: default_data_dir(),
            proxy: ProxyConfig::default(),
            security: SecurityConfig::default(),
            rules: RulesConfig::default(),
            monitor: MonitorConfig::default(),
            audit: AuditConfig::default(),
            web: WebConfig::default(),
            llm_providers: providers::default_providers(),
        };
        config.rebase_paths();
        config
    }
}

impl Config {
    /// Loads `path` as TOML if it exists, falling back to defaults on a
    /// missing file or a parse error (logged, not fatal — mirrors
    /// `original_source`'s "missing config starts the gateway with sane
    /// defaults" behavior). Environment overrides are applied last so they
    /// always win over the file.
    pub fn load(path: &str) -> Config {
        let mut config = if std::path::Path::new(path).exists() {
            match std::fs::read_to_string(path) {
                Ok(raw) => toml::from_str(&raw).unwrap_or_else(|err| {
                    tracing::warn!(path, error = %err, "failed to parse config file, using defaults");
                    Config::default()
                }),
                Err(err) => {
                    tracing::warn!(path, error = %err, "failed to read config file, using defaults");
                    Config::default()
                }
            }
        } else {
            Config::default()
        };
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        env_path("DATA_DIR", &mut self.data_dir);

        env_str("PROXY_HOST", &mut self.proxy.host);
        env_parse("PROXY_PORT", &mut self.proxy.port);
        env_parse("PROXY_TIMEOUT", &mut self.proxy.timeout_secs);
        env_parse("PROXY_MAX_CONCURRENT_REQUESTS", &mut self.proxy.max_concurrent_requests);
        env_parse("PROXY_REQUEST_QUEUE_SIZE", &mut self.proxy.request_queue_size);

        env_parse("SECURITY_MAX_PROMPT_LENGTH", &mut self.security.max_prompt_length);
        env_parse("SECURITY_MAX_RESPONSE_LENGTH", &mut self.security.max_response_length);
        env_bool("SECURITY_ENABLE_API_AUTH", &mut self.security.enable_api_auth);
        env_bool("SECURITY_ENABLE_RATE_LIMITING", &mut self.security.enable_rate_limiting);
        env_bool("SECURITY_ENABLE_CONTENT_MASKING", &mut self.security.enable_content_masking);
        env_bool(
            "SECURITY_ENABLE_CONTEXT_AWARE_DETECTION",
            &mut self.security.enable_context_aware_detection,
        );
        env_bool(
            "SECURITY_ENABLE_MODEL_SPECIFIC_DETECTION",
            &mut self.security.enable_model_specific_detection,
        );
        env_path("SECURITY_API_KEYS_PATH", &mut self.security.api_keys_path);
        env_path("SECURITY_RATE_LIMIT_PATH", &mut self.security.rate_limit_path);

        env_path("RULES_PATH", &mut self.rules.rules_path);
        env_parse("RULES_REFRESH_INTERVAL", &mut self.rules.rules_refresh_interval_secs);
        env_parse("RULES_CACHE_SIZE", &mut self.rules.rules_cache_size);

        env_parse("MONITOR_METRICS_INTERVAL", &mut self.monitor.metrics_interval_secs);
        env_parse("MONITOR_PROMETHEUS_PORT", &mut self.monitor.prometheus_port);

        env_path("AUDIT_LOG_PATH", &mut self.audit.audit_log_path);
        env_parse("AUDIT_LOG_RETENTION", &mut self.audit.audit_log_retention_days);
        env_str("AUDIT_LOG_FORMAT", &mut self.audit.audit_log_format);

        env_str("WEB_HOST", &mut self.web.host);
        env_parse("WEB_PORT", &mut self.web.port);
        env_str("WEB_SECRET_KEY", &mut self.web.secret_key);
        env_parse("WEB_TOKEN_EXPIRE_MINUTES", &mut self.web.token_expire_minutes);

        self.rebase_paths();
    }

    /// Fills in any path left empty (by the TOML file or by `Default`) with
    /// one relative to `data_dir`, matching the persisted-state layout §6
    /// names: `rules/`, `api_keys.json`, `rate_limit.json`,
    /// `security_events/events.json`.
    fn rebase_paths(&mut self) {
        if self.rules.rules_path.as_os_str().is_empty() {
            self.rules.rules_path = self.data_dir.join("rules");
        }
        if self.security.api_keys_path.as_os_str().is_empty() {
            self.security.api_keys_path = self.data_dir.join("api_keys.json");
        }
        if self.security.rate_limit_path.as_os_str().is_empty() {
            self.security.rate_limit_path = self.data_dir.join("rate_limit.json");
        }
        if self.audit.audit_log_path.as_os_str().is_empty() {
            self.audit.audit_log_path = self.data_dir.join("security_events").join("events.json");
        }
    }

    /// Non-panicking validation: every problem is collected rather than
    /// failing on the first one, so an operator sees the whole picture at
    /// once (`validate-config` subcommand, and the startup gate in `main`).
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.proxy.port == 0 {
            errors.push(ConfigError::error("proxy.port", "port must be greater than 0"));
        }
        if self.proxy.max_concurrent_requests == 0 {
            errors.push(ConfigError::error("proxy.maxConcurrentRequests", "must be greater than 0"));
        }
        if self.proxy.request_queue_size == 0 {
            errors.push(ConfigError::error("proxy.requestQueueSize", "must be greater than 0"));
        }
        if self.security.enable_api_auth && !self.security.api_keys_path.exists() {
            errors.push(ConfigError::warning(
                "security.apiKeysPath",
                "file does not exist yet; no API keys will be accepted until one is created",
            ));
        }
        if self.web.secret_key.is_empty() || self.web.secret_key == "change-me" {
            errors.push(ConfigError::warning(
                "web.secretKey",
                "using the default secret key; set WEB_SECRET_KEY before exposing the dashboard",
            ));
        }
        if self.llm_providers.is_empty() {
            errors.push(ConfigError::warning(
                "llmProviders",
                "no providers configured; /api/v1/proxy will have nothing to resolve a target against",
            ));
        }

        errors
    }
}

fn env_str(key: &str, field: &mut String) {
    if let Ok(value) = std::env::var(key) {
        *field = value;
    }
}

fn env_path(key: &str, field: &mut PathBuf) {
    if let Ok(value) = std::env::var(key) {
        *field = PathBuf::from(value);
    }
}

fn env_bool(key: &str, field: &mut bool) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, field: &mut T) {
    if let Ok(value) = std::env::var(key) {
        if let Ok(parsed) = value.parse() {
            *field = parsed;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: &str) -> Self {
        ConfigError {
            severity: ConfigSeverity::Error,
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    fn warning(field: &str, message: &str) -> Self {
        ConfigError {
            severity: ConfigSeverity::Warning,
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_rebases_paths_under_data_dir() {
        let config = Config::default();
        assert_eq!(config.rules.rules_path, PathBuf::from("data/rules"));
        assert_eq!(config.security.api_keys_path, PathBuf::from("data/api_keys.json"));
        assert_eq!(
            config.audit.audit_log_path,
            PathBuf::from("data/security_events/events.json")
        );
    }

    #[test]
    fn zero_port_is_a_validation_error() {
        let mut config = Config::default();
        config.proxy.port = 0;
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.severity == ConfigSeverity::Error && i.field == "proxy.port"));
    }

    #[test]
    fn default_secret_key_is_a_validation_warning() {
        let config = Config::default();
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.field == "web.secretKey" && i.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn config_error_display_matches_tag_field_message_shape() {
        let err = ConfigError::error("proxy.port", "port must be greater than 0");
        assert_eq!(err.to_string(), "[ERROR] proxy.port: port must be greater than 0");
    }
}
