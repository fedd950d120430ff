//! Error types shared across the rule data model.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleEngineError {
    #[error("failed to read rule file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write rule file {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed rule file {path}: {source}")]
    MalformedRuleFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule id {0:?} is not unique within its family")]
    DuplicateRuleId(String),

    #[error("model rule config for model {0:?} already exists")]
    ModelConfigExists(String),

    #[error("no model rule config found for model {0:?}")]
    ModelConfigNotFound(String),

    #[error("template {0:?} not found")]
    TemplateNotFound(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RuleEngineError>;
