//! Error types for the request-pipeline runtime.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("rule engine error: {0}")]
    RuleEngine(#[from] rule_engine::RuleEngineError),

    #[error("upstream request timed out after {0}ms")]
    UpstreamTimeout(u64),

    #[error("upstream transport error: {0}")]
    UpstreamTransport(String),

    #[error("upstream returned malformed response: {0}")]
    MalformedUpstreamResponse(String),

    #[error("queue at priority {0:?} is full")]
    QueueFull(crate::types::Priority),

    #[error("request body could not be parsed: {0}")]
    InvalidBody(String),

    #[error("no upstream client registered for provider {0}")]
    UnknownProvider(String),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
