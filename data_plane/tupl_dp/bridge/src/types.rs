//! Wire-level and pipeline types shared across the bridge's modules:
//! provider identification, the standardized request/response shape every
//! protocol adapter normalizes into, and the priority/queueing types C8
//! operates on.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// The LLM backend a request targets. Detected from the request's `model`
/// field via [`crate::protocol::detect_provider`] unless the caller pins
/// one explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTag {
    OpenAi,
    Anthropic,
    Cohere,
    HuggingFace,
    Ollama,
    Custom,
}

impl fmt::Display for ProviderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderTag::OpenAi => "openai",
            ProviderTag::Anthropic => "anthropic",
            ProviderTag::Cohere => "cohere",
            ProviderTag::HuggingFace => "huggingface",
            ProviderTag::Ollama => "ollama",
            ProviderTag::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Queue tier a request is admitted under (§4.8). Lower numeric value is
/// serviced first; ties break on arrival order (`timestamp_millis`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High = 0,
    Normal = 1,
    Low = 2,
}

/// One normalized chat message, independent of the originating provider's
/// wire shape.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct StandardMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StandardMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        StandardMessage {
            role: role.into(),
            content: content.into(),
            name: None,
        }
    }
}

/// The provider-agnostic request shape every adapter in `protocol.rs`
/// normalizes into and every detector family evaluates against (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardRequest {
    pub model: Option<String>,
    pub messages: Vec<StandardMessage>,
    pub temperature: f64,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    pub top_p: f64,
    pub frequency_penalty: f64,
    pub presence_penalty: f64,
    #[serde(default)]
    pub stop: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, Value>,
}

impl Default for StandardRequest {
    fn default() -> Self {
        StandardRequest {
            model: None,
            messages: Vec::new(),
            temperature: 1.0,
            max_tokens: None,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            stop: None,
            stream: false,
            user: None,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl StandardRequest {
    /// The originating protocol, recorded by the adapter that standardized
    /// this request (`metadata.originalProtocol`, §4.6).
    pub fn original_protocol(&self) -> Option<&str> {
        self.metadata.get("originalProtocol").and_then(|v| v.as_str())
    }

    /// The full conversation joined into one blob, used by the
    /// context-aware detection pass (§4.3).
    pub fn joined_text(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Only the newest message's text, used by the per-message checks.
    pub fn latest_text(&self) -> &str {
        self.messages.last().map(|m| m.content.as_str()).unwrap_or("")
    }
}

/// One completion choice in a [`StandardResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardChoice {
    pub index: u32,
    pub message: StandardMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token accounting, normalized from whichever usage shape the upstream
/// protocol reports.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StandardUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The provider-agnostic response shape, built from a provider's raw JSON
/// body by `protocol.rs` before output-side detection runs (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StandardResponse {
    pub id: String,
    pub model: String,
    pub choices: Vec<StandardChoice>,
    pub usage: StandardUsage,
    pub created: i64,
    #[serde(default)]
    pub metadata: std::collections::HashMap<String, Value>,
}

impl StandardResponse {
    /// The text the Content Masker and response-side detectors operate on:
    /// every choice's message content, joined.
    pub fn joined_text(&self) -> String {
        self.choices
            .iter()
            .map(|c| c.message.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A request as it enters the Interceptor (C7): the original provider
/// payload plus everything the pipeline threads through as correlation
/// context.
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub request_id: String,
    pub provider: ProviderTag,
    pub model: Option<String>,
    pub conversation_id: Option<String>,
    pub raw_body: Value,
    pub standard: StandardRequest,
}

/// A response as it leaves the Forwarder (C9), before or after masking.
#[derive(Debug, Clone)]
pub struct InterceptedResponse {
    pub status: u16,
    pub raw_body: Value,
    pub standard: StandardResponse,
    pub latency_millis: i64,
    /// True for Ollama/OpenAI chat streaming responses. Streaming bodies
    /// carry a placeholder `raw_body`/`standard`; detectors on the response
    /// side are skipped for these (§4.3 "Streaming responses short-circuit
    /// to allowed").
    pub is_streaming: bool,
}

/// One request waiting in the priority queue. Ordering is reversed for use
/// in a `BinaryHeap` (a max-heap): the *lowest* priority value and the
/// *earliest* timestamp should sort first, matching `original_source`'s
/// `QueuedRequest.__lt__`.
#[derive(Debug)]
pub struct QueuedRequest<T> {
    pub payload: T,
    pub priority: Priority,
    pub enqueued_at_millis: i64,
    pub timeout_millis: i64,
}

impl<T> QueuedRequest<T> {
    pub fn is_expired(&self, now_millis: i64) -> bool {
        now_millis - self.enqueued_at_millis > self.timeout_millis
    }
}

impl<T> PartialEq for QueuedRequest<T> {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.enqueued_at_millis == other.enqueued_at_millis
    }
}

impl<T> Eq for QueuedRequest<T> {}

impl<T> PartialOrd for QueuedRequest<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for QueuedRequest<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so Priority::High (0) and the
        // earliest timestamp compare as the greatest element.
        (other.priority as u8)
            .cmp(&(self.priority as u8))
            .then_with(|| other.enqueued_at_millis.cmp(&self.enqueued_at_millis))
    }
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before the unix epoch")
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BinaryHeap;

    #[test]
    fn high_priority_pops_before_normal_regardless_of_arrival() {
        let mut heap = BinaryHeap::new();
        heap.push(QueuedRequest {
            payload: "normal",
            priority: Priority::Normal,
            enqueued_at_millis: 1,
            timeout_millis: 1000,
        });
        heap.push(QueuedRequest {
            payload: "high",
            priority: Priority::High,
            enqueued_at_millis: 2,
            timeout_millis: 1000,
        });

        assert_eq!(heap.pop().unwrap().payload, "high");
        assert_eq!(heap.pop().unwrap().payload, "normal");
    }

    #[test]
    fn same_priority_breaks_tie_on_earlier_timestamp() {
        let mut heap = BinaryHeap::new();
        heap.push(QueuedRequest {
            payload: "later",
            priority: Priority::Normal,
            enqueued_at_millis: 20,
            timeout_millis: 1000,
        });
        heap.push(QueuedRequest {
            payload: "earlier",
            priority: Priority::Normal,
            enqueued_at_millis: 10,
            timeout_millis: 1000,
        });

        assert_eq!(heap.pop().unwrap().payload, "earlier");
    }

    #[test]
    fn joined_text_concatenates_every_message() {
        let req = StandardRequest {
            model: Some("gpt-4".to_string()),
            messages: vec![
                StandardMessage::new("user", "hello"),
                StandardMessage::new("assistant", "hi"),
            ],
            ..Default::default()
        };
        assert_eq!(req.joined_text(), "hello\nhi");
        assert_eq!(req.latest_text(), "hi");
    }
}
