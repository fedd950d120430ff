//! Interceptor (C7): the single entry point the gateway-server's route
//! handlers call. Wires the Protocol Adapter (C6), Aggregator (C3), Upstream
//! Forwarder (C9) and Content Masker (C5) into one request/response
//! round-trip and owns the 403/500 JSON envelopes (§4.7, §6).

use crate::aggregator::Aggregator;
use crate::conversation::ConversationTracker;
use crate::errors::BridgeError;
use crate::forwarder::{ForwardOutcome, StreamHandle, UpstreamForwarder};
use crate::masker::mask_response;
use crate::protocol;
use crate::queue::{PriorityQueue, WorkerPool};
use crate::types::{now_millis, InterceptedRequest, Priority, StandardMessage};
use rule_engine::DetectionResult;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A response the Interceptor is ready to hand back to the HTTP layer. Most
/// requests resolve to `Json`, already masked/enveloped as needed. A
/// streaming chat completion resolves to `Streaming` instead: the response
/// side detectors and content masker never ran against it (§4.3), and the
/// route handler is responsible for proxying `stream`'s bytes onward and
/// letting it drop on disconnect or completion (§4.9).
pub enum InterceptOutcome {
    Json {
        status: u16,
        body: Value,
        headers: HashMap<String, String>,
    },
    Streaming {
        status: u16,
        stream: StreamHandle,
        headers: HashMap<String, String>,
    },
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    friendly_message: String,
    suggestion: String,
    #[serde(rename = "type")]
    kind: String,
    code: u16,
    request_id: String,
    feedback_url: String,
}

/// Builds the exact 403 envelope shape §6 mandates.
fn security_violation_envelope(result: &DetectionResult, request_id: &str) -> Value {
    let reason = result.reason.clone().unwrap_or_else(|| "unspecified violation".to_string());
    let body = ErrorBody {
        error: ErrorDetail {
            message: format!("请求被本地大模型防护系统拦截: {reason}"),
            friendly_message: "您的请求触发了安全策略,已被拦截。".to_string(),
            suggestion: "请修改请求内容后重试,或联系管理员反馈误判。".to_string(),
            kind: "security_violation".to_string(),
            code: 403,
            request_id: request_id.to_string(),
            feedback_url: "/api/v1/feedback/false-positive".to_string(),
        },
    };
    serde_json::to_value(body).expect("ErrorBody is always serializable")
}

fn internal_error_envelope(message: &str, request_id: &str, status: u16, kind: &str) -> Value {
    let body = ErrorBody {
        error: ErrorDetail {
            message: message.to_string(),
            friendly_message: "服务内部发生错误,请稍后重试。".to_string(),
            suggestion: "若问题持续出现,请联系管理员。".to_string(),
            kind: kind.to_string(),
            code: status,
            request_id: request_id.to_string(),
            feedback_url: "/api/v1/feedback/false-positive".to_string(),
        },
    };
    serde_json::to_value(body).expect("ErrorBody is always serializable")
}

/// Maps a pipeline failure to the status code §7 mandates: upstream timeout
/// is 504, upstream transport failure is 502, everything else (malformed
/// body, rule-engine errors, unexpected internal failures) is a plain 500.
fn status_for(err: &BridgeError) -> (u16, &'static str) {
    match err {
        BridgeError::UpstreamTimeout(_) => (504, "upstream_timeout"),
        BridgeError::UpstreamTransport(_) => (502, "upstream_unavailable"),
        _ => (500, "internal_error"),
    }
}

/// Generates a request id in the `req-<unixSec>` shape §6 specifies. Two
/// requests landing in the same second are disambiguated with a short
/// random suffix so correlation stays unique without a counter.
pub fn new_request_id() -> String {
    format!("req-{}-{:04x}", now_millis() / 1000, rand_suffix())
}

fn rand_suffix() -> u16 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};
    RandomState::new().build_hasher().finish() as u16
}

/// One request's admission ticket: the dispatcher task pulls these off the
/// [`PriorityQueue`] in strict priority order and wakes the waiting
/// `intercept` call by firing the oneshot.
type Ticket = tokio::sync::oneshot::Sender<()>;

pub struct Interceptor {
    aggregator: Arc<Aggregator>,
    forwarder: Arc<UpstreamForwarder>,
    conversations: Arc<ConversationTracker>,
    queue: Arc<PriorityQueue<Ticket>>,
    workers: Arc<WorkerPool>,
}

impl Interceptor {
    /// Builds the Interceptor and spawns the dispatcher task that drains
    /// `queue` in priority order, handing each waiting request its turn
    /// (§4.8). The dispatcher runs for the lifetime of the returned
    /// Interceptor's last `Arc` clone.
    pub fn new(
        aggregator: Arc<Aggregator>,
        forwarder: Arc<UpstreamForwarder>,
        conversations: Arc<ConversationTracker>,
        queue: Arc<PriorityQueue<Ticket>>,
        workers: Arc<WorkerPool>,
    ) -> Self {
        let dispatcher_queue = Arc::clone(&queue);
        tokio::spawn(async move {
            loop {
                let ticket = dispatcher_queue.dequeue().await;
                let _ = ticket.send(());
            }
        });

        Interceptor {
            aggregator,
            forwarder,
            conversations,
            queue,
            workers,
        }
    }

    /// Runs the full intercept pipeline for one request (§4.7). `target_url`
    /// and `headers` are what the Forwarder sends upstream; `priority` comes
    /// from the `X-Priority` header (default normal, §6).
    pub async fn intercept(
        &self,
        raw_body: Value,
        target_url: &str,
        upstream_headers: HashMap<String, String>,
        auth_header: Option<&str>,
        correlation_header: Option<&str>,
        client_address: &str,
        priority: Priority,
    ) -> InterceptOutcome {
        let request_id = new_request_id();
        let started = now_millis();

        let (tx, rx) = tokio::sync::oneshot::channel();
        if self.queue.enqueue(tx, priority, 30_000).await.is_err() {
            return InterceptOutcome::Json {
                status: 503,
                body: internal_error_envelope("request queue is full, try again shortly", &request_id, 503, "queue_full"),
                headers: HashMap::new(),
            };
        }
        // Wait for the dispatcher to dequeue our ticket in priority order,
        // then compete for a worker admission slot (§4.8).
        if rx.await.is_err() {
            return InterceptOutcome::Json {
                status: 500,
                body: internal_error_envelope("request was dropped from the queue", &request_id, 500, "internal_error"),
                headers: HashMap::new(),
            };
        }
        let _admission = self.workers.admit().await;

        match self
            .run_pipeline(raw_body, target_url, upstream_headers, auth_header, correlation_header, client_address, &request_id, started)
            .await
        {
            Ok(outcome) => outcome,
            Err(err) => {
                let (status, kind) = status_for(&err);
                InterceptOutcome::Json {
                    status,
                    body: internal_error_envelope(&err.to_string(), &request_id, status, kind),
                    headers: HashMap::new(),
                }
            }
        }
    }

    /// Current depth of the admission queue, across all three priority
    /// lanes. Exposed for the metrics routes (§6 `/api/v1/metrics/queues`).
    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }

    /// Worker admission slots currently free.
    pub fn available_workers(&self) -> usize {
        self.workers.available_permits()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.worker_count()
    }

    async fn run_pipeline(
        &self,
        raw_body: Value,
        target_url: &str,
        upstream_headers: HashMap<String, String>,
        auth_header: Option<&str>,
        correlation_header: Option<&str>,
        client_address: &str,
        request_id: &str,
        started: i64,
    ) -> Result<InterceptOutcome, BridgeError> {
        let model_hint = raw_body.get("model").and_then(|v| v.as_str());
        let provider = protocol::detect_provider(target_url, auth_header, model_hint);
        let standard = protocol::standardize_request(provider, &raw_body)?;

        let intercepted = InterceptedRequest {
            request_id: request_id.to_string(),
            provider,
            model: standard.model.clone(),
            conversation_id: correlation_header.map(String::from),
            raw_body: raw_body.clone(),
            standard: standard.clone(),
        };

        let user_messages: Vec<StandardMessage> = intercepted
            .standard
            .messages
            .iter()
            .filter(|m| m.role != "system")
            .cloned()
            .collect();
        let first_user_text = user_messages.first().map(|m| m.content.as_str()).unwrap_or("");
        let correlation_key = ConversationTracker::correlation_key(correlation_header, client_address, first_user_text);
        let history = self.conversations.record_request(&correlation_key, &user_messages, started);
        let history_text: Vec<String> = history.iter().map(|m| m.content.clone()).collect();

        let request_verdict = self.aggregator.check_request(
            intercepted.model.as_deref(),
            &history_text,
            intercepted.standard.latest_text(),
            request_id,
            started,
        );
        if !request_verdict.is_allowed {
            return Ok(InterceptOutcome::Json {
                status: request_verdict.status_code(),
                body: security_violation_envelope(&request_verdict, request_id),
                headers: HashMap::new(),
            });
        }

        let stream_requested = intercepted.standard.stream;
        let outcome = self
            .forwarder
            .forward(provider, target_url, &upstream_headers, &raw_body, stream_requested)
            .await?;

        // A streaming upstream response never reaches the response-side
        // detectors or the content masker (§4.3): there is no complete text
        // to evaluate until the client has already consumed the bytes. The
        // handle is handed straight back so the route handler can proxy it.
        let mut response = match outcome {
            ForwardOutcome::Complete(response) => response,
            ForwardOutcome::Streaming(handle) => {
                let mut headers = HashMap::new();
                headers.insert("X-Request-Id".to_string(), request_id.to_string());
                let status = handle.status();
                return Ok(InterceptOutcome::Streaming { status, stream: handle, headers });
            }
        };

        let response_verdict = self.aggregator.check_response(
            intercepted.model.as_deref(),
            &response.standard.joined_text(),
            request_id,
            now_millis(),
        );
        if !response_verdict.is_allowed {
            return Ok(InterceptOutcome::Json {
                status: response_verdict.status_code(),
                body: security_violation_envelope(&response_verdict, request_id),
                headers: HashMap::new(),
            });
        }

        if let Some(last) = response.standard.choices.first() {
            self.conversations.record_response(&correlation_key, last.message.clone(), now_millis());
        }

        let masked_count = mask_response(&mut response, provider, &self.aggregator);
        let body = response.raw_body.clone();

        let mut headers = HashMap::new();
        if masked_count > 0 {
            headers.insert("X-Content-Masked".to_string(), "true".to_string());
            headers.insert("X-Content-Mask-Count".to_string(), masked_count.to_string());
        }
        headers.insert("X-Request-Id".to_string(), request_id.to_string());
        headers.insert("X-Latency-Ms".to_string(), (now_millis() - started).to_string());

        Ok(InterceptOutcome::Json {
            status: response.status,
            body,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_ids_follow_the_req_prefix_shape() {
        let id = new_request_id();
        assert!(id.starts_with("req-"));
    }
}
