//! Upstream Forwarder (C9): issues the outbound call to whichever provider
//! the request targets, with a per-provider timeout, and distinguishes
//! streaming from non-streaming responses (§4.9).

use crate::errors::{BridgeError, Result};
use crate::protocol;
use crate::types::{now_millis, InterceptedResponse, ProviderTag};
use futures_util::Stream;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

/// Per-provider upstream timeout table (§6 `llmProviders: providerName →
/// {apiBase, timeout}`).
#[derive(Debug, Clone)]
pub struct ProviderEndpoint {
    pub api_base: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    endpoints: HashMap<String, ProviderEndpoint>,
    default_timeout: Duration,
}

impl ProviderRegistry {
    pub fn new(default_timeout: Duration) -> Self {
        ProviderRegistry {
            endpoints: HashMap::new(),
            default_timeout,
        }
    }

    pub fn register(&mut self, provider: impl Into<String>, endpoint: ProviderEndpoint) {
        self.endpoints.insert(provider.into(), endpoint);
    }

    pub fn endpoint(&self, provider: ProviderTag) -> Option<&ProviderEndpoint> {
        self.endpoints.get(&provider.to_string())
    }

    pub fn timeout_for(&self, provider: ProviderTag) -> Duration {
        self.endpoint(provider).map(|e| e.timeout).unwrap_or(self.default_timeout)
    }
}

/// A response that has not been fully read: the Interceptor must proxy its
/// bytes onward and release it on every exit path — client disconnect,
/// upstream error mid-stream, or normal completion (§4.9, §5 Cancellation).
/// Dropping this handle (and therefore the wrapped `reqwest::Response`)
/// closes the upstream connection exactly once, however that drop is
/// reached.
pub struct StreamHandle {
    response: reqwest::Response,
}

impl StreamHandle {
    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    pub fn into_byte_stream(self) -> impl Stream<Item = reqwest::Result<bytes::Bytes>> {
        self.response.bytes_stream()
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        tracing::debug!("releasing upstream stream handle");
    }
}

/// Outcome of one upstream call: fully read, or left open for streaming.
pub enum ForwardOutcome {
    Complete(InterceptedResponse),
    Streaming(StreamHandle),
}

pub struct UpstreamForwarder {
    client: reqwest::Client,
    registry: ProviderRegistry,
}

impl UpstreamForwarder {
    pub fn new(registry: ProviderRegistry) -> Self {
        UpstreamForwarder {
            client: reqwest::Client::new(),
            registry,
        }
    }

    /// Issues the outbound call. `target_url` is the full upstream URL to
    /// call (already resolved from the provider registry/request). Returns
    /// `BridgeError::UpstreamTimeout`/`UpstreamTransport` mapped to 504/502
    /// by the Interceptor.
    pub async fn forward(
        &self,
        provider: ProviderTag,
        target_url: &str,
        headers: &HashMap<String, String>,
        body: &Value,
        stream: bool,
    ) -> Result<ForwardOutcome> {
        let timeout = self.registry.timeout_for(provider);
        let mut request = self.client.post(target_url).json(body).timeout(timeout);
        for (key, value) in headers {
            request = request.header(key.as_str(), value.as_str());
        }

        let started = now_millis();
        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                BridgeError::UpstreamTimeout(timeout.as_millis() as u64)
            } else {
                BridgeError::UpstreamTransport(err.to_string())
            }
        })?;

        let status = response.status().as_u16();

        if stream && (provider == ProviderTag::Ollama || provider == ProviderTag::OpenAi) {
            return Ok(ForwardOutcome::Streaming(StreamHandle { response }));
        }

        let model_hint = body.get("model").and_then(|v| v.as_str());
        let raw_body: Value = response
            .json()
            .await
            .map_err(|err| BridgeError::MalformedUpstreamResponse(err.to_string()))?;
        let standard = protocol::standardize_response(provider, &raw_body, model_hint);

        Ok(ForwardOutcome::Complete(InterceptedResponse {
            status,
            raw_body,
            standard,
            latency_millis: now_millis() - started,
            is_streaming: false,
        }))
    }
}
