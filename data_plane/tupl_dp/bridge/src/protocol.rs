//! Protocol Adapter (C6): detects which LLM backend a request targets and
//! normalizes its request/response shape to/from [`StandardRequest`] /
//! [`StandardResponse`] (§4.6).
//!
//! Every `standardize_*` has a matching `adapt_*` so that
//! `standardize(adapt(x, P), P) == x` up to the documented lossy fields
//! (spec.md §8 invariant 6 / scenario S6).

use crate::errors::{BridgeError, Result};
use crate::types::{ProviderTag, StandardChoice, StandardMessage, StandardRequest, StandardResponse, StandardUsage};
use serde_json::{json, Value};

/// Detects the provider a request targets from, in order: the URL, the
/// auth header's prefix, and finally the model-name prefix table. Falls
/// back to `Custom` when nothing matches (§4.6).
pub fn detect_provider(url: &str, auth_header: Option<&str>, model: Option<&str>) -> ProviderTag {
    if let Some(tag) = detect_from_url(url) {
        return tag;
    }
    if let Some(tag) = auth_header.and_then(detect_from_auth_header) {
        return tag;
    }
    if let Some(tag) = model.and_then(detect_from_model_name) {
        return tag;
    }
    ProviderTag::Custom
}

fn detect_from_url(url: &str) -> Option<ProviderTag> {
    let url = url.to_ascii_lowercase();
    if url.contains("api.openai.com") {
        Some(ProviderTag::OpenAi)
    } else if url.contains("api.anthropic.com") {
        Some(ProviderTag::Anthropic)
    } else if url.contains("api.cohere.ai") || url.contains("api.cohere.com") {
        Some(ProviderTag::Cohere)
    } else if url.contains("huggingface.co") {
        Some(ProviderTag::HuggingFace)
    } else if url.contains("/ollama") || url.contains(":11434") {
        Some(ProviderTag::Ollama)
    } else {
        None
    }
}

fn detect_from_auth_header(header: &str) -> Option<ProviderTag> {
    if header.starts_with("sk-ant-") {
        Some(ProviderTag::Anthropic)
    } else if header.starts_with("sk-") || header.starts_with("Bearer sk-") {
        Some(ProviderTag::OpenAi)
    } else {
        None
    }
}

/// Model-name prefix table (SPEC_FULL.md §C): `gpt-*`/`o1-*`/`o3-*` →
/// openai, `claude-*` → anthropic, `command*` → cohere,
/// `llama*`/`mistral*`/`gemma*`/`phi*`/`qwen*`/`codellama*` → ollama, an
/// `org/model` slug with no other match → huggingface.
pub fn detect_from_model_name(model: &str) -> Option<ProviderTag> {
    let m = model.to_ascii_lowercase();
    const OLLAMA_PREFIXES: &[&str] = &["llama", "mistral", "gemma", "phi", "qwen", "codellama"];

    if m.starts_with("gpt-") || m.starts_with("o1-") || m.starts_with("o3-") {
        Some(ProviderTag::OpenAi)
    } else if m.starts_with("claude-") {
        Some(ProviderTag::Anthropic)
    } else if m.starts_with("command") {
        Some(ProviderTag::Cohere)
    } else if OLLAMA_PREFIXES.iter().any(|p| m.starts_with(p)) {
        Some(ProviderTag::Ollama)
    } else if m.contains('/') {
        Some(ProviderTag::HuggingFace)
    } else {
        None
    }
}

/// Normalizes a provider's raw request JSON into canonical form.
pub fn standardize_request(provider: ProviderTag, body: &Value) -> Result<StandardRequest> {
    match provider {
        ProviderTag::OpenAi | ProviderTag::Ollama => standardize_openai_shaped(provider, body),
        ProviderTag::Anthropic => standardize_anthropic(body),
        ProviderTag::Cohere => standardize_cohere(body),
        ProviderTag::HuggingFace => standardize_huggingface(body),
        ProviderTag::Custom => standardize_openai_shaped(provider, body),
    }
}

/// Re-renders a canonical request back into `provider`'s wire shape.
pub fn adapt_request(req: &StandardRequest, provider: ProviderTag) -> Value {
    match provider {
        ProviderTag::OpenAi | ProviderTag::Ollama | ProviderTag::Custom => {
            adapt_openai_shaped(req)
        }
        ProviderTag::Anthropic => adapt_anthropic(req),
        ProviderTag::Cohere => adapt_cohere(req),
        ProviderTag::HuggingFace => adapt_huggingface(req),
    }
}

fn metadata_with_protocol(provider: ProviderTag) -> std::collections::HashMap<String, Value> {
    let mut metadata = std::collections::HashMap::new();
    metadata.insert("originalProtocol".to_string(), json!(provider.to_string()));
    metadata
}

// ---------------------------------------------------------------------
// OpenAI / Ollama: `messages[]` passes through unchanged.
// ---------------------------------------------------------------------

fn standardize_openai_shaped(provider: ProviderTag, body: &Value) -> Result<StandardRequest> {
    let messages = body
        .get("messages")
        .and_then(|v| v.as_array())
        .ok_or_else(|| BridgeError::InvalidBody("missing messages[] array".to_string()))?
        .iter()
        .map(message_from_openai)
        .collect::<Result<Vec<_>>>()?;

    Ok(StandardRequest {
        model: body.get("model").and_then(|v| v.as_str()).map(String::from),
        messages,
        temperature: body.get("temperature").and_then(|v| v.as_f64()).unwrap_or(1.0),
        max_tokens: body
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .map(|n| n as u32),
        top_p: body.get("top_p").and_then(|v| v.as_f64()).unwrap_or(1.0),
        frequency_penalty: body.get("frequency_penalty").and_then(|v| v.as_f64()).unwrap_or(0.0),
        presence_penalty: body.get("presence_penalty").and_then(|v| v.as_f64()).unwrap_or(0.0),
        stop: stop_sequences(body),
        stream: body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false),
        user: body.get("user").and_then(|v| v.as_str()).map(String::from),
        metadata: metadata_with_protocol(provider),
    })
}

fn message_from_openai(v: &Value) -> Result<StandardMessage> {
    let role = v
        .get("role")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BridgeError::InvalidBody("message missing role".to_string()))?
        .to_string();
    let content = v.get("content").and_then(|v| v.as_str()).unwrap_or("").to_string();
    let name = v.get("name").and_then(|v| v.as_str()).map(String::from);
    Ok(StandardMessage { role, content, name })
}

fn adapt_openai_shaped(req: &StandardRequest) -> Value {
    let messages: Vec<Value> = req
        .messages
        .iter()
        .map(|m| {
            let mut obj = json!({"role": m.role, "content": m.content});
            if let Some(name) = &m.name {
                obj["name"] = json!(name);
            }
            obj
        })
        .collect();

    let mut body = json!({
        "model": req.model,
        "messages": messages,
        "temperature": req.temperature,
        "top_p": req.top_p,
        "frequency_penalty": req.frequency_penalty,
        "presence_penalty": req.presence_penalty,
        "stream": req.stream,
    });
    if let Some(max_tokens) = req.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    if let Some(stop) = &req.stop {
        body["stop"] = json!(stop);
    }
    if let Some(user) = &req.user {
        body["user"] = json!(user);
    }
    body
}

fn stop_sequences(body: &Value) -> Option<Vec<String>> {
    match body.get("stop") {
        Some(Value::String(s)) => Some(vec![s.clone()]),
        Some(Value::Array(arr)) => Some(
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect(),
        ),
        _ => None,
    }
}

// ---------------------------------------------------------------------
// Anthropic: `prompt` is split on "\n\nHuman:" / "\n\nAssistant:";
// `system` is its own field.
// ---------------------------------------------------------------------

fn standardize_anthropic(body: &Value) -> Result<StandardRequest> {
    let mut messages = Vec::new();
    if let Some(system) = body.get("system").and_then(|v| v.as_str()) {
        if !system.is_empty() {
            messages.push(StandardMessage::new("system", system));
        }
    }

    let prompt = body
        .get("prompt")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BridgeError::InvalidBody("missing prompt".to_string()))?;
    messages.extend(split_anthropic_prompt(prompt));

    Ok(StandardRequest {
        model: body.get("model").and_then(|v| v.as_str()).map(String::from),
        messages,
        temperature: body.get("temperature").and_then(|v| v.as_f64()).unwrap_or(1.0),
        max_tokens: body
            .get("max_tokens_to_sample")
            .and_then(|v| v.as_u64())
            .map(|n| n as u32),
        top_p: body.get("top_p").and_then(|v| v.as_f64()).unwrap_or(1.0),
        frequency_penalty: 0.0,
        presence_penalty: 0.0,
        stop: stop_sequences(body),
        stream: body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false),
        user: None,
        metadata: metadata_with_protocol(ProviderTag::Anthropic),
    })
}

/// Splits an Anthropic-style `"\n\nHuman: ...\n\nAssistant: ..."` prompt
/// into alternating user/assistant messages.
fn split_anthropic_prompt(prompt: &str) -> Vec<StandardMessage> {
    let mut messages = Vec::new();
    let mut rest = prompt;
    loop {
        let human_at = rest.find("\n\nHuman:");
        let assistant_at = rest.find("\n\nAssistant:");
        let (role, marker_len, pos) = match (human_at, assistant_at) {
            (Some(h), Some(a)) if h < a => ("user", "\n\nHuman:".len(), h),
            (Some(h), None) => ("user", "\n\nHuman:".len(), h),
            (_, Some(a)) => ("assistant", "\n\nAssistant:".len(), a),
            (None, None) => break,
        };
        rest = &rest[pos + marker_len..];
        let next_marker = [rest.find("\n\nHuman:"), rest.find("\n\nAssistant:")]
            .into_iter()
            .flatten()
            .min();
        let (content, remainder) = match next_marker {
            Some(n) => (rest[..n].trim(), &rest[n..]),
            None => (rest.trim(), ""),
        };
        if !content.is_empty() {
            messages.push(StandardMessage::new(role, content));
        }
        rest = remainder;
        if rest.is_empty() {
            break;
        }
    }
    messages
}

fn adapt_anthropic(req: &StandardRequest) -> Value {
    let system: Vec<&str> = req
        .messages
        .iter()
        .filter(|m| m.role == "system")
        .map(|m| m.content.as_str())
        .collect();

    let mut prompt = String::new();
    for m in req.messages.iter().filter(|m| m.role != "system") {
        match m.role.as_str() {
            "assistant" => prompt.push_str(&format!("\n\nAssistant: {}", m.content)),
            _ => prompt.push_str(&format!("\n\nHuman: {}", m.content)),
        }
    }
    prompt.push_str("\n\nAssistant:");

    let mut body = json!({
        "model": req.model,
        "prompt": prompt,
        "temperature": req.temperature,
        "top_p": req.top_p,
        "stream": req.stream,
        "max_tokens_to_sample": req.max_tokens.unwrap_or(256),
    });
    if !system.is_empty() {
        body["system"] = json!(system.join("\n\n"));
    }
    if let Some(stop) = &req.stop {
        body["stop_sequences"] = json!(stop);
    }
    body
}

// ---------------------------------------------------------------------
// Cohere: `chat_history` + `message`, roles USER/CHATBOT.
// ---------------------------------------------------------------------

fn standardize_cohere(body: &Value) -> Result<StandardRequest> {
    let mut messages: Vec<StandardMessage> = body
        .get("chat_history")
        .and_then(|v| v.as_array())
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let role = entry.get("role").and_then(|v| v.as_str())?;
            let content = entry.get("message").and_then(|v| v.as_str())?;
            let role = cohere_role_to_standard(role);
            Some(StandardMessage::new(role, content))
        })
        .collect();

    let message = body
        .get("message")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BridgeError::InvalidBody("missing message".to_string()))?;
    messages.push(StandardMessage::new("user", message));

    Ok(StandardRequest {
        model: body.get("model").and_then(|v| v.as_str()).map(String::from),
        messages,
        temperature: body.get("temperature").and_then(|v| v.as_f64()).unwrap_or(1.0),
        max_tokens: body
            .get("max_tokens")
            .and_then(|v| v.as_u64())
            .map(|n| n as u32),
        top_p: body.get("p").and_then(|v| v.as_f64()).unwrap_or(1.0),
        frequency_penalty: body.get("frequency_penalty").and_then(|v| v.as_f64()).unwrap_or(0.0),
        presence_penalty: body.get("presence_penalty").and_then(|v| v.as_f64()).unwrap_or(0.0),
        stop: stop_sequences(body),
        stream: body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false),
        user: None,
        metadata: metadata_with_protocol(ProviderTag::Cohere),
    })
}

fn cohere_role_to_standard(role: &str) -> &'static str {
    match role.to_ascii_uppercase().as_str() {
        "CHATBOT" => "assistant",
        "SYSTEM" => "system",
        _ => "user",
    }
}

fn standard_role_to_cohere(role: &str) -> &'static str {
    match role {
        "assistant" => "CHATBOT",
        "system" => "SYSTEM",
        _ => "USER",
    }
}

fn adapt_cohere(req: &StandardRequest) -> Value {
    let (history, last) = req.messages.split_at(req.messages.len().saturating_sub(1));
    let chat_history: Vec<Value> = history
        .iter()
        .map(|m| json!({"role": standard_role_to_cohere(&m.role), "message": m.content}))
        .collect();
    let message = last.first().map(|m| m.content.as_str()).unwrap_or("");

    json!({
        "model": req.model,
        "chat_history": chat_history,
        "message": message,
        "temperature": req.temperature,
        "p": req.top_p,
        "frequency_penalty": req.frequency_penalty,
        "presence_penalty": req.presence_penalty,
        "stream": req.stream,
    })
}

// ---------------------------------------------------------------------
// HuggingFace: flat `inputs` becomes a single user message.
// ---------------------------------------------------------------------

fn standardize_huggingface(body: &Value) -> Result<StandardRequest> {
    let inputs = body
        .get("inputs")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BridgeError::InvalidBody("missing inputs".to_string()))?;

    let params = body.get("parameters");
    Ok(StandardRequest {
        model: body.get("model").and_then(|v| v.as_str()).map(String::from),
        messages: vec![StandardMessage::new("user", inputs)],
        temperature: params
            .and_then(|p| p.get("temperature"))
            .and_then(|v| v.as_f64())
            .unwrap_or(1.0),
        max_tokens: params
            .and_then(|p| p.get("max_new_tokens"))
            .and_then(|v| v.as_u64())
            .map(|n| n as u32),
        top_p: params.and_then(|p| p.get("top_p")).and_then(|v| v.as_f64()).unwrap_or(1.0),
        frequency_penalty: 0.0,
        presence_penalty: 0.0,
        stop: None,
        stream: body.get("stream").and_then(|v| v.as_bool()).unwrap_or(false),
        user: None,
        metadata: metadata_with_protocol(ProviderTag::HuggingFace),
    })
}

fn adapt_huggingface(req: &StandardRequest) -> Value {
    let inputs = req.latest_text().to_string();
    json!({
        "model": req.model,
        "inputs": inputs,
        "parameters": {
            "temperature": req.temperature,
            "top_p": req.top_p,
            "max_new_tokens": req.max_tokens,
        },
        "stream": req.stream,
    })
}

/// Normalizes a provider's raw response JSON into canonical form. Used by
/// the Forwarder after a non-streaming upstream call returns.
pub fn standardize_response(provider: ProviderTag, body: &Value, model_hint: Option<&str>) -> StandardResponse {
    match provider {
        ProviderTag::OpenAi | ProviderTag::Ollama | ProviderTag::Custom => {
            standardize_openai_response(body, model_hint)
        }
        ProviderTag::Anthropic => standardize_anthropic_response(body, model_hint),
        ProviderTag::Cohere => standardize_cohere_response(body, model_hint),
        ProviderTag::HuggingFace => standardize_huggingface_response(body, model_hint),
    }
}

fn standardize_openai_response(body: &Value, model_hint: Option<&str>) -> StandardResponse {
    let choices = body
        .get("choices")
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .enumerate()
                .map(|(i, c)| {
                    let content = c
                        .get("message")
                        .and_then(|m| m.get("content"))
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    StandardChoice {
                        index: i as u32,
                        message: StandardMessage::new("assistant", content),
                        finish_reason: c.get("finish_reason").and_then(|v| v.as_str()).map(String::from),
                    }
                })
                .collect()
        })
        .unwrap_or_else(|| {
            // Ollama's /api/chat shape: a single top-level `message`.
            let content = body
                .get("message")
                .and_then(|m| m.get("content"))
                .and_then(|v| v.as_str())
                .unwrap_or("");
            vec![StandardChoice {
                index: 0,
                message: StandardMessage::new("assistant", content),
                finish_reason: None,
            }]
        });

    StandardResponse {
        id: body.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        model: body
            .get("model")
            .and_then(|v| v.as_str())
            .or(model_hint)
            .unwrap_or_default()
            .to_string(),
        choices,
        usage: usage_from_openai(body),
        created: body.get("created").and_then(|v| v.as_i64()).unwrap_or(0),
        metadata: metadata_with_protocol(ProviderTag::OpenAi),
    }
}

fn usage_from_openai(body: &Value) -> StandardUsage {
    let usage = body.get("usage");
    StandardUsage {
        prompt_tokens: usage
            .and_then(|u| u.get("prompt_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        completion_tokens: usage
            .and_then(|u| u.get("completion_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
        total_tokens: usage
            .and_then(|u| u.get("total_tokens"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32,
    }
}

fn standardize_anthropic_response(body: &Value, model_hint: Option<&str>) -> StandardResponse {
    let content = body
        .get("content")
        .and_then(|v| v.as_array())
        .map(|blocks| {
            blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(|v| v.as_str()))
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    let input_tokens = body
        .get("usage")
        .and_then(|u| u.get("input_tokens"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    let output_tokens = body
        .get("usage")
        .and_then(|u| u.get("output_tokens"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;

    StandardResponse {
        id: body.get("id").and_then(|v| v.as_str()).unwrap_or_default().to_string(),
        model: body
            .get("model")
            .and_then(|v| v.as_str())
            .or(model_hint)
            .unwrap_or_default()
            .to_string(),
        choices: vec![StandardChoice {
            index: 0,
            message: StandardMessage::new("assistant", content),
            finish_reason: body.get("stop_reason").and_then(|v| v.as_str()).map(String::from),
        }],
        usage: StandardUsage {
            prompt_tokens: input_tokens,
            completion_tokens: output_tokens,
            total_tokens: input_tokens + output_tokens,
        },
        created: 0,
        metadata: metadata_with_protocol(ProviderTag::Anthropic),
    }
}

fn standardize_cohere_response(body: &Value, model_hint: Option<&str>) -> StandardResponse {
    let text = body.get("text").and_then(|v| v.as_str()).unwrap_or_default();
    StandardResponse {
        id: body
            .get("generation_id")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string(),
        model: model_hint.unwrap_or_default().to_string(),
        choices: vec![StandardChoice {
            index: 0,
            message: StandardMessage::new("assistant", text),
            finish_reason: body.get("finish_reason").and_then(|v| v.as_str()).map(String::from),
        }],
        usage: StandardUsage::default(),
        created: 0,
        metadata: metadata_with_protocol(ProviderTag::Cohere),
    }
}

fn standardize_huggingface_response(body: &Value, model_hint: Option<&str>) -> StandardResponse {
    // HuggingFace text-generation returns either a single object or an array.
    let text = body
        .as_array()
        .and_then(|arr| arr.first())
        .unwrap_or(body)
        .get("generated_text")
        .and_then(|v| v.as_str())
        .unwrap_or_default();

    StandardResponse {
        id: String::new(),
        model: model_hint.unwrap_or_default().to_string(),
        choices: vec![StandardChoice {
            index: 0,
            message: StandardMessage::new("assistant", text),
            finish_reason: None,
        }],
        usage: StandardUsage::default(),
        created: 0,
        metadata: metadata_with_protocol(ProviderTag::HuggingFace),
    }
}

/// Writes `masked_text` back into `raw_body` at the position the response
/// text came from, per provider shape (§4.5 "protocol-aware"). Only the
/// first choice/block is rewritten: the Content Masker operates on whole
/// responses one choice at a time, and every supported provider's
/// non-streaming shape carries exactly one completion in the scenarios this
/// gateway forwards.
pub fn patch_response_text(provider: ProviderTag, raw_body: &mut Value, masked_text: &str) {
    match provider {
        ProviderTag::OpenAi | ProviderTag::Custom => {
            if let Some(content) = raw_body.pointer_mut("/choices/0/message/content") {
                *content = json!(masked_text);
            }
        }
        ProviderTag::Ollama => {
            if let Some(content) = raw_body.pointer_mut("/message/content") {
                *content = json!(masked_text);
            } else if let Some(content) = raw_body.pointer_mut("/choices/0/message/content") {
                *content = json!(masked_text);
            }
        }
        ProviderTag::Anthropic => {
            if let Some(text) = raw_body.pointer_mut("/content/0/text") {
                *text = json!(masked_text);
            }
        }
        ProviderTag::Cohere => {
            if let Some(text) = raw_body.pointer_mut("/text") {
                *text = json!(masked_text);
            }
        }
        ProviderTag::HuggingFace => {
            if raw_body.is_array() {
                if let Some(text) = raw_body.pointer_mut("/0/generated_text") {
                    *text = json!(masked_text);
                }
            } else if let Some(text) = raw_body.pointer_mut("/generated_text") {
                *text = json!(masked_text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_openai_from_model_prefix() {
        assert_eq!(detect_provider("", None, Some("gpt-4")), ProviderTag::OpenAi);
        assert_eq!(detect_provider("", None, Some("o1-preview")), ProviderTag::OpenAi);
    }

    #[test]
    fn detects_anthropic_from_model_prefix() {
        assert_eq!(detect_provider("", None, Some("claude-3-opus")), ProviderTag::Anthropic);
    }

    #[test]
    fn detects_ollama_from_model_prefix() {
        for m in ["llama2", "mistral-7b", "gemma:2b", "qwen2", "codellama"] {
            assert_eq!(detect_provider("", None, Some(m)), ProviderTag::Ollama, "model={m}");
        }
    }

    #[test]
    fn detects_huggingface_from_org_slug() {
        assert_eq!(
            detect_provider("", None, Some("meta-llama-research/unusual-name")),
            ProviderTag::HuggingFace
        );
    }

    #[test]
    fn falls_back_to_custom() {
        assert_eq!(detect_provider("https://my-llm.internal/v1/chat", None, Some("foo")), ProviderTag::Custom);
    }

    #[test]
    fn url_takes_precedence_over_model_prefix() {
        assert_eq!(
            detect_provider("https://api.anthropic.com/v1/complete", None, Some("gpt-4")),
            ProviderTag::Anthropic
        );
    }

    #[test]
    fn anthropic_round_trip_preserves_system_and_human_turn() {
        let body = json!({
            "model": "claude-2",
            "system": "S",
            "prompt": "\n\nHuman: H\n\nAssistant:",
        });
        let standard = standardize_anthropic(&body).unwrap();
        assert_eq!(standard.messages[0], StandardMessage::new("system", "S"));
        assert_eq!(standard.messages[1], StandardMessage::new("user", "H"));

        let adapted = adapt_anthropic(&standard);
        assert!(adapted["prompt"].as_str().unwrap().contains("\n\nHuman: H"));
        assert!(adapted["prompt"].as_str().unwrap().ends_with("\n\nAssistant:"));
        assert_eq!(adapted["system"], json!("S"));
    }

    #[test]
    fn openai_round_trip_preserves_messages() {
        let body = json!({
            "model": "gpt-4",
            "messages": [{"role": "user", "content": "hi"}],
            "temperature": 0.5,
        });
        let standard = standardize_openai_shaped(ProviderTag::OpenAi, &body).unwrap();
        assert_eq!(standard.messages.len(), 1);
        assert_eq!(standard.temperature, 0.5);

        let adapted = adapt_openai_shaped(&standard);
        assert_eq!(adapted["messages"][0]["content"], json!("hi"));
        assert_eq!(adapted["temperature"], json!(0.5));
    }

    #[test]
    fn cohere_chat_history_role_translation_round_trips() {
        let body = json!({
            "model": "command",
            "chat_history": [{"role": "USER", "message": "hi"}, {"role": "CHATBOT", "message": "hello"}],
            "message": "how are you",
        });
        let standard = standardize_cohere(&body).unwrap();
        assert_eq!(standard.messages[0].role, "user");
        assert_eq!(standard.messages[1].role, "assistant");
        assert_eq!(standard.messages.last().unwrap().content, "how are you");

        let adapted = adapt_cohere(&standard);
        assert_eq!(adapted["chat_history"][1]["role"], json!("CHATBOT"));
        assert_eq!(adapted["message"], json!("how are you"));
    }

    #[test]
    fn huggingface_flat_input_becomes_single_user_message() {
        let body = json!({"inputs": "translate this"});
        let standard = standardize_huggingface(&body).unwrap();
        assert_eq!(standard.messages.len(), 1);
        assert_eq!(standard.messages[0].role, "user");
        assert_eq!(standard.messages[0].content, "translate this");
    }

    #[test]
    fn standardizes_ollama_chat_response_shape() {
        let body = json!({"message": {"content": "hi there"}});
        let response = standardize_response(ProviderTag::Ollama, &body, Some("llama2"));
        assert_eq!(response.choices[0].message.content, "hi there");
    }

    #[test]
    fn patches_masked_text_back_into_ollama_shape() {
        let mut body = json!({"message": {"content": "Your card is 4111111111111111 OK"}});
        patch_response_text(ProviderTag::Ollama, &mut body, "Your card is 4111********1111 OK");
        assert_eq!(body["message"]["content"], json!("Your card is 4111********1111 OK"));
    }
}
