//! Content Masker (C5): redacts sensitive-info hits in the response body
//! after the Aggregator has allowed it through (§4.5). Sensitive-info hits
//! never block on the response side (see [`crate::aggregator::Aggregator::check_response`]);
//! this is where they actually get acted on.

use crate::aggregator::Aggregator;
use crate::protocol::patch_response_text;
use crate::types::{InterceptedResponse, ProviderTag};
use rule_engine::mask_all;

/// Masks every choice's text in `response`, writing the masked text back
/// into both `standard.choices` and `raw_body` (protocol-aware, §4.5).
/// Returns the total number of hits masked across every choice.
pub fn mask_response(response: &mut InterceptedResponse, provider: ProviderTag, aggregator: &Aggregator) -> usize {
    let mut total_hits = 0;
    for choice in &mut response.standard.choices {
        let hits = aggregator.sensitive_info_hits(&choice.message.content);
        if hits.is_empty() {
            continue;
        }
        total_hits += hits.len();
        let masked = mask_all(&choice.message.content, &hits);
        choice.message.content = masked.clone();
        patch_response_text(provider, &mut response.raw_body, &masked);
    }
    total_hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StandardChoice, StandardMessage, StandardResponse, StandardUsage};
    use rule_engine::{EventLogger, ModelRuleManager, RuleStore};
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_aggregator() -> (Aggregator, tempfile::TempDir, tempfile::TempDir) {
        let rules_dir = tempdir().unwrap();
        let events_dir = tempdir().unwrap();
        let rule_store = Arc::new(RuleStore::load(rules_dir.path()).unwrap());
        let model_rules = Arc::new(ModelRuleManager::new());
        let events = Arc::new(EventLogger::load(events_dir.path().join("events.json")).unwrap());
        let aggregator = Aggregator::new(rule_store, model_rules, events, Default::default());
        (aggregator, rules_dir, events_dir)
    }

    #[test]
    fn masks_credit_card_in_ollama_shaped_response() {
        let (aggregator, _r, _e) = test_aggregator();
        let mut response = InterceptedResponse {
            status: 200,
            raw_body: json!({"message": {"content": "Your card is 4111111111111111 OK"}}),
            standard: StandardResponse {
                id: String::new(),
                model: "llama2".to_string(),
                choices: vec![StandardChoice {
                    index: 0,
                    message: StandardMessage::new("assistant", "Your card is 4111111111111111 OK"),
                    finish_reason: None,
                }],
                usage: StandardUsage::default(),
                created: 0,
                metadata: Default::default(),
            },
            latency_millis: 5,
            is_streaming: false,
        };

        let count = mask_response(&mut response, ProviderTag::Ollama, &aggregator);

        assert_eq!(count, 1);
        assert_eq!(response.standard.choices[0].message.content, "Your card is 4111********1111 OK");
        assert_eq!(response.raw_body["message"]["content"], json!("Your card is 4111********1111 OK"));
    }

    #[test]
    fn leaves_benign_response_untouched() {
        let (aggregator, _r, _e) = test_aggregator();
        let mut response = InterceptedResponse {
            status: 200,
            raw_body: json!({"message": {"content": "Paris is the capital of France"}}),
            standard: StandardResponse {
                id: String::new(),
                model: "llama2".to_string(),
                choices: vec![StandardChoice {
                    index: 0,
                    message: StandardMessage::new("assistant", "Paris is the capital of France"),
                    finish_reason: None,
                }],
                usage: StandardUsage::default(),
                created: 0,
                metadata: Default::default(),
            },
            latency_millis: 5,
            is_streaming: false,
        };

        let count = mask_response(&mut response, ProviderTag::Ollama, &aggregator);
        assert_eq!(count, 0);
    }
}
