//! Conversation Tracker (C12): groups correlated requests into sessions so
//! the Aggregator's context-aware stage can reason over multi-turn history
//! (§4.12, SPEC_FULL.md §C).

use crate::types::StandardMessage;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// One tracked conversation: every message appended so far, in order.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    pub conversation_id: String,
    pub messages: Vec<StandardMessage>,
    pub last_seen_millis: i64,
}

/// Maps a correlation key — an explicit header, or a hash of client
/// address + first user message — to a [`ConversationState`]. Entries idle
/// longer than `ttl_millis` are evicted on the next `prune`.
pub struct ConversationTracker {
    ttl_millis: i64,
    conversations: RwLock<HashMap<String, ConversationState>>,
}

impl ConversationTracker {
    pub fn new(ttl_millis: i64) -> Self {
        ConversationTracker {
            ttl_millis,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    /// Derives the correlation key for a request: the explicit header if
    /// present, otherwise a hash of `client_address` + the first user
    /// message in the request.
    pub fn correlation_key(
        explicit_header: Option<&str>,
        client_address: &str,
        first_user_message: &str,
    ) -> String {
        if let Some(header) = explicit_header {
            return header.to_string();
        }
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        client_address.hash(&mut hasher);
        first_user_message.hash(&mut hasher);
        format!("fp-{:x}", hasher.finish())
    }

    /// Appends the request's user messages to the conversation, creating it
    /// on first sight, and returns the conversation's full history
    /// *before* the just-appended messages (the context the request should
    /// be checked against).
    pub fn record_request(
        &self,
        key: &str,
        user_messages: &[StandardMessage],
        now_millis: i64,
    ) -> Vec<StandardMessage> {
        let mut conversations = self.conversations.write();
        let state = conversations.entry(key.to_string()).or_insert_with(|| ConversationState {
            conversation_id: key.to_string(),
            messages: Vec::new(),
            last_seen_millis: now_millis,
        });
        let prior = state.messages.clone();
        state.messages.extend(user_messages.iter().cloned());
        state.last_seen_millis = now_millis;
        prior
    }

    /// Appends the assistant's response message once the upstream call
    /// completes.
    pub fn record_response(&self, key: &str, assistant_message: StandardMessage, now_millis: i64) {
        let mut conversations = self.conversations.write();
        if let Some(state) = conversations.get_mut(key) {
            state.messages.push(assistant_message);
            state.last_seen_millis = now_millis;
        }
    }

    pub fn get(&self, key: &str) -> Option<ConversationState> {
        self.conversations.read().get(key).cloned()
    }

    /// Evicts every conversation whose `last_seen_millis` is older than
    /// `ttl_millis`.
    pub fn prune(&self, now_millis: i64) {
        let ttl = self.ttl_millis;
        self.conversations
            .write()
            .retain(|_, state| now_millis - state.last_seen_millis <= ttl);
    }

    pub fn len(&self) -> usize {
        self.conversations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_conversation_on_first_request() {
        let tracker = ConversationTracker::new(60_000);
        let prior = tracker.record_request("k1", &[StandardMessage::new("user", "hi")], 1000);
        assert!(prior.is_empty());
        assert_eq!(tracker.get("k1").unwrap().messages.len(), 1);
    }

    #[test]
    fn second_request_sees_prior_history() {
        let tracker = ConversationTracker::new(60_000);
        tracker.record_request("k1", &[StandardMessage::new("user", "hi")], 1000);
        tracker.record_response("k1", StandardMessage::new("assistant", "hello"), 1100);
        let prior = tracker.record_request("k1", &[StandardMessage::new("user", "again")], 2000);
        assert_eq!(prior.len(), 2);
    }

    #[test]
    fn prune_evicts_idle_conversations() {
        let tracker = ConversationTracker::new(1_000);
        tracker.record_request("k1", &[StandardMessage::new("user", "hi")], 1000);
        tracker.prune(5000);
        assert!(tracker.is_empty());
    }

    #[test]
    fn correlation_key_prefers_explicit_header() {
        let key = ConversationTracker::correlation_key(Some("conv-1"), "1.2.3.4", "hi");
        assert_eq!(key, "conv-1");
    }

    #[test]
    fn correlation_key_derives_fingerprint_without_header() {
        let key = ConversationTracker::correlation_key(None, "1.2.3.4", "hi");
        assert!(key.starts_with("fp-"));
    }
}
