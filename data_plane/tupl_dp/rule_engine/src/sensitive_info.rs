//! `SensitiveInfoDetector` is the one family that returns every hit across
//! types rather than stopping at the first (§4.2): callers pick the first
//! to decide allow/deny, but the full list drives the Content Masker (C5).

use crate::detection_kind::{DetectionKind, Severity};
use crate::pattern::CompiledPattern;
use crate::rule_metadata::{DetectionDetails, DetectionResult};
use serde::{Deserialize, Serialize};

/// The category a sensitive-info pattern belongs to; also the masking
/// strategy key used by C5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SensitiveInfoKind {
    CreditCard,
    Ssn,
    Email,
    Phone,
    ApiKey,
    IdCard,
    Other,
}

impl SensitiveInfoKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SensitiveInfoKind::CreditCard => "creditCard",
            SensitiveInfoKind::Ssn => "ssn",
            SensitiveInfoKind::Email => "email",
            SensitiveInfoKind::Phone => "phone",
            SensitiveInfoKind::ApiKey => "apiKey",
            SensitiveInfoKind::IdCard => "idCard",
            SensitiveInfoKind::Other => "other",
        }
    }
}

/// A single hit produced by [`SensitiveInfoFamily::evaluate_all`]: the
/// category, the byte offset range within the scanned text, and the
/// matched substring, used both for the [`DetectionResult`] and for
/// reverse-offset masking in C5.
#[derive(Debug, Clone)]
pub struct SensitiveHit {
    pub kind: SensitiveInfoKind,
    pub start: usize,
    pub end: usize,
    pub matched_text: String,
    pub pattern_source: String,
}

/// One compiled pattern group per [`SensitiveInfoKind`].
#[derive(Debug, Clone)]
pub struct SensitiveInfoFamily {
    patterns: Vec<(SensitiveInfoKind, Vec<CompiledPattern>)>,
}

impl SensitiveInfoFamily {
    pub fn new(patterns: Vec<(SensitiveInfoKind, Vec<CompiledPattern>)>) -> Self {
        SensitiveInfoFamily { patterns }
    }

    /// Returns every match across every category, in the order categories
    /// were registered, each category's matches in text order.
    pub fn evaluate_all(&self, text: &str) -> Vec<SensitiveHit> {
        let mut hits = Vec::new();
        for (kind, compiled) in &self.patterns {
            for pattern in compiled {
                for m in pattern.regex.find_iter(text) {
                    hits.push(SensitiveHit {
                        kind: *kind,
                        start: m.start(),
                        end: m.end(),
                        matched_text: m.as_str().to_string(),
                        pattern_source: pattern.source.clone(),
                    });
                }
            }
        }
        hits
    }

    /// Detector-family-shaped entry point used by the Aggregator: returns
    /// a list of [`DetectionResult`]s, one per hit, preserving §4.2's
    /// contract that sensitive-info detection yields a list rather than a
    /// single first-match verdict.
    pub fn evaluate(&self, text: &str) -> Vec<DetectionResult> {
        self.evaluate_all(text)
            .into_iter()
            .map(|hit| DetectionResult {
                is_allowed: false,
                detection_kind: Some(DetectionKind::SensitiveInfo),
                severity: Some(Severity::High),
                reason: Some(format!(
                    "Detected sensitive information: {}",
                    hit.kind.as_str()
                )),
                details: DetectionDetails {
                    rule_id: None,
                    rule_name: None,
                    matched_pattern: Some(hit.pattern_source.clone()),
                    matched_text: Some(hit.matched_text.clone()),
                    matched_keyword: None,
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pattern::compile_pattern;

    fn credit_card_family() -> SensitiveInfoFamily {
        let pattern = compile_pattern(
            r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14})\b",
        );
        SensitiveInfoFamily::new(vec![(SensitiveInfoKind::CreditCard, vec![pattern])])
    }

    #[test]
    fn finds_credit_card_number() {
        let family = credit_card_family();
        let hits = family.evaluate_all("Your card is 4111111111111111 OK");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, SensitiveInfoKind::CreditCard);
        assert_eq!(hits[0].matched_text, "4111111111111111");
    }

    #[test]
    fn no_hits_on_benign_text() {
        let family = credit_card_family();
        assert!(family.evaluate_all("hello there").is_empty());
    }
}
