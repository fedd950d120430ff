//! Core rule and detection-result types.
//!
//! `SecurityRule` is immutable once loaded: patterns and keywords are
//! compiled exactly once by the Rule Store, never mutated after
//! publication (Design Note: "Regex pre-compilation stored on mutable rule
//! objects → construct compiled rules in the Rule Store").

use crate::detection_kind::{DetectionKind, Severity};
use crate::pattern::{compile_keyword, compile_pattern, CompiledKeyword, CompiledPattern};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a rule, authored by whoever defines the rule
/// (e.g. `"pi-001"`), not generated. Unique per family, not globally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(String);

impl RuleId {
    pub fn new(id: impl Into<String>) -> Self {
        RuleId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        RuleId(s.to_string())
    }
}

/// On-disk representation of a rule, as authored by an operator or written
/// by the Rule Store's default-rule seeding. Patterns are plain strings;
/// compilation happens when this is loaded into a [`SecurityRule`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub detection_kind: DetectionKind,
    pub severity: Severity,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub block: bool,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub categories: Vec<String>,
}

fn default_true() -> bool {
    true
}

/// A fully loaded, immutable rule: every pattern and keyword has a
/// corresponding compiled regex (`len(compiledPatterns) == len(patterns)`,
/// invariant 2 of spec.md §8).
#[derive(Debug, Clone)]
pub struct SecurityRule {
    pub id: RuleId,
    pub name: String,
    pub description: String,
    pub detection_kind: DetectionKind,
    pub severity: Severity,
    pub patterns: Vec<String>,
    pub keywords: Vec<String>,
    pub enabled: bool,
    pub block: bool,
    pub priority: u32,
    pub categories: Vec<String>,
    pub compiled_patterns: Vec<CompiledPattern>,
    pub compiled_keyword_patterns: Vec<CompiledKeyword>,
}

impl SecurityRule {
    /// Compiles a [`RuleDefinition`] into a [`SecurityRule`]. This is the
    /// only place patterns are compiled; the result is never re-mutated.
    pub fn compile(def: RuleDefinition) -> Self {
        let compiled_patterns = def.patterns.iter().map(|p| compile_pattern(p)).collect();
        let compiled_keyword_patterns = def.keywords.iter().map(|k| compile_keyword(k)).collect();

        SecurityRule {
            id: RuleId::new(def.id),
            name: def.name,
            description: def.description,
            detection_kind: def.detection_kind,
            severity: def.severity,
            patterns: def.patterns,
            keywords: def.keywords,
            enabled: def.enabled,
            block: def.block,
            priority: def.priority,
            categories: def.categories,
            compiled_patterns,
            compiled_keyword_patterns,
        }
    }

    pub fn builder(id: impl Into<String>, kind: DetectionKind) -> SecurityRuleBuilder {
        SecurityRuleBuilder::new(id, kind)
    }

    pub fn to_definition(&self) -> RuleDefinition {
        RuleDefinition {
            id: self.id.as_str().to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            detection_kind: self.detection_kind,
            severity: self.severity,
            patterns: self.patterns.clone(),
            keywords: self.keywords.clone(),
            enabled: self.enabled,
            block: self.block,
            priority: self.priority,
            categories: self.categories.clone(),
        }
    }
}

/// Builder for [`SecurityRule`], used by default-rule seeding and by
/// operator-facing rule creation (C4's CRUD). Compilation happens in
/// [`SecurityRuleBuilder::build`], never later.
pub struct SecurityRuleBuilder {
    def: RuleDefinition,
}

impl SecurityRuleBuilder {
    pub fn new(id: impl Into<String>, kind: DetectionKind) -> Self {
        SecurityRuleBuilder {
            def: RuleDefinition {
                id: id.into(),
                name: String::new(),
                description: String::new(),
                detection_kind: kind,
                severity: Severity::Medium,
                patterns: Vec::new(),
                keywords: Vec::new(),
                enabled: true,
                block: true,
                priority: 0,
                categories: Vec::new(),
            },
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.def.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.def.description = description.into();
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.def.severity = severity;
        self
    }

    pub fn patterns(mut self, patterns: Vec<String>) -> Self {
        self.def.patterns = patterns;
        self
    }

    pub fn keywords(mut self, keywords: Vec<String>) -> Self {
        self.def.keywords = keywords;
        self
    }

    pub fn priority(mut self, priority: u32) -> Self {
        self.def.priority = priority;
        self
    }

    pub fn categories(mut self, categories: Vec<String>) -> Self {
        self.def.categories = categories;
        self
    }

    pub fn block(mut self, block: bool) -> Self {
        self.def.block = block;
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.def.enabled = enabled;
        self
    }

    pub fn build(self) -> SecurityRule {
        SecurityRule::compile(self.def)
    }
}

/// Details attached to a [`DetectionResult`], naming exactly what matched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectionDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_keyword: Option<String>,
}

/// The verdict returned by every detector family and by the Aggregator.
/// `isAllowed == false` always carries `detection_kind` and `reason` set
/// (spec.md §3 invariant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    pub is_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detection_kind: Option<DetectionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default)]
    pub details: DetectionDetails,
}

impl DetectionResult {
    pub fn allowed() -> Self {
        DetectionResult {
            is_allowed: true,
            detection_kind: None,
            severity: None,
            reason: None,
            details: DetectionDetails::default(),
        }
    }

    pub fn status_code(&self) -> u16 {
        if self.is_allowed {
            200
        } else {
            403
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_compiles_matching_pattern_count() {
        let rule = SecurityRule::builder("jb-001", DetectionKind::Jailbreak)
            .name("DAN jailbreak")
            .severity(Severity::Critical)
            .patterns(vec![r"you are now DAN".to_string()])
            .keywords(vec!["DAN".to_string(), "Do Anything Now".to_string()])
            .priority(5)
            .build();

        assert_eq!(rule.compiled_patterns.len(), rule.patterns.len());
        assert_eq!(
            rule.compiled_keyword_patterns.len(),
            rule.keywords.len()
        );
    }

    #[test]
    fn allowed_result_has_no_kind_or_reason() {
        let result = DetectionResult::allowed();
        assert!(result.is_allowed);
        assert!(result.detection_kind.is_none());
    }
}
