//! The closed set of detection families the rule engine evaluates.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One detection family. Each kind owns an independently loaded, ordered
/// rule set and is evaluated in the fixed order the Aggregator Detector
/// defines for the request and response stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DetectionKind {
    PromptInjection,
    Jailbreak,
    RolePlay,
    SensitiveInfo,
    HarmfulContent,
    ComplianceViolation,
    Custom,
}

impl DetectionKind {
    pub fn all() -> &'static [DetectionKind] {
        &[
            DetectionKind::PromptInjection,
            DetectionKind::Jailbreak,
            DetectionKind::RolePlay,
            DetectionKind::SensitiveInfo,
            DetectionKind::HarmfulContent,
            DetectionKind::ComplianceViolation,
            DetectionKind::Custom,
        ]
    }

    /// The set of kinds that count toward a model's security score (§4.4).
    pub fn critical_set() -> &'static [DetectionKind] {
        &[
            DetectionKind::PromptInjection,
            DetectionKind::Jailbreak,
            DetectionKind::HarmfulContent,
            DetectionKind::SensitiveInfo,
        ]
    }

    /// File stem under `<dataDir>/rules/` this family is persisted to.
    pub fn file_stem(self) -> &'static str {
        match self {
            DetectionKind::PromptInjection => "prompt_injection",
            DetectionKind::Jailbreak => "jailbreak",
            DetectionKind::RolePlay => "role_play",
            DetectionKind::SensitiveInfo => "sensitive_info",
            DetectionKind::HarmfulContent => "harmful_content",
            DetectionKind::ComplianceViolation => "compliance",
            DetectionKind::Custom => "custom",
        }
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DetectionKind::PromptInjection => "promptInjection",
            DetectionKind::Jailbreak => "jailbreak",
            DetectionKind::RolePlay => "rolePlay",
            DetectionKind::SensitiveInfo => "sensitiveInfo",
            DetectionKind::HarmfulContent => "harmfulContent",
            DetectionKind::ComplianceViolation => "complianceViolation",
            DetectionKind::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Totally ordered severity: `low < medium < high < critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}
