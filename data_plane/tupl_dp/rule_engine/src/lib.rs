//! Rule data model and detector families for the security gateway.
//!
//! This crate owns everything the gateway persists or evaluates against a
//! single text blob: compiled rules (C1 Rule Store), per-family matching
//! (C2 Detector Family, with sensitive-info's multi-hit special case), the
//! per-model rule overlay and templates (C4 Model Rule Manager), content
//! masking (C5), and the append-only decision log (C10 Event Logger).
//!
//! The request-pipeline runtime that orchestrates these against live
//! traffic lives in the `bridge` crate.

pub mod audit;
pub mod detection_kind;
pub mod errors;
pub mod family;
pub mod masking;
pub mod model_rule;
pub mod pattern;
pub mod rule_metadata;
pub mod rule_store;
pub mod sensitive_info;

pub use audit::{EventLogger, EventQuery, EventStats, SecurityEvent};
pub use detection_kind::{DetectionKind, Severity};
pub use errors::{Result, RuleEngineError};
pub use family::DetectorFamily;
pub use masking::mask_all;
pub use model_rule::{
    ModelRuleAssociation, ModelRuleConfig, ModelRuleManager, PriorityConflict, RuleSetTemplate,
};
pub use pattern::{compile_keyword, compile_pattern, CompiledKeyword, CompiledPattern};
pub use rule_metadata::{
    DetectionDetails, DetectionResult, RuleDefinition, RuleId, SecurityRule, SecurityRuleBuilder,
};
pub use rule_store::{RuleSnapshot, RuleStore};
pub use sensitive_info::{SensitiveHit, SensitiveInfoFamily, SensitiveInfoKind};
