//! Rule Store (C1): loads, persists, and hot-reloads the JSON rule files
//! under `<dataDir>/rules/`, pre-compiling every pattern exactly once.
//!
//! Readers never lock: they clone the `Arc<RuleSnapshot>` behind a short
//! read-lock and then operate on an immutable value. `reload()` builds an
//! entirely new snapshot off to the side and swaps it in under a single
//! write lock, so no in-flight detection ever observes a half-reloaded
//! family (§4.1, §5).

use crate::detection_kind::{DetectionKind, Severity};
use crate::errors::{Result, RuleEngineError};
use crate::family::DetectorFamily;
use crate::pattern::compile_pattern;
use crate::rule_metadata::{RuleDefinition, SecurityRule, SecurityRuleBuilder};
use crate::sensitive_info::{SensitiveInfoFamily, SensitiveInfoKind};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// An immutable, fully-compiled view of all rule families. Cheap to clone
/// (an `Arc` bump); this is what gets swapped on reload.
pub struct RuleSnapshot {
    families: HashMap<DetectionKind, DetectorFamily>,
    sensitive_info: SensitiveInfoFamily,
    loaded_at: chrono::DateTime<chrono::Utc>,
    degraded: bool,
}

impl RuleSnapshot {
    pub fn family(&self, kind: DetectionKind) -> Option<&DetectorFamily> {
        self.families.get(&kind)
    }

    pub fn sensitive_info(&self) -> &SensitiveInfoFamily {
        &self.sensitive_info
    }

    pub fn loaded_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.loaded_at
    }

    /// True if the last load fell back to a previously-good snapshot
    /// because at least one family file could not be read (§7).
    pub fn degraded(&self) -> bool {
        self.degraded
    }
}

pub struct RuleStore {
    rules_dir: PathBuf,
    snapshot: RwLock<Arc<RuleSnapshot>>,
}

impl RuleStore {
    /// Loads every family from `rules_dir`, seeding defaults for any file
    /// that does not yet exist, and returns a ready store.
    pub fn load(rules_dir: impl Into<PathBuf>) -> Result<Self> {
        let rules_dir = rules_dir.into();
        fs::create_dir_all(&rules_dir).map_err(|source| RuleEngineError::WriteFailed {
            path: rules_dir.clone(),
            source,
        })?;

        let snapshot = Self::build_snapshot(&rules_dir)?;
        Ok(RuleStore {
            rules_dir,
            snapshot: RwLock::new(Arc::new(snapshot)),
        })
    }

    pub fn snapshot(&self) -> Arc<RuleSnapshot> {
        self.snapshot.read().clone()
    }

    /// Re-reads every family file, recompiles, and swaps the snapshot
    /// under one write barrier. If any family fails to read, that family
    /// is kept from the previous snapshot and the new snapshot is marked
    /// `degraded` (§7 "Rule-file read error").
    pub fn reload(&self) -> Result<()> {
        let previous = self.snapshot();
        let mut families = HashMap::new();
        let mut degraded = false;

        for &kind in family_kinds() {
            match Self::load_family_file(&self.rules_dir, kind) {
                Ok(rules) => {
                    families.insert(kind, DetectorFamily::new(kind, rules));
                }
                Err(err) => {
                    tracing::warn!(kind = %kind, error = %err, "keeping last-known-good rule set for family");
                    degraded = true;
                    if let Some(existing) = previous.family(kind) {
                        families.insert(kind, existing.clone());
                    }
                }
            }
        }

        let sensitive_info = match Self::load_sensitive_info_file(&self.rules_dir) {
            Ok(family) => family,
            Err(err) => {
                tracing::warn!(error = %err, "keeping last-known-good sensitive-info patterns");
                degraded = true;
                previous.sensitive_info.clone()
            }
        };

        let next = RuleSnapshot {
            families,
            sensitive_info,
            loaded_at: chrono::Utc::now(),
            degraded,
        };

        *self.snapshot.write() = Arc::new(next);
        Ok(())
    }

    /// Overwrites one family's file with `rules`, then reloads that family
    /// into the current snapshot (write-then-rename, §4.1).
    pub fn save_family(&self, kind: DetectionKind, rules: &[SecurityRule]) -> Result<()> {
        let defs: Vec<RuleDefinition> = rules.iter().map(SecurityRule::to_definition).collect();
        Self::atomic_write_json(&family_path(&self.rules_dir, kind), &defs)?;
        self.reload()
    }

    /// Every rule across every family, for the `GET /api/v1/rules` listing.
    /// `SensitiveInfo` is excluded: it has no [`SecurityRule`] representation
    /// (§4.1, see [`family_kinds`]).
    pub fn list_rules(&self) -> Vec<SecurityRule> {
        let snapshot = self.snapshot();
        family_kinds()
            .iter()
            .flat_map(|&kind| snapshot.family(kind).map(|f| f.rules().to_vec()).unwrap_or_default())
            .collect()
    }

    /// Finds one rule by id, searching every family (rule ids are only
    /// guaranteed unique within a family, but the first match is returned).
    pub fn find_rule(&self, rule_id: &str) -> Option<(DetectionKind, SecurityRule)> {
        let snapshot = self.snapshot();
        for &kind in family_kinds() {
            if let Some(family) = snapshot.family(kind) {
                if let Some(rule) = family.rules().iter().find(|r| r.id.as_str() == rule_id) {
                    return Some((kind, rule.clone()));
                }
            }
        }
        None
    }

    /// Inserts `rule` into `kind`'s family, replacing any existing rule with
    /// the same id, and persists the family.
    pub fn upsert_rule(&self, kind: DetectionKind, rule: SecurityRule) -> Result<()> {
        let snapshot = self.snapshot();
        let mut rules = snapshot.family(kind).map(|f| f.rules().to_vec()).unwrap_or_default();
        match rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => rules.push(rule),
        }
        self.save_family(kind, &rules)
    }

    /// Removes a rule from `kind`'s family. Returns `false` if no rule with
    /// that id existed.
    pub fn delete_rule(&self, kind: DetectionKind, rule_id: &str) -> Result<bool> {
        let snapshot = self.snapshot();
        let mut rules = snapshot.family(kind).map(|f| f.rules().to_vec()).unwrap_or_default();
        let before = rules.len();
        rules.retain(|r| r.id.as_str() != rule_id);
        let removed = rules.len() != before;
        if removed {
            self.save_family(kind, &rules)?;
        }
        Ok(removed)
    }

    /// Overrides one rule's default priority in place (`PATCH
    /// /api/v1/rules/{id}/priority`). Returns `false` if the rule is absent.
    pub fn set_priority(&self, kind: DetectionKind, rule_id: &str, priority: u32) -> Result<bool> {
        let snapshot = self.snapshot();
        let mut rules = snapshot.family(kind).map(|f| f.rules().to_vec()).unwrap_or_default();
        let Some(rule) = rules.iter_mut().find(|r| r.id.as_str() == rule_id) else {
            return Ok(false);
        };
        rule.priority = priority;
        self.save_family(kind, &rules)?;
        Ok(true)
    }

    fn build_snapshot(rules_dir: &Path) -> Result<RuleSnapshot> {
        let mut families = HashMap::new();
        let mut degraded = false;

        for &kind in family_kinds() {
            match Self::load_family_file(rules_dir, kind) {
                Ok(rules) => {
                    families.insert(kind, DetectorFamily::new(kind, rules));
                }
                Err(err) => {
                    tracing::error!(kind = %kind, error = %err, "failed to load rule family, starting empty");
                    degraded = true;
                    families.insert(kind, DetectorFamily::new(kind, Vec::new()));
                }
            }
        }

        let sensitive_info = Self::load_sensitive_info_file(rules_dir).unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to load sensitive-info patterns, starting empty");
            degraded = true;
            SensitiveInfoFamily::new(Vec::new())
        });

        Ok(RuleSnapshot {
            families,
            sensitive_info,
            loaded_at: chrono::Utc::now(),
            degraded,
        })
    }

    /// Reads and compiles one family, ascending-priority-sorted; if the
    /// file is absent, writes and returns the family's default rule set.
    fn load_family_file(rules_dir: &Path, kind: DetectionKind) -> Result<Vec<SecurityRule>> {
        let path = family_path(rules_dir, kind);
        if !path.exists() {
            let defaults = default_rules(kind);
            let defs: Vec<RuleDefinition> =
                defaults.iter().map(SecurityRule::to_definition).collect();
            Self::atomic_write_json(&path, &defs)?;
            return Ok(sorted(defaults));
        }

        let bytes = fs::read(&path).map_err(|source| RuleEngineError::ReadFailed {
            path: path.clone(),
            source,
        })?;
        let defs: Vec<RuleDefinition> =
            serde_json::from_slice(&bytes).map_err(|source| RuleEngineError::MalformedRuleFile {
                path: path.clone(),
                source,
            })?;
        let rules = defs.into_iter().map(SecurityRule::compile).collect();
        Ok(sorted(rules))
    }

    fn load_sensitive_info_file(rules_dir: &Path) -> Result<SensitiveInfoFamily> {
        let path = rules_dir.join("sensitive_info_patterns.json");
        let raw: HashMap<String, Vec<String>> = if !path.exists() {
            let defaults = default_sensitive_info_patterns();
            Self::atomic_write_json(&path, &defaults)?;
            defaults
        } else {
            let bytes = fs::read(&path).map_err(|source| RuleEngineError::ReadFailed {
                path: path.clone(),
                source,
            })?;
            serde_json::from_slice(&bytes).map_err(|source| RuleEngineError::MalformedRuleFile {
                path: path.clone(),
                source,
            })?
        };

        let groups = raw
            .into_iter()
            .map(|(category, patterns)| {
                let kind = sensitive_info_kind_for(&category);
                let compiled = patterns.iter().map(|p| compile_pattern(p)).collect();
                (kind, compiled)
            })
            .collect();

        Ok(SensitiveInfoFamily::new(groups))
    }

    fn atomic_write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| RuleEngineError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp_path = path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(&tmp_path, bytes).map_err(|source| RuleEngineError::WriteFailed {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, path).map_err(|source| RuleEngineError::WriteFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(())
    }
}

/// Kinds backed by a [`DetectorFamily`] of [`SecurityRule`]s. `SensitiveInfo`
/// is excluded: it is backed by [`SensitiveInfoFamily`]'s category→pattern
/// map instead, loaded separately from `sensitive_info_patterns.json`.
fn family_kinds() -> &'static [DetectionKind] {
    &[
        DetectionKind::PromptInjection,
        DetectionKind::Jailbreak,
        DetectionKind::RolePlay,
        DetectionKind::HarmfulContent,
        DetectionKind::ComplianceViolation,
        DetectionKind::Custom,
    ]
}

fn family_path(rules_dir: &Path, kind: DetectionKind) -> PathBuf {
    rules_dir.join(format!("{}.json", kind.file_stem()))
}

fn sorted(mut rules: Vec<SecurityRule>) -> Vec<SecurityRule> {
    rules.sort_by_key(|r| r.priority);
    rules
}

fn sensitive_info_kind_for(category: &str) -> SensitiveInfoKind {
    match category {
        "credit_card" => SensitiveInfoKind::CreditCard,
        "ssn" => SensitiveInfoKind::Ssn,
        "email" => SensitiveInfoKind::Email,
        "phone" => SensitiveInfoKind::Phone,
        "api_key" => SensitiveInfoKind::ApiKey,
        "id_card" => SensitiveInfoKind::IdCard,
        _ => SensitiveInfoKind::Other,
    }
}

/// Default sensitive-info patterns, matching `original_source`'s
/// `SensitiveInfoDetector._load_patterns` defaults.
fn default_sensitive_info_patterns() -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    map.insert(
        "credit_card".to_string(),
        vec![r"\b(?:4[0-9]{12}(?:[0-9]{3})?|5[1-5][0-9]{14}|3[47][0-9]{13})\b".to_string()],
    );
    map.insert(
        "ssn".to_string(),
        vec![r"\b(?!000|666|9\d{2})\d{3}[- ]?\d{2}[- ]?\d{4}\b".to_string()],
    );
    map.insert(
        "email".to_string(),
        vec![r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b".to_string()],
    );
    map.insert(
        "phone".to_string(),
        vec![r"\b(?:\+\d{1,3}[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b".to_string()],
    );
    map.insert(
        "api_key".to_string(),
        vec![
            r#"\b(?:api[_-]?key|access[_-]?key|secret[_-]?key)[_-]?(?:id)?[:=]\s*['"]?([a-zA-Z0-9]{16,})"#
                .to_string(),
        ],
    );
    map
}

/// Default rules per family, matching `original_source`'s
/// `_load_rules` seed sets (`pi-00x`, `jb-00x`, `hc-00x`, `comp-00x`).
/// `RolePlay` and `Custom` have no analog in the original and start empty
/// — operators populate them through C4.
fn default_rules(kind: DetectionKind) -> Vec<SecurityRule> {
    let builder = SecurityRule::builder;
    match kind {
        DetectionKind::PromptInjection => vec![
            builder("pi-001", kind)
                .name("Ignore Previous Instructions")
                .description("Detects attempts to make the model ignore previous instructions")
                .severity(Severity::High)
                .patterns(vec![
                    r"ignore\s+(?:all\s+)?(?:previous|above|earlier)\s+instructions".to_string(),
                    r"disregard\s+(?:all\s+)?(?:previous|above|earlier)\s+instructions"
                        .to_string(),
                ])
                .keywords(vec!["ignore".to_string(), "disregard".to_string()])
                .priority(10)
                .categories(vec!["prompt_injection".to_string()])
                .build(),
            builder("pi-002", kind)
                .name("System Prompt Extraction")
                .description("Detects attempts to extract the system prompt")
                .severity(Severity::High)
                .patterns(vec![
                    r"what\s+(?:was|were)\s+your\s+instructions".to_string(),
                    r"what\s+(?:is|are)\s+your\s+system\s+prompt".to_string(),
                ])
                .keywords(vec!["system prompt".to_string()])
                .priority(20)
                .categories(vec!["prompt_injection".to_string()])
                .build(),
        ],
        DetectionKind::Jailbreak => vec![
            builder("jb-001", kind)
                .name("DAN Jailbreak")
                .description("Detects DAN (Do Anything Now) jailbreak attempts")
                .severity(Severity::Critical)
                .patterns(vec![
                    r"you\s+are\s+now\s+dan".to_string(),
                    r"dan\s+mode\s+enabled".to_string(),
                    r"do\s+anything\s+now".to_string(),
                ])
                .keywords(vec!["DAN".to_string()])
                .priority(5)
                .categories(vec!["jailbreak".to_string()])
                .build(),
            builder("jb-002", kind)
                .name("Alternative Jailbreak Characters")
                .description("Detects STAN/DUDE/AIM-style jailbreak personas")
                .severity(Severity::Critical)
                .patterns(vec![r"you\s+are\s+(?:STAN|DUDE|KEVIN|DAVE|AIM)".to_string()])
                .keywords(vec![
                    "STAN".to_string(),
                    "DUDE".to_string(),
                    "AIM".to_string(),
                ])
                .priority(5)
                .categories(vec!["jailbreak".to_string()])
                .build(),
        ],
        DetectionKind::HarmfulContent => vec![
            builder("hc-001", kind)
                .name("Violence Content")
                .description("Detects violent content in text")
                .severity(Severity::High)
                .patterns(vec![
                    r"how\s+to\s+(?:kill|murder|harm|injure|attack)".to_string(),
                    r"(?:make|build|create)\s+(?:a|an)?\s*(?:bomb|explosive|weapon)".to_string(),
                ])
                .keywords(vec![
                    "kill".to_string(),
                    "bomb".to_string(),
                    "terrorist".to_string(),
                ])
                .priority(15)
                .categories(vec!["violence".to_string()])
                .build(),
            builder("hc-002", kind)
                .name("Hate Speech")
                .description("Detects hate speech and discriminatory content")
                .severity(Severity::High)
                .patterns(vec![])
                .keywords(vec![
                    "hate".to_string(),
                    "racist".to_string(),
                    "bigot".to_string(),
                ])
                .priority(25)
                .categories(vec!["hate_speech".to_string()])
                .build(),
            builder("hc-003", kind)
                .name("Illegal Activities")
                .description("Detects content related to illegal activities")
                .severity(Severity::Medium)
                .patterns(vec![r"how\s+to\s+(?:hack|crack|steal|launder|counterfeit)".to_string()])
                .keywords(vec!["fraud".to_string(), "launder".to_string()])
                .priority(30)
                .categories(vec!["illegal_activities".to_string()])
                .build(),
        ],
        DetectionKind::ComplianceViolation => vec![
            builder("comp-001", kind)
                .name("GDPR Compliance")
                .description("Detects potential GDPR compliance issues")
                .severity(Severity::High)
                .patterns(vec![
                    r"(?:collect|store|process|use)\s+(?:personal|private|user)\s+(?:data|information)\s+without\s+(?:consent|permission)"
                        .to_string(),
                ])
                .keywords(vec!["GDPR violation".to_string(), "data protection".to_string()])
                .priority(40)
                .categories(vec!["gdpr".to_string(), "privacy".to_string()])
                .build(),
            builder("comp-002", kind)
                .name("HIPAA Compliance")
                .description("Detects potential HIPAA compliance issues")
                .severity(Severity::High)
                .patterns(vec![
                    r"(?:share|disclose|reveal)\s+(?:patient|medical|health)\s+(?:data|information|records)\s+without\s+(?:authorization|consent)"
                        .to_string(),
                ])
                .keywords(vec!["HIPAA violation".to_string(), "PHI".to_string()])
                .priority(35)
                .categories(vec!["hipaa".to_string(), "healthcare".to_string()])
                .build(),
        ],
        DetectionKind::RolePlay | DetectionKind::SensitiveInfo | DetectionKind::Custom => {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_seeds_defaults_on_first_run() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path()).unwrap();
        let snapshot = store.snapshot();
        let family = snapshot.family(DetectionKind::Jailbreak).unwrap();
        assert!(!family.rules().is_empty());
        assert!(dir.path().join("jailbreak.json").exists());
    }

    #[test]
    fn reload_swaps_snapshot_atomically() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path()).unwrap();
        let before = store.snapshot().loaded_at();
        store.reload().unwrap();
        let after = store.snapshot().loaded_at();
        assert!(after >= before);
    }

    #[test]
    fn save_family_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let store = RuleStore::load(dir.path()).unwrap();
        let rule = SecurityRule::builder("custom-1", DetectionKind::Custom)
            .name("Custom rule")
            .keywords(vec!["forbidden".to_string()])
            .build();
        store.save_family(DetectionKind::Custom, &[rule]).unwrap();

        let snapshot = store.snapshot();
        let family = snapshot.family(DetectionKind::Custom).unwrap();
        assert_eq!(family.rules().len(), 1);
        assert_eq!(family.rules()[0].id.as_str(), "custom-1");
    }
}
