//! Model Rule Manager (C4): per-model rule overlays, reusable templates,
//! and the security-score heuristic used by the rules dashboard (§4.4).
//!
//! A model's *effective* rule set for a family is its family's base rules
//! merged with any per-model overrides, re-sorted by priority. This overlay
//! is what realizes the "model-specific" stage named in the Aggregator's
//! evaluation order — there is no separate detector type for it.

use crate::detection_kind::DetectionKind;
use crate::errors::{Result, RuleEngineError};
use crate::rule_metadata::SecurityRule;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One rule, as applied to a specific model: either a priority override of
/// an existing family rule, or a model-only addition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRuleAssociation {
    pub rule_id: String,
    pub detection_kind: DetectionKind,
    /// `None` keeps the family's own priority; `Some` overrides it for this model.
    pub priority_override: Option<u32>,
    pub enabled: bool,
}

/// A named, reusable bundle of rule IDs that can be stamped onto many
/// models at once (`applyTemplate`/`batchApplyTemplate`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleSetTemplate {
    pub name: String,
    pub description: String,
    pub associations: Vec<ModelRuleAssociation>,
}

/// The full rule configuration attached to one model identifier.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelRuleConfig {
    pub associations: Vec<ModelRuleAssociation>,
}

impl ModelRuleConfig {
    /// Rule IDs overridden or added for one family, most specific last.
    pub fn associations_for(&self, kind: DetectionKind) -> impl Iterator<Item = &ModelRuleAssociation> {
        self.associations
            .iter()
            .filter(move |a| a.detection_kind == kind)
    }
}

/// A conflict detected when two associations for the same model and family
/// request the same priority (§4.4 `priorityConflict`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConflict {
    pub detection_kind: DetectionKind,
    pub priority: u32,
    pub rule_ids: Vec<String>,
}

/// Tracks per-model overlays and templates. Internally locked so CRUD
/// operations and overlay reads can happen from concurrent request handlers.
pub struct ModelRuleManager {
    models: RwLock<HashMap<String, ModelRuleConfig>>,
    templates: RwLock<HashMap<String, RuleSetTemplate>>,
}

/// Inserts or replaces `assoc` keyed by `(rule_id, detection_kind)` — rule
/// IDs are only unique within one family, so the kind must match too.
fn upsert_into(associations: &mut Vec<ModelRuleAssociation>, assoc: ModelRuleAssociation) {
    if let Some(existing) = associations
        .iter_mut()
        .find(|a| a.rule_id == assoc.rule_id && a.detection_kind == assoc.detection_kind)
    {
        *existing = assoc;
    } else {
        associations.push(assoc);
    }
}

impl ModelRuleManager {
    pub fn new() -> Self {
        ModelRuleManager {
            models: RwLock::new(HashMap::new()),
            templates: RwLock::new(HashMap::new()),
        }
    }

    pub fn create_model_config(&self, model: impl Into<String>) -> Result<()> {
        let model = model.into();
        let mut models = self.models.write();
        if models.contains_key(&model) {
            return Err(RuleEngineError::ModelConfigExists(model));
        }
        models.insert(model, ModelRuleConfig::default());
        Ok(())
    }

    pub fn get_model_config(&self, model: &str) -> Result<ModelRuleConfig> {
        self.models
            .read()
            .get(model)
            .cloned()
            .ok_or_else(|| RuleEngineError::ModelConfigNotFound(model.to_string()))
    }

    pub fn upsert_association(&self, model: &str, assoc: ModelRuleAssociation) {
        let mut models = self.models.write();
        let config = models.entry(model.to_string()).or_default();
        upsert_into(&mut config.associations, assoc);
    }

    pub fn remove_model_config(&self, model: &str) -> Result<()> {
        self.models
            .write()
            .remove(model)
            .map(|_| ())
            .ok_or_else(|| RuleEngineError::ModelConfigNotFound(model.to_string()))
    }

    pub fn register_template(&self, template: RuleSetTemplate) {
        self.templates.write().insert(template.name.clone(), template);
    }

    pub fn list_templates(&self) -> Vec<RuleSetTemplate> {
        self.templates.read().values().cloned().collect()
    }

    pub fn get_template(&self, name: &str) -> Option<RuleSetTemplate> {
        self.templates.read().get(name).cloned()
    }

    pub fn delete_template(&self, name: &str) -> bool {
        self.templates.write().remove(name).is_some()
    }

    pub fn list_model_configs(&self) -> Vec<(String, ModelRuleConfig)> {
        self.models.read().iter().map(|(model, config)| (model.clone(), config.clone())).collect()
    }

    pub fn apply_template(&self, model: &str, template_name: &str) -> Result<()> {
        let template = self
            .templates
            .read()
            .get(template_name)
            .cloned()
            .ok_or_else(|| RuleEngineError::TemplateNotFound(template_name.to_string()))?;

        let mut models = self.models.write();
        let config = models.entry(model.to_string()).or_default();
        for assoc in template.associations {
            upsert_into(&mut config.associations, assoc);
        }
        Ok(())
    }

    /// Applies one template to every model in `model_ids`, continuing past
    /// individual failures and returning the ones that failed.
    pub fn batch_apply_template(&self, model_ids: &[String], template_name: &str) -> Vec<(String, RuleEngineError)> {
        let mut failures = Vec::new();
        for model in model_ids {
            if let Err(err) = self.apply_template(model, template_name) {
                failures.push((model.clone(), err));
            }
        }
        failures
    }

    /// Enables or disables every association for `model` matching `kind`.
    pub fn batch_toggle(&self, model: &str, kind: DetectionKind, enabled: bool) -> Result<()> {
        let mut models = self.models.write();
        let config = models
            .get_mut(model)
            .ok_or_else(|| RuleEngineError::ModelConfigNotFound(model.to_string()))?;
        for assoc in config.associations.iter_mut().filter(|a| a.detection_kind == kind) {
            assoc.enabled = enabled;
        }
        Ok(())
    }

    /// Merges `base` (the family's rules, already compiled) with `model`'s
    /// overlay for `kind`: overridden priorities replace the base rule's
    /// priority, disabled overlays drop the rule, then the result is
    /// re-sorted by effective priority. This is the per-model stage the
    /// Aggregator applies before each family evaluates.
    pub fn effective_rules(
        &self,
        model: &str,
        kind: DetectionKind,
        base: &[SecurityRule],
    ) -> Vec<SecurityRule> {
        let models = self.models.read();
        let Some(config) = models.get(model) else {
            return base.to_vec();
        };

        let overlay: HashMap<&str, &ModelRuleAssociation> = config
            .associations_for(kind)
            .map(|a| (a.rule_id.as_str(), a))
            .collect();

        let mut merged: Vec<SecurityRule> = base
            .iter()
            .filter_map(|rule| {
                let mut rule = rule.clone();
                if let Some(assoc) = overlay.get(rule.id.as_str()) {
                    if !assoc.enabled {
                        return None;
                    }
                    if let Some(priority) = assoc.priority_override {
                        rule.priority = priority;
                    }
                }
                Some(rule)
            })
            .collect();

        merged.sort_by_key(|r| r.priority);
        merged
    }

    /// Detects associations for the same model/family sharing one priority
    /// (§4.4). Two rules at the same priority make evaluation order
    /// dependent on the base list's original ordering, which is a
    /// foot-gun worth surfacing to the operator rather than silently
    /// tie-breaking.
    pub fn priority_conflicts(&self, model: &str) -> Vec<PriorityConflict> {
        let models = self.models.read();
        let Some(config) = models.get(model) else {
            return Vec::new();
        };

        let mut by_kind_priority: HashMap<(DetectionKind, u32), Vec<String>> = HashMap::new();
        for assoc in &config.associations {
            if let Some(priority) = assoc.priority_override {
                by_kind_priority
                    .entry((assoc.detection_kind, priority))
                    .or_default()
                    .push(assoc.rule_id.clone());
            }
        }

        by_kind_priority
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((kind, priority), rule_ids)| PriorityConflict {
                detection_kind: kind,
                priority,
                rule_ids,
            })
            .collect()
    }

    /// `typeCoverage * 50 + ruleCountScore * 50`: type coverage is the
    /// fraction of [`DetectionKind::critical_set`] the model has at least
    /// one enabled association for; rule-count score saturates at 20 rules
    /// (§4.4).
    pub fn security_score(&self, model: &str) -> f64 {
        let models = self.models.read();
        let Some(config) = models.get(model) else {
            return 0.0;
        };

        let critical = DetectionKind::critical_set();
        let covered = critical
            .iter()
            .filter(|&&kind| {
                config
                    .associations
                    .iter()
                    .any(|a| a.detection_kind == kind && a.enabled)
            })
            .count();
        let type_coverage = covered as f64 / critical.len() as f64;

        let enabled_count = config.associations.iter().filter(|a| a.enabled).count();
        let rule_count_score = (enabled_count as f64 / 20.0).min(1.0);

        type_coverage * 50.0 + rule_count_score * 50.0
    }
}

impl Default for ModelRuleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection_kind::Severity;

    fn assoc(rule_id: &str, kind: DetectionKind, priority: Option<u32>) -> ModelRuleAssociation {
        ModelRuleAssociation {
            rule_id: rule_id.to_string(),
            detection_kind: kind,
            priority_override: priority,
            enabled: true,
        }
    }

    #[test]
    fn effective_rules_applies_priority_override() {
        let manager = ModelRuleManager::new();
        manager.create_model_config("gpt-4").unwrap();
        manager.upsert_association("gpt-4", assoc("jb-001", DetectionKind::Jailbreak, Some(1)));

        let base = vec![SecurityRule::builder("jb-001", DetectionKind::Jailbreak)
            .severity(Severity::Critical)
            .priority(5)
            .build()];
        let effective = manager.effective_rules("gpt-4", DetectionKind::Jailbreak, &base);
        assert_eq!(effective[0].priority, 1);
    }

    #[test]
    fn disabled_overlay_drops_the_rule() {
        let manager = ModelRuleManager::new();
        manager.create_model_config("claude-3").unwrap();
        let mut off = assoc("hc-001", DetectionKind::HarmfulContent, None);
        off.enabled = false;
        manager.upsert_association("claude-3", off);

        let base = vec![SecurityRule::builder("hc-001", DetectionKind::HarmfulContent).build()];
        let effective = manager.effective_rules("claude-3", DetectionKind::HarmfulContent, &base);
        assert!(effective.is_empty());
    }

    #[test]
    fn duplicate_model_config_errors() {
        let manager = ModelRuleManager::new();
        manager.create_model_config("gpt-4").unwrap();
        assert!(manager.create_model_config("gpt-4").is_err());
    }

    #[test]
    fn priority_conflicts_detects_shared_priority() {
        let manager = ModelRuleManager::new();
        manager.create_model_config("gpt-4").unwrap();
        manager.upsert_association("gpt-4", assoc("jb-001", DetectionKind::Jailbreak, Some(5)));
        manager.upsert_association("gpt-4", assoc("jb-002", DetectionKind::Jailbreak, Some(5)));

        let conflicts = manager.priority_conflicts("gpt-4");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].priority, 5);
    }

    #[test]
    fn security_score_rewards_coverage_and_rule_count() {
        let manager = ModelRuleManager::new();
        manager.create_model_config("gpt-4").unwrap();
        for (i, kind) in DetectionKind::critical_set().iter().enumerate() {
            manager.upsert_association("gpt-4", assoc(&format!("r-{i}"), *kind, None));
        }
        let score = manager.security_score("gpt-4");
        assert!(score > 50.0);
    }
}
