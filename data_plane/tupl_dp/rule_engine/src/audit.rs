//! Event Logger (C10): append-only record of every detection decision,
//! queryable by the dashboard (§4.10). Persisted as a single JSON array
//! file, rewritten atomically on each append — acceptable at the gateway's
//! expected volume; a process-local file is enough per SPEC_FULL's Open
//! Question #3.

use crate::detection_kind::{DetectionKind, Severity};
use crate::errors::{Result, RuleEngineError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// One recorded detection decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: String,
    pub timestamp_millis: i64,
    pub detection_kind: DetectionKind,
    pub severity: Severity,
    pub is_allowed: bool,
    pub rule_id: Option<String>,
    pub model: Option<String>,
    pub reason: Option<String>,
    pub request_id: Option<String>,
}

/// Filters accepted by [`EventLogger::query`].
#[derive(Debug, Clone, Default)]
pub struct EventQuery {
    pub start_millis: Option<i64>,
    pub end_millis: Option<i64>,
    pub detection_kind: Option<DetectionKind>,
    pub severity: Option<Severity>,
    pub offset: usize,
    pub limit: usize,
}

/// Aggregate counts used by the dashboard's summary view.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventStats {
    pub total: usize,
    pub blocked: usize,
    pub allowed: usize,
    pub by_kind: std::collections::HashMap<DetectionKind, usize>,
    pub by_severity: std::collections::HashMap<Severity, usize>,
}

pub struct EventLogger {
    path: PathBuf,
    events: RwLock<Vec<SecurityEvent>>,
    sequence: AtomicU64,
}

impl EventLogger {
    /// Loads existing events from `path` if present, starting empty otherwise.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let events = if path.exists() {
            let bytes = fs::read(&path).map_err(|source| RuleEngineError::ReadFailed {
                path: path.clone(),
                source,
            })?;
            serde_json::from_slice(&bytes).map_err(|source| RuleEngineError::MalformedRuleFile {
                path: path.clone(),
                source,
            })?
        } else {
            Vec::new()
        };

        Ok(EventLogger {
            path,
            events: RwLock::new(events),
            sequence: AtomicU64::new(0),
        })
    }

    /// Appends one event, assigning it an `event-<unixSec>-<seq>` id, and
    /// flushes the whole log to disk via write-then-rename.
    pub fn record(&self, mut event: SecurityEvent, now_millis: i64) -> Result<()> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        event.id = format!("event-{}-{}", now_millis / 1000, seq);
        event.timestamp_millis = now_millis;

        let mut events = self.events.write();
        events.push(event);
        self.flush(&events)
    }

    fn flush(&self, events: &[SecurityEvent]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| RuleEngineError::WriteFailed {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec(events)?;
        fs::write(&tmp_path, bytes).map_err(|source| RuleEngineError::WriteFailed {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| RuleEngineError::WriteFailed {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }

    /// Returns events matching `query`, newest first, paginated.
    pub fn query(&self, query: &EventQuery) -> Vec<SecurityEvent> {
        let events = self.events.read();
        let mut matched: Vec<SecurityEvent> = events
            .iter()
            .filter(|e| {
                query.start_millis.map_or(true, |s| e.timestamp_millis >= s)
                    && query.end_millis.map_or(true, |e_max| e.timestamp_millis <= e_max)
                    && query.detection_kind.map_or(true, |k| e.detection_kind == k)
                    && query.severity.map_or(true, |s| e.severity == s)
            })
            .cloned()
            .collect();

        matched.sort_by(|a, b| b.timestamp_millis.cmp(&a.timestamp_millis));

        let limit = if query.limit == 0 { matched.len() } else { query.limit };
        matched.into_iter().skip(query.offset).take(limit).collect()
    }

    /// Looks up one event by its `event-<unixSec>-<seq>` id.
    pub fn get(&self, id: &str) -> Option<SecurityEvent> {
        self.events.read().iter().find(|e| e.id == id).cloned()
    }

    pub fn count(&self, query: &EventQuery) -> usize {
        let mut unbounded = query.clone();
        unbounded.offset = 0;
        unbounded.limit = 0;
        self.query(&unbounded).len()
    }

    pub fn stats(&self, query: &EventQuery) -> EventStats {
        let mut unbounded = query.clone();
        unbounded.offset = 0;
        unbounded.limit = 0;
        let matched = self.query(&unbounded);

        let mut stats = EventStats {
            total: matched.len(),
            ..Default::default()
        };
        for event in &matched {
            if event.is_allowed {
                stats.allowed += 1;
            } else {
                stats.blocked += 1;
            }
            *stats.by_kind.entry(event.detection_kind).or_insert(0) += 1;
            *stats.by_severity.entry(event.severity).or_insert(0) += 1;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn event(kind: DetectionKind, severity: Severity, allowed: bool, millis: i64) -> SecurityEvent {
        SecurityEvent {
            id: String::new(),
            timestamp_millis: millis,
            detection_kind: kind,
            severity,
            is_allowed: allowed,
            rule_id: None,
            model: None,
            reason: None,
            request_id: None,
        }
    }

    #[test]
    fn record_and_reload_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        let logger = EventLogger::load(&path).unwrap();
        logger
            .record(event(DetectionKind::Jailbreak, Severity::Critical, false, 1000), 1000)
            .unwrap();

        let reloaded = EventLogger::load(&path).unwrap();
        let all = reloaded.query(&EventQuery::default());
        assert_eq!(all.len(), 1);
        assert!(all[0].id.starts_with("event-1-"));
    }

    #[test]
    fn query_filters_by_kind_and_window() {
        let dir = tempdir().unwrap();
        let logger = EventLogger::load(dir.path().join("events.json")).unwrap();
        logger
            .record(event(DetectionKind::Jailbreak, Severity::Critical, false, 1000), 1000)
            .unwrap();
        logger
            .record(event(DetectionKind::HarmfulContent, Severity::High, false, 2000), 2000)
            .unwrap();

        let results = logger.query(&EventQuery {
            detection_kind: Some(DetectionKind::Jailbreak),
            ..Default::default()
        });
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].detection_kind, DetectionKind::Jailbreak);
    }

    #[test]
    fn stats_counts_blocked_and_allowed() {
        let dir = tempdir().unwrap();
        let logger = EventLogger::load(dir.path().join("events.json")).unwrap();
        logger
            .record(event(DetectionKind::Jailbreak, Severity::Critical, false, 1000), 1000)
            .unwrap();
        logger
            .record(event(DetectionKind::PromptInjection, Severity::Low, true, 1500), 1500)
            .unwrap();

        let stats = logger.stats(&EventQuery::default());
        assert_eq!(stats.total, 2);
        assert_eq!(stats.blocked, 1);
        assert_eq!(stats.allowed, 1);
    }

    #[test]
    fn query_respects_pagination() {
        let dir = tempdir().unwrap();
        let logger = EventLogger::load(dir.path().join("events.json")).unwrap();
        for i in 0..5 {
            logger
                .record(
                    event(DetectionKind::Jailbreak, Severity::Critical, false, 1000 + i),
                    1000 + i,
                )
                .unwrap();
        }
        let page = logger.query(&EventQuery {
            offset: 1,
            limit: 2,
            ..Default::default()
        });
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn load_reports_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("events.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            EventLogger::load(&path),
            Err(RuleEngineError::MalformedRuleFile { .. })
        ));
    }
}
