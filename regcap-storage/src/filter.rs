//! Audit query filters

use chrono::{DateTime, Utc};
use regcap_core::{AuditRecord, Decision};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LIMIT: usize = 100;
pub const MAX_LIMIT: usize = 1000;

/// Predicates and pagination for audit queries.
///
/// Every predicate that is set must hold. The date range applies to
/// `decided_at`, inclusive at both ends.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFilter {
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    #[serde(default)]
    pub decision: Option<Decision>,
    #[serde(default)]
    pub rule_applied: Option<String>,
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub offset: usize,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transaction_id(mut self, id: impl Into<String>) -> Self {
        self.transaction_id = Some(id.into());
        self
    }

    pub fn transaction_type(mut self, kind: impl Into<String>) -> Self {
        self.transaction_type = Some(kind.into());
        self
    }

    pub fn decision(mut self, decision: Decision) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn rule_applied(mut self, rule: impl Into<String>) -> Self {
        self.rule_applied = Some(rule.into());
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    /// Effective page size, clamped to `1..=MAX_LIMIT`
    pub fn effective_limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }

    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(id) = &self.transaction_id {
            if &record.transaction_id != id {
                return false;
            }
        }
        if let Some(kind) = &self.transaction_type {
            if &record.transaction_type != kind {
                return false;
            }
        }
        if let Some(decision) = self.decision {
            if record.decision != decision {
                return false;
            }
        }
        if let Some(rule) = &self.rule_applied {
            if record.rule_applied.as_ref() != Some(rule) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if record.decided_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if record.decided_at > to {
                return false;
            }
        }
        true
    }
}
