//! Immutable audit records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::decision::{Decision, PolicyDecision, TraceStep};

/// Reference to the business entity a decision was made for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    /// e.g. `credit_agreement`, `trade`, `loan_asset`
    pub entity_type: String,
    pub entity_id: String,
}

impl EntityRef {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

/// A persisted PolicyDecision plus its foreign references.
///
/// Records are append-only: a later decision for the same transaction id
/// supersedes an earlier one, it never rewrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub trace_id: String,
    pub transaction_id: String,
    pub transaction_type: String,
    pub decision: Decision,
    pub rule_applied: Option<String>,
    pub matched_rules: Vec<String>,
    pub trace: Vec<TraceStep>,
    pub metadata: Map<String, Value>,
    #[serde(default)]
    pub entity_ref: Option<EntityRef>,
    #[serde(default)]
    pub cdm_event: Option<Value>,
    pub decided_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Build a record for `decision`.
    ///
    /// `caller_metadata` is merged under the decision's own metadata, so
    /// engine-supplied keys win on collision.
    pub fn from_decision(
        decision: &PolicyDecision,
        transaction_id: &str,
        transaction_type: &str,
        caller_metadata: Map<String, Value>,
        entity_ref: Option<EntityRef>,
        cdm_event: Option<Value>,
    ) -> Self {
        let mut metadata = caller_metadata;
        metadata.extend(decision.metadata().clone());

        Self {
            id: Uuid::new_v4(),
            trace_id: decision.trace_id().to_string(),
            transaction_id: transaction_id.to_string(),
            transaction_type: transaction_type.to_string(),
            decision: decision.decision(),
            rule_applied: decision.rule_applied().map(str::to_string),
            matched_rules: decision.matched_rules().to_vec(),
            trace: decision.trace().to_vec(),
            metadata,
            entity_ref,
            cdm_event,
            decided_at: decision.created_at(),
            recorded_at: Utc::now(),
        }
    }
}
