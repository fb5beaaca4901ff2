//! Policy decisions and evaluation traces

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::rule::RuleAction;
use crate::transaction::PolicyTransaction;

/// Terminal outcome of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Allow,
    Flag,
    Block,
}

impl Decision {
    pub const ALL: [Decision; 3] = [Decision::Allow, Decision::Block, Decision::Flag];

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Block => "BLOCK",
            Decision::Flag => "FLAG",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ALLOW" => Some(Decision::Allow),
            "BLOCK" => Some(Decision::Block),
            "FLAG" => Some(Decision::Flag),
            _ => None,
        }
    }
}

impl From<RuleAction> for Decision {
    fn from(action: RuleAction) -> Self {
        match action {
            RuleAction::Allow => Decision::Allow,
            RuleAction::Block => Decision::Block,
            RuleAction::Flag => Decision::Flag,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered step of an evaluation trace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub step: usize,
    /// `evaluate_rule`, `short_circuit` or `final_decision`
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RuleAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl TraceStep {
    pub fn new(step: usize, event: impl Into<String>) -> Self {
        Self {
            step,
            event: event.into(),
            rule: None,
            priority: None,
            action: None,
            matched: None,
            detail: None,
        }
    }

    pub fn rule(mut self, name: &str, priority: i64, action: RuleAction) -> Self {
        self.rule = Some(name.to_string());
        self.priority = Some(priority);
        self.action = Some(action);
        self
    }

    pub fn matched(mut self, matched: bool) -> Self {
        self.matched = Some(matched);
        self
    }

    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Raw engine output for one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub decision: Decision,
    pub rule: Option<String>,
    pub matched_rules: Vec<String>,
    pub trace: Vec<TraceStep>,
    /// Engine-supplied metadata (rule set version, timings, ...)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// An immutable, auditable decision.
///
/// Produced once per evaluation; a re-evaluation of the same business
/// transaction yields a new `PolicyDecision` with a new trace id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    trace_id: String,
    transaction_id: String,
    transaction_type: String,
    decision: Decision,
    rule_applied: Option<String>,
    matched_rules: Vec<String>,
    trace: Vec<TraceStep>,
    metadata: Map<String, Value>,
    created_at: DateTime<Utc>,
}

impl PolicyDecision {
    /// Build a decision from engine output.
    ///
    /// Metadata is the union of caller and engine metadata; engine keys win.
    pub fn from_outcome(
        trace_id: String,
        transaction: &PolicyTransaction,
        outcome: EvaluationOutcome,
        caller_metadata: Map<String, Value>,
    ) -> Self {
        let mut metadata = caller_metadata;
        metadata.extend(outcome.metadata);

        Self {
            trace_id,
            transaction_id: transaction.transaction_id.clone(),
            transaction_type: transaction.transaction_type_or_default().to_string(),
            decision: outcome.decision,
            rule_applied: outcome.rule,
            matched_rules: outcome.matched_rules,
            trace: outcome.trace,
            metadata,
            created_at: Utc::now(),
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace_id
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn transaction_type(&self) -> &str {
        &self.transaction_type
    }

    pub fn decision(&self) -> Decision {
        self.decision
    }

    pub fn rule_applied(&self) -> Option<&str> {
        self.rule_applied.as_deref()
    }

    pub fn matched_rules(&self) -> &[String] {
        &self.matched_rules
    }

    pub fn trace(&self) -> &[TraceStep] {
        &self.trace
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_blocked(&self) -> bool {
        self.decision == Decision::Block
    }
}
