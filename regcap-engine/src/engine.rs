//! Policy engine capability trait

use regcap_core::{EvaluationOutcome, PolicyRule, PolicyTransaction};
use serde_json::Value;

use crate::{EngineError, EngineStats};

/// Where a rule set comes from
#[derive(Debug, Clone)]
pub enum RulesSource {
    /// YAML rule definition list
    Yaml(String),
    /// Already-parsed document (list or `{rules: [...]}`)
    Document(Value),
    /// Typed rules, still validated for unique names
    Rules(Vec<PolicyRule>),
}

impl From<&str> for RulesSource {
    fn from(source: &str) -> Self {
        RulesSource::Yaml(source.to_string())
    }
}

impl From<String> for RulesSource {
    fn from(source: String) -> Self {
        RulesSource::Yaml(source)
    }
}

impl From<Vec<PolicyRule>> for RulesSource {
    fn from(rules: Vec<PolicyRule>) -> Self {
        RulesSource::Rules(rules)
    }
}

/// A pluggable compliance decision engine.
///
/// Implementations must be safe to call concurrently: `evaluate` never
/// blocks on I/O and never observes a partially loaded rule set.
pub trait PolicyEngine: Send + Sync {
    /// Configuration key this engine is registered under
    fn name(&self) -> &str;

    /// Evaluate a canonical transaction.
    ///
    /// Deterministic for a fixed rule set and input. Fails with
    /// `Validation` on a malformed transaction and `Unavailable` when no
    /// rule set was ever loaded; neither failure touches the counters.
    fn evaluate(&self, transaction: &PolicyTransaction) -> Result<EvaluationOutcome, EngineError>;

    /// Evaluate an untyped mapping
    fn evaluate_json(&self, transaction: &Value) -> Result<EvaluationOutcome, EngineError> {
        let transaction = PolicyTransaction::from_value(transaction)?;
        self.evaluate(&transaction)
    }

    /// Replace the active rule set.
    ///
    /// On any validation failure the previous rule set and statistics are
    /// left untouched.
    fn load_rules(&self, source: RulesSource) -> Result<(), EngineError>;

    fn get_stats(&self) -> EngineStats;
}
