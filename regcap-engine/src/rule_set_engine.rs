//! Reference policy engine over compiled YAML rule sets
//!
//! The active [`RuleSet`] sits behind an [`ArcSwapOption`]: `load_rules`
//! compiles a complete new snapshot and publishes it with a single pointer
//! store, and every `evaluate` call works on the one snapshot it loaded at
//! entry.
//!
//! Decision semantics:
//! - rules run in priority order (highest first, ties in source order)
//! - the first matching `block` rule ends evaluation with BLOCK, whatever
//!   the priority of earlier matches
//! - otherwise FLAG if any `flag` rule matched, else ALLOW
//! - `matched_rules` lists every rule whose condition held before the
//!   evaluation stopped

use arc_swap::ArcSwapOption;
use regcap_compiler::{RuleCompiler, RuleSet};
use regcap_core::{Decision, EvaluationOutcome, PolicyTransaction, RuleAction, TraceStep};
use serde_json::{json, Map};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::condition;
use crate::stats::EngineCounters;
use crate::{EngineError, EngineStats, PolicyEngine, RulesSource};

pub const ENGINE_NAME: &str = "rule_set";

pub struct RuleSetEngine {
    rules: ArcSwapOption<RuleSet>,
    counters: EngineCounters,
    compiler: RuleCompiler,
}

impl RuleSetEngine {
    /// An engine with no rule set; `evaluate` fails closed until one is loaded
    pub fn new() -> Self {
        Self {
            rules: ArcSwapOption::empty(),
            counters: EngineCounters::default(),
            compiler: RuleCompiler::new(),
        }
    }

    pub fn with_rules(rules: RuleSet) -> Self {
        let engine = Self::new();
        engine.install(rules);
        engine
    }

    /// Publish a compiled snapshot
    pub fn install(&self, rules: RuleSet) {
        info!(
            rules = rules.len(),
            version = %rules.version(),
            "Installed rule set"
        );
        self.rules.store(Some(Arc::new(rules)));
    }

    pub fn snapshot(&self) -> Option<Arc<RuleSet>> {
        self.rules.load_full()
    }

    fn compile(&self, source: RulesSource) -> Result<RuleSet, EngineError> {
        let set = match source {
            RulesSource::Yaml(text) => self.compiler.compile(&text)?,
            RulesSource::Document(doc) => RuleSet::new(self.compiler.compile_value(&doc)?)?,
            RulesSource::Rules(rules) => {
                for rule in &rules {
                    self.compiler.validate_rule(rule)?;
                }
                RuleSet::new(rules)?
            }
        };
        Ok(set)
    }

    fn run(rules: &RuleSet, facts: &serde_json::Value) -> EvaluationOutcome {
        let mut trace = Vec::with_capacity(rules.len() + 1);
        let mut matched_rules = Vec::new();
        let mut first_flag: Option<&str> = None;
        let mut first_allow: Option<&str> = None;
        let mut blocked_by: Option<&str> = None;

        for rule in rules.iter_by_priority() {
            let hit = condition::matches(&rule.when, facts);
            trace.push(
                TraceStep::new(trace.len() + 1, "evaluate_rule")
                    .rule(&rule.name, rule.priority, rule.action)
                    .matched(hit),
            );
            if !hit {
                continue;
            }

            debug!(rule = %rule.name, action = %rule.action, "Rule matched");
            matched_rules.push(rule.name.clone());

            match rule.action {
                RuleAction::Block => {
                    blocked_by = Some(rule.name.as_str());
                    trace.push(
                        TraceStep::new(trace.len() + 1, "short_circuit")
                            .rule(&rule.name, rule.priority, rule.action)
                            .detail("block rule matched"),
                    );
                    break;
                }
                RuleAction::Flag => {
                    first_flag.get_or_insert(rule.name.as_str());
                }
                RuleAction::Allow => {
                    first_allow.get_or_insert(rule.name.as_str());
                }
            }
        }

        let (decision, rule) = match (blocked_by, first_flag) {
            (Some(name), _) => (Decision::Block, Some(name)),
            (None, Some(name)) => (Decision::Flag, Some(name)),
            (None, None) => (Decision::Allow, first_allow),
        };

        trace.push(TraceStep::new(trace.len() + 1, "final_decision").detail(decision.as_str()));

        let mut metadata = Map::new();
        metadata.insert("engine".to_string(), json!(ENGINE_NAME));
        metadata.insert("rule_set_version".to_string(), json!(rules.version()));
        metadata.insert("rules_evaluated".to_string(), json!(rules.len()));

        EvaluationOutcome {
            decision,
            rule: rule.map(str::to_string),
            matched_rules,
            trace,
            metadata,
        }
    }
}

impl Default for RuleSetEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine for RuleSetEngine {
    fn name(&self) -> &str {
        ENGINE_NAME
    }

    fn evaluate(&self, transaction: &PolicyTransaction) -> Result<EvaluationOutcome, EngineError> {
        transaction.validate()?;

        let rules = self.rules.load_full().ok_or_else(|| {
            EngineError::Unavailable("no rule set has been loaded".to_string())
        })?;

        let start = Instant::now();
        let facts = transaction.to_facts()?;
        let mut outcome = Self::run(&rules, &facts);
        let elapsed = start.elapsed();

        outcome.metadata.insert(
            "evaluation_time_ms".to_string(),
            json!(elapsed.as_secs_f64() * 1000.0),
        );
        self.counters
            .record(outcome.decision, u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX));

        debug!(
            transaction_id = %transaction.transaction_id,
            decision = %outcome.decision,
            rule = ?outcome.rule,
            "Evaluated transaction"
        );
        Ok(outcome)
    }

    fn load_rules(&self, source: RulesSource) -> Result<(), EngineError> {
        match self.compile(source) {
            Ok(set) => {
                self.install(set);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Rejected rule set, keeping previous snapshot");
                Err(err)
            }
        }
    }

    fn get_stats(&self) -> EngineStats {
        let (count, version) = match self.rules.load_full() {
            Some(set) => (set.len(), Some(set.version().to_string())),
            None => (0, None),
        };
        self.counters.snapshot(count, version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regcap_core::PartyIdentity;
    use serde_json::json;

    const RULES: &str = r#"
- name: allow-known-counterparty
  priority: 200
  action: allow
  when: { field: originator.kyc_status, op: eq, value: true }
- name: flag-large-amount
  priority: 150
  action: flag
  when: { field: amount, op: gt, value: 1000000 }
- name: block-sanctioned
  priority: 10
  action: block
  when: { field: originator.jurisdiction, op: in, value: [KP, IR] }
- name: flag-eur
  priority: 5
  action: flag
  when: { field: currency, op: eq, value: EUR }
"#;

    fn engine() -> RuleSetEngine {
        let engine = RuleSetEngine::new();
        engine.load_rules(RULES.into()).unwrap();
        engine
    }

    fn tx(amount: f64, jurisdiction: &str, kyc: bool) -> PolicyTransaction {
        let mut tx = PolicyTransaction::new("tx-1", "trade_execution");
        tx.amount = Some(amount);
        tx.currency = Some("USD".to_string());
        tx.originator = Some(PartyIdentity {
            id: "BORR-1".to_string(),
            kyc_status: kyc,
            jurisdiction: Some(jurisdiction.to_string()),
            ..Default::default()
        });
        tx
    }

    #[test]
    fn test_block_wins_over_higher_priority_matches() {
        let outcome = engine().evaluate(&tx(5_000_000.0, "IR", true)).unwrap();

        assert_eq!(outcome.decision, Decision::Block);
        assert_eq!(outcome.rule.as_deref(), Some("block-sanctioned"));
        assert_eq!(
            outcome.matched_rules,
            vec!["allow-known-counterparty", "flag-large-amount", "block-sanctioned"]
        );
        assert_eq!(outcome.trace.last().map(|s| s.event.as_str()), Some("final_decision"));
        assert!(outcome.trace.iter().any(|s| s.event == "short_circuit"));
    }

    #[test]
    fn test_flag_and_allow() {
        let e = engine();
        let flagged = e.evaluate(&tx(5_000_000.0, "DE", false)).unwrap();
        assert_eq!(flagged.decision, Decision::Flag);
        assert_eq!(flagged.rule.as_deref(), Some("flag-large-amount"));

        let allowed = e.evaluate(&tx(10.0, "DE", true)).unwrap();
        assert_eq!(allowed.decision, Decision::Allow);
        assert_eq!(allowed.rule.as_deref(), Some("allow-known-counterparty"));

        let nothing = e.evaluate(&tx(10.0, "DE", false)).unwrap();
        assert_eq!(nothing.decision, Decision::Allow);
        assert_eq!(nothing.rule, None);
        assert!(nothing.matched_rules.is_empty());
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let e = engine();
        let t = tx(5_000_000.0, "DE", true);
        let a = e.evaluate(&t).unwrap();
        let b = e.evaluate(&t).unwrap();
        assert_eq!(a.decision, b.decision);
        assert_eq!(a.rule, b.rule);
        assert_eq!(a.matched_rules, b.matched_rules);
    }

    #[test]
    fn test_missing_transaction_id_leaves_stats_unchanged() {
        let e = engine();
        e.evaluate(&tx(10.0, "DE", true)).unwrap();

        let err = e.evaluate_json(&json!({ "amount": 10.0 })).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        let err = e.evaluate_json(&json!("not a mapping")).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        assert_eq!(e.get_stats().total_processed, 1);
    }

    #[test]
    fn test_malformed_load_keeps_previous_rules() {
        let e = engine();
        let before = e.get_stats();

        let err = e
            .load_rules("- name: broken\n  action: explode\n  priority: 1\n  when: { field: a, op: eq, value: 1 }".into())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        let after = e.get_stats();
        assert_eq!(after.rules_loaded, before.rules_loaded);
        assert_eq!(after.rule_set_version, before.rule_set_version);
        assert_eq!(e.evaluate(&tx(10.0, "IR", false)).unwrap().decision, Decision::Block);
    }

    #[test]
    fn test_blank_reload_keeps_previous_rules() {
        let e = engine();
        let version = e.get_stats().rule_set_version;

        for blank in ["", "  \n", "~"] {
            assert!(matches!(
                e.load_rules(blank.into()),
                Err(EngineError::Validation(_))
            ));
        }

        assert_eq!(e.get_stats().rules_loaded, 4);
        assert_eq!(e.get_stats().rule_set_version, version);
        assert_eq!(e.evaluate(&tx(10.0, "IR", false)).unwrap().decision, Decision::Block);
    }

    #[test]
    fn test_typed_rules_get_document_checks() {
        use regcap_core::{ConditionOperator, PolicyRule, RuleCondition};

        let e = engine();
        let match_all = PolicyRule {
            name: "allow-everything".to_string(),
            priority: 1000,
            when: RuleCondition::All { all: vec![] },
            action: RuleAction::Allow,
            description: None,
        };
        assert!(matches!(
            e.load_rules(RulesSource::Rules(vec![match_all])),
            Err(EngineError::Validation(_))
        ));

        let scalar_in = PolicyRule {
            name: "flag-eur".to_string(),
            priority: 1,
            when: RuleCondition::leaf("currency", ConditionOperator::In, json!("EUR")),
            action: RuleAction::Flag,
            description: None,
        };
        assert!(e.load_rules(RulesSource::Rules(vec![scalar_in])).is_err());

        assert_eq!(e.get_stats().rules_loaded, 4);
        assert_eq!(e.evaluate(&tx(10.0, "IR", false)).unwrap().decision, Decision::Block);
    }

    #[test]
    fn test_unloaded_engine_fails_closed() {
        let e = RuleSetEngine::new();
        assert!(matches!(
            e.evaluate(&tx(10.0, "DE", true)),
            Err(EngineError::Unavailable(_))
        ));
        assert_eq!(e.get_stats().total_processed, 0);

        e.load_rules(RulesSource::Rules(vec![])).unwrap();
        assert_eq!(e.evaluate(&tx(10.0, "DE", true)).unwrap().decision, Decision::Allow);
    }

    #[test]
    fn test_stats_and_metadata() {
        let e = engine();
        e.evaluate(&tx(5_000_000.0, "IR", true)).unwrap();
        let outcome = e.evaluate(&tx(5_000_000.0, "DE", true)).unwrap();

        let stats = e.get_stats();
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.decisions.block, 1);
        assert_eq!(stats.decisions.flag, 1);
        assert_eq!(stats.rules_loaded, 4);
        assert_eq!(
            outcome.metadata["rule_set_version"],
            json!(stats.rule_set_version.unwrap())
        );
    }
}
