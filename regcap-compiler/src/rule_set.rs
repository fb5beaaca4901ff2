//! Immutable compiled rule set
//!
//! Rules live in an arena in source order. A separate index holds arena
//! positions sorted by priority (descending, ties in source order), so the
//! evaluation order is fixed at compile time and never re-sorted per call.

use chrono::{DateTime, Utc};
use regcap_core::PolicyRule;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::CompilerError;

#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<PolicyRule>,
    by_priority: Vec<usize>,
    by_name: HashMap<String, usize>,
    version: String,
    compiled_at: DateTime<Utc>,
}

impl RuleSet {
    /// Build a snapshot from already-typed rules.
    ///
    /// Rejects empty or duplicate names.
    pub fn new(rules: Vec<PolicyRule>) -> Result<Self, CompilerError> {
        let mut by_name = HashMap::with_capacity(rules.len());
        for (idx, rule) in rules.iter().enumerate() {
            if rule.name.trim().is_empty() {
                return Err(CompilerError::Validation(format!(
                    "rule #{}: name must not be empty",
                    idx
                )));
            }
            if by_name.insert(rule.name.clone(), idx).is_some() {
                return Err(CompilerError::Validation(format!(
                    "rule #{}: duplicate rule name '{}'",
                    idx, rule.name
                )));
            }
        }

        let mut by_priority: Vec<usize> = (0..rules.len()).collect();
        // stable sort keeps source order among equal priorities
        by_priority.sort_by(|a, b| rules[*b].priority.cmp(&rules[*a].priority));

        let canonical = serde_json::to_vec(&rules)
            .map_err(|e| CompilerError::Validation(format!("rule set is not serializable: {}", e)))?;
        let version = hex::encode(Sha256::digest(&canonical));

        Ok(Self {
            rules,
            by_priority,
            by_name,
            version,
            compiled_at: Utc::now(),
        })
    }

    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            by_priority: Vec::new(),
            by_name: HashMap::new(),
            version: hex::encode(Sha256::digest(b"[]")),
            compiled_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// SHA-256 hex digest of the canonical JSON form
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn compiled_at(&self) -> DateTime<Utc> {
        self.compiled_at
    }

    pub fn get(&self, name: &str) -> Option<&PolicyRule> {
        self.by_name.get(name).map(|idx| &self.rules[*idx])
    }

    /// Rules in source order
    pub fn rules(&self) -> &[PolicyRule] {
        &self.rules
    }

    /// Rules in evaluation order
    pub fn iter_by_priority(&self) -> impl Iterator<Item = &PolicyRule> + '_ {
        self.by_priority.iter().map(move |idx| &self.rules[*idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regcap_core::{ConditionOperator, RuleAction, RuleCondition};
    use serde_json::json;

    fn rule(name: &str, priority: i64, action: RuleAction) -> PolicyRule {
        PolicyRule {
            name: name.to_string(),
            priority,
            when: RuleCondition::leaf("amount", ConditionOperator::Gt, json!(0)),
            action,
            description: None,
        }
    }

    #[test]
    fn test_priority_order_is_stable() {
        let set = RuleSet::new(vec![
            rule("low", 10, RuleAction::Flag),
            rule("high", 100, RuleAction::Block),
            rule("mid-a", 50, RuleAction::Flag),
            rule("mid-b", 50, RuleAction::Allow),
        ])
        .unwrap();

        let order: Vec<_> = set.iter_by_priority().map(|r| r.name.as_str()).collect();
        assert_eq!(order, vec!["high", "mid-a", "mid-b", "low"]);
        assert_eq!(set.get("mid-b").map(|r| r.priority), Some(50));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = RuleSet::new(vec![
            rule("dup", 1, RuleAction::Flag),
            rule("dup", 2, RuleAction::Block),
        ]);
        assert!(matches!(result, Err(CompilerError::Validation(_))));
    }

    #[test]
    fn test_version_tracks_content() {
        let a = RuleSet::new(vec![rule("r", 1, RuleAction::Flag)]).unwrap();
        let b = RuleSet::new(vec![rule("r", 1, RuleAction::Flag)]).unwrap();
        let c = RuleSet::new(vec![rule("r", 2, RuleAction::Flag)]).unwrap();

        assert_eq!(a.version(), b.version());
        assert_ne!(a.version(), c.version());
        assert_eq!(a.version().len(), 64);
        assert_eq!(RuleSet::empty().version(), RuleSet::new(vec![]).unwrap().version());
    }
}
