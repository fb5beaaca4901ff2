//! Condition tree evaluation over transaction facts
//!
//! Fields are dotted paths (`originator.kyc_status`, `esg_kpi_targets.0.kpi_type`).
//! A comparison against a missing or null field is false, except for
//! `exists: false`. Numbers and numeric strings compare numerically.

use regcap_core::{ConditionLeaf, ConditionOperator, RuleCondition};
use serde_json::Value;
use std::cmp::Ordering;

/// Resolve a dotted path; null values count as missing
pub fn resolve<'a>(facts: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = facts;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::String(a), Value::String(b)) => match (as_number(left), as_number(right)) {
            (Some(x), Some(y)) => x.partial_cmp(&y),
            _ => Some(a.cmp(b)),
        },
        _ => as_number(left)?.partial_cmp(&as_number(right)?),
    }
}

fn equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(_), _) | (_, Value::Number(_)) => {
            matches!(compare(left, right), Some(Ordering::Equal))
        }
        _ => left == right,
    }
}

fn contains(haystack: &Value, needle: &Value) -> bool {
    match (haystack, needle) {
        (Value::String(h), Value::String(n)) => h.contains(n.as_str()),
        (Value::Array(items), _) => items.iter().any(|item| equals(item, needle)),
        (Value::Object(map), Value::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn leaf_matches(leaf: &ConditionLeaf, facts: &Value) -> bool {
    let expected = &leaf.value;
    match (leaf.op, resolve(facts, &leaf.field)) {
        (ConditionOperator::Exists, actual) => actual.is_some() == expected.as_bool().unwrap_or(true),
        (_, None) => false,
        (ConditionOperator::Eq, Some(actual)) => equals(actual, expected),
        (ConditionOperator::Ne, Some(actual)) => !equals(actual, expected),
        (ConditionOperator::Gt, Some(actual)) => {
            matches!(compare(actual, expected), Some(Ordering::Greater))
        }
        (ConditionOperator::Gte, Some(actual)) => matches!(
            compare(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        (ConditionOperator::Lt, Some(actual)) => {
            matches!(compare(actual, expected), Some(Ordering::Less))
        }
        (ConditionOperator::Lte, Some(actual)) => matches!(
            compare(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        (ConditionOperator::In, Some(actual)) => expected
            .as_array()
            .map_or(false, |items| items.iter().any(|v| equals(actual, v))),
        (ConditionOperator::NotIn, Some(actual)) => expected
            .as_array()
            .map_or(false, |items| !items.iter().any(|v| equals(actual, v))),
        (ConditionOperator::Contains, Some(actual)) => contains(actual, expected),
    }
}

/// Evaluate a condition tree against flat transaction facts
pub fn matches(condition: &RuleCondition, facts: &Value) -> bool {
    match condition {
        RuleCondition::Any { any } => any.iter().any(|c| matches(c, facts)),
        RuleCondition::All { all } => all.iter().all(|c| matches(c, facts)),
        RuleCondition::Leaf(leaf) => leaf_matches(leaf, facts),
    }
}
