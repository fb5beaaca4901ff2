//! Policy rule definitions
//!
//! A rule pairs a boolean condition tree with an enforcement action.
//! Conditions are `any`/`all` groups over `{field, op, value}` leaves,
//! where `field` is a dotted path into the transaction facts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Block,
    Flag,
}

impl RuleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleAction::Allow => "allow",
            RuleAction::Block => "block",
            RuleAction::Flag => "flag",
        }
    }
}

impl FromStr for RuleAction {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "allow" => Ok(RuleAction::Allow),
            "block" => Ok(RuleAction::Block),
            "flag" => Ok(RuleAction::Flag),
            other => Err(CoreError::Validation(format!(
                "action must be one of allow, block, flag (got '{}')",
                other
            ))),
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    NotIn,
    Contains,
    Exists,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::Eq => "eq",
            ConditionOperator::Ne => "ne",
            ConditionOperator::Gt => "gt",
            ConditionOperator::Gte => "gte",
            ConditionOperator::Lt => "lt",
            ConditionOperator::Lte => "lte",
            ConditionOperator::In => "in",
            ConditionOperator::NotIn => "not_in",
            ConditionOperator::Contains => "contains",
            ConditionOperator::Exists => "exists",
        }
    }
}

impl FromStr for ConditionOperator {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim() {
            "eq" | "==" => ConditionOperator::Eq,
            "ne" | "!=" => ConditionOperator::Ne,
            "gt" | ">" => ConditionOperator::Gt,
            "gte" | ">=" => ConditionOperator::Gte,
            "lt" | "<" => ConditionOperator::Lt,
            "lte" | "<=" => ConditionOperator::Lte,
            "in" => ConditionOperator::In,
            "not_in" => ConditionOperator::NotIn,
            "contains" => ConditionOperator::Contains,
            "exists" => ConditionOperator::Exists,
            other => {
                return Err(CoreError::Validation(format!(
                    "unknown condition operator '{}'",
                    other
                )))
            }
        };
        Ok(op)
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `{field, op, value}` comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionLeaf {
    pub field: String,
    pub op: ConditionOperator,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RuleCondition {
    Any { any: Vec<RuleCondition> },
    All { all: Vec<RuleCondition> },
    Leaf(ConditionLeaf),
}

impl RuleCondition {
    pub fn leaf(field: impl Into<String>, op: ConditionOperator, value: Value) -> Self {
        RuleCondition::Leaf(ConditionLeaf {
            field: field.into(),
            op,
            value,
        })
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        match self {
            RuleCondition::Any { any } => any.iter().map(RuleCondition::leaf_count).sum(),
            RuleCondition::All { all } => all.iter().map(RuleCondition::leaf_count).sum(),
            RuleCondition::Leaf(_) => 1,
        }
    }
}

/// A validated rule, unique by name within a loaded set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub name: String,
    /// Higher value = more important
    pub priority: i64,
    pub when: RuleCondition,
    pub action: RuleAction,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_parsing() {
        assert_eq!("BLOCK".parse::<RuleAction>().unwrap(), RuleAction::Block);
        assert_eq!(" flag ".parse::<RuleAction>().unwrap(), RuleAction::Flag);
        assert!("deny".parse::<RuleAction>().is_err());
    }

    #[test]
    fn test_operator_aliases() {
        assert_eq!(">=".parse::<ConditionOperator>().unwrap(), ConditionOperator::Gte);
        assert_eq!("not_in".parse::<ConditionOperator>().unwrap(), ConditionOperator::NotIn);
        assert!("matches".parse::<ConditionOperator>().is_err());
    }

    #[test]
    fn test_condition_serializes_as_any_all_tree() {
        let condition = RuleCondition::Any {
            any: vec![
                RuleCondition::leaf("amount", ConditionOperator::Gt, json!(1000000)),
                RuleCondition::All {
                    all: vec![RuleCondition::leaf(
                        "originator.kyc_status",
                        ConditionOperator::Eq,
                        json!(false),
                    )],
                },
            ],
        };

        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value["any"][0]["op"], "gt");
        assert_eq!(value["any"][1]["all"][0]["field"], "originator.kyc_status");
        assert_eq!(condition.leaf_count(), 2);

        let parsed: RuleCondition = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, condition);
    }
}
