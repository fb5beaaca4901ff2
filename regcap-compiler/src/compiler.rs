//! Rule set compiler
//!
//! Compiles the YAML rule definition list into a [`RuleSet`]:
//!
//! ```yaml
//! - name: block-sanctioned-originator
//!   priority: 100
//!   action: block
//!   when:
//!     any:
//!       - { field: originator.jurisdiction, op: in, value: [KP, IR] }
//!   description: Sanctioned jurisdictions
//! ```
//!
//! The document may also be a mapping with a top-level `rules` list.
//! Every rule is checked before anything is returned, so a caller never
//! sees a partially valid set.

use regcap_core::{ConditionLeaf, ConditionOperator, PolicyRule, RuleAction, RuleCondition};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::{CompilerError, RuleSet};

/// Deepest `any`/`all` nesting accepted in a condition tree
const MAX_CONDITION_DEPTH: usize = 16;

fn invalid(msg: String) -> CompilerError {
    CompilerError::Validation(msg)
}

/// A blank document is never an empty rule set; only an explicit `[]` is
fn empty_document() -> CompilerError {
    invalid("rule document is empty".to_string())
}

/// Compiler for YAML rule sets
pub struct RuleCompiler;

impl RuleCompiler {
    pub fn new() -> Self {
        Self
    }

    /// Parse and validate a YAML rule source into an immutable rule set
    pub fn compile(&self, source: &str) -> Result<RuleSet, CompilerError> {
        if source.trim().is_empty() {
            return Err(empty_document());
        }
        let document: Value = serde_yaml::from_str(source)?;
        let rules = self.compile_value(&document)?;
        let set = RuleSet::new(rules)?;

        info!(
            rules = set.len(),
            version = %set.version(),
            "Compiled rule set"
        );
        Ok(set)
    }

    /// Validate rule source without keeping the result
    pub fn validate(&self, source: &str) -> Result<(), CompilerError> {
        self.compile(source).map(|_| ())
    }

    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<RuleSet, CompilerError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading rule set");
        let source = std::fs::read_to_string(path)?;
        self.compile(&source)
    }

    /// Validate an already-parsed document (YAML or JSON) into typed rules
    pub fn compile_value(&self, document: &Value) -> Result<Vec<PolicyRule>, CompilerError> {
        let list = match document {
            Value::Array(items) => items,
            Value::Object(map) => match map.get("rules") {
                Some(Value::Array(items)) => items,
                _ => {
                    return Err(invalid(
                        "rule document must be a list or contain a 'rules' list".to_string(),
                    ))
                }
            },
            Value::Null => return Err(empty_document()),
            _ => {
                return Err(invalid(
                    "rule document must be a list of rule definitions".to_string(),
                ))
            }
        };

        list.iter()
            .enumerate()
            .map(|(idx, item)| compile_rule(idx, item))
            .collect()
    }

    /// Apply the document checks to a rule built in code
    pub fn validate_rule(&self, rule: &PolicyRule) -> Result<(), CompilerError> {
        if rule.name.trim().is_empty() {
            return Err(invalid("rule: missing 'name'".to_string()));
        }
        let ctx = format!("rule '{}'", rule.name);
        validate_condition(&ctx, &rule.when, 0)
    }
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn compile_rule(idx: usize, item: &Value) -> Result<PolicyRule, CompilerError> {
    let map = item
        .as_object()
        .ok_or_else(|| invalid(format!("rule #{}: definition must be a mapping", idx)))?;

    let name = match map.get("name") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::String(_)) | None | Some(Value::Null) => {
            return Err(invalid(format!("rule #{}: missing 'name'", idx)))
        }
        Some(_) => return Err(invalid(format!("rule #{}: 'name' must be a string", idx))),
    };
    let ctx = format!("rule '{}'", name);

    let action = match map.get("action") {
        Some(Value::String(s)) => s
            .parse::<RuleAction>()
            .map_err(|e| invalid(format!("{}: {}", ctx, e)))?,
        None | Some(Value::Null) => return Err(invalid(format!("{}: missing 'action'", ctx))),
        Some(_) => return Err(invalid(format!("{}: 'action' must be a string", ctx))),
    };

    let priority = match map.get("priority") {
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| invalid(format!("{}: 'priority' must be an integer", ctx)))?,
        None | Some(Value::Null) => return Err(invalid(format!("{}: missing 'priority'", ctx))),
        Some(_) => return Err(invalid(format!("{}: 'priority' must be an integer", ctx))),
    };

    let when = match map.get("when") {
        Some(cond) => compile_condition(&ctx, cond, 0)?,
        None => return Err(invalid(format!("{}: missing 'when'", ctx))),
    };

    let description = match map.get("description") {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => None,
        Some(_) => return Err(invalid(format!("{}: 'description' must be a string", ctx))),
    };

    Ok(PolicyRule {
        name,
        priority,
        when,
        action,
        description,
    })
}

fn compile_condition(ctx: &str, value: &Value, depth: usize) -> Result<RuleCondition, CompilerError> {
    if depth > MAX_CONDITION_DEPTH {
        return Err(invalid(format!(
            "{}: condition nesting exceeds {} levels",
            ctx, MAX_CONDITION_DEPTH
        )));
    }

    let map = value
        .as_object()
        .ok_or_else(|| invalid(format!("{}: condition must be a mapping", ctx)))?;

    let group = |items: &Value, key: &str| -> Result<Vec<RuleCondition>, CompilerError> {
        let items = items
            .as_array()
            .ok_or_else(|| invalid(format!("{}: '{}' must be a list", ctx, key)))?;
        if items.is_empty() {
            return Err(invalid(format!("{}: '{}' must not be empty", ctx, key)));
        }
        items
            .iter()
            .map(|c| compile_condition(ctx, c, depth + 1))
            .collect()
    };

    match (map.get("any"), map.get("all")) {
        (Some(_), Some(_)) => Err(invalid(format!(
            "{}: condition cannot combine 'any' and 'all' at one level",
            ctx
        ))),
        (Some(items), None) => Ok(RuleCondition::Any {
            any: group(items, "any")?,
        }),
        (None, Some(items)) => Ok(RuleCondition::All {
            all: group(items, "all")?,
        }),
        (None, None) => compile_leaf(ctx, map).map(RuleCondition::Leaf),
    }
}

fn compile_leaf(
    ctx: &str,
    map: &serde_json::Map<String, Value>,
) -> Result<ConditionLeaf, CompilerError> {
    let field = match map.get("field") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => {
            return Err(invalid(format!(
                "{}: condition needs 'any', 'all' or a non-empty 'field'",
                ctx
            )))
        }
    };

    let op = match map.get("op") {
        Some(Value::String(s)) => s
            .parse::<ConditionOperator>()
            .map_err(|e| invalid(format!("{} field '{}': {}", ctx, field, e)))?,
        _ => {
            return Err(invalid(format!(
                "{} field '{}': missing 'op'",
                ctx, field
            )))
        }
    };

    let value = map.get("value").cloned().unwrap_or(Value::Null);
    check_operand(ctx, &field, op, &value)?;

    Ok(ConditionLeaf { field, op, value })
}

fn check_operand(
    ctx: &str,
    field: &str,
    op: ConditionOperator,
    value: &Value,
) -> Result<(), CompilerError> {
    match op {
        ConditionOperator::In | ConditionOperator::NotIn if !value.is_array() => Err(invalid(
            format!("{} field '{}': '{}' needs a list value", ctx, field, op),
        )),
        ConditionOperator::Exists if !(value.is_null() || value.is_boolean()) => {
            Err(invalid(format!(
                "{} field '{}': 'exists' takes true, false or no value",
                ctx, field
            )))
        }
        ConditionOperator::Gt
        | ConditionOperator::Gte
        | ConditionOperator::Lt
        | ConditionOperator::Lte
            if value.is_null() =>
        {
            Err(invalid(format!(
                "{} field '{}': '{}' needs a value",
                ctx, field, op
            )))
        }
        _ => Ok(()),
    }
}

fn validate_condition(ctx: &str, condition: &RuleCondition, depth: usize) -> Result<(), CompilerError> {
    if depth > MAX_CONDITION_DEPTH {
        return Err(invalid(format!(
            "{}: condition nesting exceeds {} levels",
            ctx, MAX_CONDITION_DEPTH
        )));
    }

    let (key, items) = match condition {
        RuleCondition::Any { any } => ("any", any),
        RuleCondition::All { all } => ("all", all),
        RuleCondition::Leaf(leaf) => {
            if leaf.field.trim().is_empty() {
                return Err(invalid(format!(
                    "{}: condition needs 'any', 'all' or a non-empty 'field'",
                    ctx
                )));
            }
            return check_operand(ctx, &leaf.field, leaf.op, &leaf.value);
        }
    };
    if items.is_empty() {
        return Err(invalid(format!("{}: '{}' must not be empty", ctx, key)));
    }
    items
        .iter()
        .try_for_each(|c| validate_condition(ctx, c, depth + 1))
}
