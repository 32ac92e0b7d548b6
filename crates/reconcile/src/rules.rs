//! Idempotent edits to a group's rule chain
//!
//! A rule chain is one conjunction applied to an ordered list of predicates:
//!
//! ```text
//! ["or", ["=", "name", "bob"], ["=", "name", "alice"]]
//! ```
//!
//! Append mode treats the predicates as an ordered set: existing entries keep
//! their position and only unseen predicates are added at the end. Replace
//! mode swaps the whole chain.

use crate::error::{Error, Result};
use crate::types::{Conjunction, GroupRecord, Rule};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// How a requested rule is combined with the group's current rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RuleMode {
    /// Keep existing predicates, add missing ones
    #[default]
    Append,
    /// Overwrite the whole rule
    Replace,
}

impl RuleMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Append => "append",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for RuleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "append" => Ok(Self::Append),
            "replace" => Ok(Self::Replace),
            other => Err(Error::invalid(format!(
                "invalid rule mode '{other}', allowed: 'append', 'replace'"
            ))),
        }
    }
}

/// Make `op` the conjunction of the group's rule chain
///
/// Changing the conjunction changes the meaning of every predicate already in
/// the chain. An absent rule is first initialized to the default conjunction.
/// `op` is validated before the record is touched.
pub fn ensure_conjunction(record: &mut GroupRecord, op: &str) -> Result<bool> {
    let conjunction: Conjunction = op.parse()?;
    let rule = record.rule.get_or_insert_with(Rule::default);
    if rule.conjunction == conjunction {
        return Ok(false);
    }
    log::debug!(
        "{}: rule conjunction {} -> {}",
        record.name,
        rule.conjunction,
        conjunction
    );
    rule.conjunction = conjunction;
    Ok(true)
}

/// Append `predicate` unless an identical clause is already in the chain
pub fn ensure_predicate(record: &mut GroupRecord, predicate: &Value) -> bool {
    let rule = record.rule.get_or_insert_with(Rule::default);
    if rule.predicates.contains(predicate) {
        return false;
    }
    log::info!("Appending rule: {predicate}");
    rule.predicates.push(predicate.clone());
    true
}

/// Merge `requested` into the group's rule chain (append mode)
///
/// `requested` should come from [`Rule::requested`] so that only well-formed
/// predicates are appended.
pub fn ensure_rules(record: &mut GroupRecord, requested: &Rule) -> Result<bool> {
    let mut changed = ensure_conjunction(record, requested.conjunction.as_str())?;
    for predicate in &requested.predicates {
        changed = ensure_predicate(record, predicate) || changed;
    }
    Ok(changed)
}

/// Overwrite the group's rule with `rule_json` if it differs (replace mode)
///
/// The payload must be a well-formed rule: a legal conjunction followed by
/// `[operator, field, value]` predicates.
pub fn replace_rule(record: &mut GroupRecord, rule_json: &Value) -> Result<bool> {
    let rule = Rule::requested(rule_json.clone())?;
    if record.rule.as_ref() == Some(&rule) {
        return Ok(false);
    }
    log::debug!("{}: replacing rule", record.name);
    record.rule = Some(rule);
    Ok(true)
}

/// Apply a rule given as JSON text in the requested mode
pub fn apply_rule_request(record: &mut GroupRecord, rule_text: &str, mode: RuleMode) -> Result<bool> {
    let rule_json: Value = serde_json::from_str(rule_text).map_err(|e| {
        Error::invalid(format!("syntax error in rule (must be valid JSON): {e}"))
    })?;
    match mode {
        RuleMode::Replace => replace_rule(record, &rule_json),
        RuleMode::Append => ensure_rules(record, &Rule::requested(rule_json)?),
    }
}
