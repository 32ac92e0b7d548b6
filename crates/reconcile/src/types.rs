//! Typed model of a classifier group record
//!
//! The classifier speaks JSON in which `null` doubles as "delete this entry".
//! Here that convention is made explicit with [`ParamValue::Delete`] and
//! [`ClassEntry::Delete`]; the serde impls translate to and from `null`.

use crate::error::{Error, Result};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Parent group used when a group is created without an explicit parent
pub const DEFAULT_PARENT: &str = "All Nodes";

/// Value of a single class parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    /// Set the parameter to this value
    Set(Value),
    /// Remove the parameter on the next write
    Delete,
}

impl ParamValue {
    /// Build a `Set` value from anything convertible to JSON
    pub fn set(value: impl Into<Value>) -> Self {
        Self::Set(value.into())
    }

    /// Check if this is the deletion marker
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Set(value) => value.serialize(serializer),
            Self::Delete => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ParamValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(if value.is_null() {
            Self::Delete
        } else {
            Self::Set(value)
        })
    }
}

/// Parameters of one class
pub type Params = BTreeMap<String, ParamValue>;

/// A class attached to a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassEntry {
    /// Class present with these parameters
    Params(Params),
    /// Remove the whole class on the next write
    Delete,
}

impl ClassEntry {
    /// An empty parameter mapping
    pub fn empty() -> Self {
        Self::Params(Params::new())
    }

    /// Check if this is the deletion marker
    pub fn is_delete(&self) -> bool {
        matches!(self, Self::Delete)
    }

    /// Borrow the parameters, if this is not a deletion marker
    pub fn params(&self) -> Option<&Params> {
        match self {
            Self::Params(params) => Some(params),
            Self::Delete => None,
        }
    }

    /// Mutably borrow the parameters, if this is not a deletion marker
    pub fn params_mut(&mut self) -> Option<&mut Params> {
        match self {
            Self::Params(params) => Some(params),
            Self::Delete => None,
        }
    }
}

impl Serialize for ClassEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Params(params) => params.serialize(serializer),
            Self::Delete => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for ClassEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        Ok(Option::<Params>::deserialize(deserializer)?.map_or(Self::Delete, Self::Params))
    }
}

/// Class name to class entry
pub type Classes = BTreeMap<String, ClassEntry>;

/// Boolean operator applied to a whole rule chain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Conjunction {
    And,
    #[default]
    Or,
}

impl Conjunction {
    /// Wire tag for this conjunction
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::And => "and",
            Self::Or => "or",
        }
    }
}

impl fmt::Display for Conjunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Conjunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "and" => Ok(Self::And),
            "or" => Ok(Self::Or),
            other => Err(Error::invalid(format!(
                "illegal rule conjunction '{other}', allowed: 'and', 'or'"
            ))),
        }
    }
}

impl Serialize for Conjunction {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Conjunction {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        tag.parse().map_err(de::Error::custom)
    }
}

/// One `(operator, field, value)` match requested for a rule chain
///
/// `field` is usually a string such as `"name"` but the classifier also
/// accepts fact paths like `["fact", "os"]`, so both slots hold JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(String, Value, Value)", into = "(String, Value, Value)")]
pub struct Predicate {
    pub operator: String,
    pub field: Value,
    pub value: Value,
}

impl Predicate {
    pub fn new(operator: impl Into<String>, field: impl Into<Value>, value: impl Into<Value>) -> Self {
        Self {
            operator: operator.into(),
            field: field.into(),
            value: value.into(),
        }
    }
}

impl From<(String, Value, Value)> for Predicate {
    fn from((operator, field, value): (String, Value, Value)) -> Self {
        Self {
            operator,
            field,
            value,
        }
    }
}

impl From<Predicate> for (String, Value, Value) {
    fn from(p: Predicate) -> Self {
        (p.operator, p.field, p.value)
    }
}

impl From<Predicate> for Value {
    fn from(p: Predicate) -> Self {
        Self::Array(vec![Self::String(p.operator), p.field, p.value])
    }
}

/// A rule chain: `[conjunction, clause, ...]` on the wire
///
/// Clauses stay opaque JSON. Besides `[operator, field, value]` predicates
/// the service stores `["not", clause]` and nested `["and", ...]` chains, and
/// a group read back must survive whatever its rule holds. Only rules coming
/// from a request are held to the predicate shape, see [`Rule::requested`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rule {
    pub conjunction: Conjunction,
    pub predicates: Vec<Value>,
}

impl Rule {
    /// A rule with no predicates yet
    pub fn new(conjunction: Conjunction) -> Self {
        Self {
            conjunction,
            predicates: Vec::new(),
        }
    }

    /// Convert raw JSON items (`[conjunction, clause, ...]`)
    ///
    /// Only the conjunction is checked.
    pub fn from_values(items: Vec<Value>) -> Result<Self> {
        let mut items = items.into_iter();
        let conjunction = match items.next() {
            Some(Value::String(tag)) => tag.parse()?,
            Some(other) => {
                return Err(Error::invalid(format!(
                    "rule must start with a conjunction, found {other}"
                )));
            }
            None => return Err(Error::invalid("rule is missing its conjunction")),
        };
        Ok(Self {
            conjunction,
            predicates: items.collect(),
        })
    }

    /// Convert a JSON value that should be a rule array
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) => Self::from_values(items),
            other => Err(Error::invalid(format!("rule must be a JSON array, found {other}"))),
        }
    }

    /// Convert a requested rule, requiring every clause to be a predicate
    pub fn requested(value: Value) -> Result<Self> {
        let rule = Self::from_json(value)?;
        for item in &rule.predicates {
            serde_json::from_value::<Predicate>(item.clone()).map_err(|e| {
                Error::invalid(format!(
                    "rule predicate {item} must be [operator, field, value]: {e}"
                ))
            })?;
        }
        Ok(rule)
    }
}

impl Serialize for Rule {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.predicates.len() + 1))?;
        seq.serialize_element(&self.conjunction)?;
        for predicate in &self.predicates {
            seq.serialize_element(predicate)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for Rule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let items = Vec::<Value>::deserialize(deserializer)?;
        Rule::from_values(items).map_err(de::Error::custom)
    }
}

/// Absent, `null` and `[]` rules all mean "no rule yet"
fn deserialize_optional_rule<'de, D>(deserializer: D) -> std::result::Result<Option<Rule>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Vec<Value>>::deserialize(deserializer)? {
        None => Ok(None),
        Some(items) if items.is_empty() => Ok(None),
        Some(items) => Rule::from_values(items).map(Some).map_err(de::Error::custom),
    }
}

/// A classifier group as returned by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupRecord {
    /// Assigned by the service; absent until the group exists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: String,
    /// Id of the containing group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub classes: Classes,
    #[serde(
        default,
        deserialize_with = "deserialize_optional_rule",
        skip_serializing_if = "Option::is_none"
    )]
    pub rule: Option<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_trumps: Option<bool>,
}

impl GroupRecord {
    /// A record with only a name, as used before the group exists remotely
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Payload of an update-group call
///
/// The service replaces every field that is present, so callers send the full
/// desired value of each field rather than a partial patch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupDelta {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classes: Option<Classes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule: Option<Rule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment_trumps: Option<bool>,
}

/// Payload of a create-group call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewGroup {
    pub name: String,
    /// Id of the parent group
    pub parent: String,
    pub classes: Classes,
}
