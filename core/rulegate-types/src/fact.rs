//! Fact kinds, declared shapes and values.

use crate::FactError;
use bigdecimal::BigDecimal;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The primitive kinds an artifact fact can be declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FactKind {
    Text,
    Decimal,
    Double,
    Integer,
    Boolean,
    Timestamp,
}

impl FactKind {
    pub const ALL: [FactKind; 6] = [
        FactKind::Text,
        FactKind::Decimal,
        FactKind::Double,
        FactKind::Integer,
        FactKind::Boolean,
        FactKind::Timestamp,
    ];

    /// Canonical lowercase name, as used in artifact manifests.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FactKind::Text => "text",
            FactKind::Decimal => "decimal",
            FactKind::Double => "double",
            FactKind::Integer => "integer",
            FactKind::Boolean => "boolean",
            FactKind::Timestamp => "timestamp",
        }
    }

    /// Parses a declared kind name for `fact`, reporting unknown kinds as
    /// [`FactError::UnsupportedFactType`].
    pub fn resolve(fact: &str, kind: &str) -> Result<Self, FactError> {
        kind.parse().map_err(|_| FactError::UnsupportedFactType {
            fact: fact.to_string(),
            kind: kind.to_string(),
        })
    }
}

impl fmt::Display for FactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FactKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FactKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| s.to_string())
    }
}

/// Declared type of a fact accessor.
///
/// Kinds are kept as the raw names the artifact declared so that an
/// unsupported kind is reported against the fact that uses it, not when
/// the artifact is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "lowercase")]
pub enum FactShape {
    Scalar { kind: String },
    /// `member` is the kind accepted by the list's member appender. An
    /// artifact that declares a list without one has no way to receive
    /// members.
    List {
        #[serde(default)]
        member: Option<String>,
    },
}

impl FactShape {
    #[must_use]
    pub fn scalar(kind: FactKind) -> Self {
        FactShape::Scalar {
            kind: kind.as_str().to_string(),
        }
    }

    #[must_use]
    pub fn list(member: FactKind) -> Self {
        FactShape::List {
            member: Some(member.as_str().to_string()),
        }
    }
}

/// A coerced, typed fact value ready to be bound into an artifact.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FactValue {
    Text(String),
    Decimal(BigDecimal),
    Double(f64),
    Integer(i32),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    List(Vec<FactValue>),
}

impl FactValue {
    /// Kind of a scalar value; `None` for lists.
    #[must_use]
    pub fn kind(&self) -> Option<FactKind> {
        match self {
            FactValue::Text(_) => Some(FactKind::Text),
            FactValue::Decimal(_) => Some(FactKind::Decimal),
            FactValue::Double(_) => Some(FactKind::Double),
            FactValue::Integer(_) => Some(FactKind::Integer),
            FactValue::Boolean(_) => Some(FactKind::Boolean),
            FactValue::Timestamp(_) => Some(FactKind::Timestamp),
            FactValue::List(_) => None,
        }
    }

    #[must_use]
    pub fn as_decimal(&self) -> Option<&BigDecimal> {
        match self {
            FactValue::Decimal(d) => Some(d),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[FactValue]> {
        match self {
            FactValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Caller input for a single fact, before coercion.
///
/// Request bodies are loosely typed: numbers and booleans are accepted and
/// treated as their textual form, the same as strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFact {
    Single(String),
    Many(Vec<String>),
}

impl RawFact {
    /// Converts a JSON request value for `fact`.
    pub fn from_json(fact: &str, value: &serde_json::Value) -> Result<Self, FactError> {
        match value {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| scalar_text(fact, item))
                .collect::<Result<Vec<_>, _>>()
                .map(RawFact::Many),
            other => scalar_text(fact, other).map(RawFact::Single),
        }
    }

    /// The single value, or a coercion error if a list was supplied.
    pub fn as_single(&self, fact: &str, expected: FactKind) -> Result<&str, FactError> {
        match self {
            RawFact::Single(value) => Ok(value),
            RawFact::Many(values) => Err(FactError::Coercion {
                fact: fact.to_string(),
                value: format!("{values:?}"),
                expected: expected.to_string(),
                reason: "a list was given for a single-valued fact".to_string(),
            }),
        }
    }

    /// The list of values, or a coercion error if a single value was supplied.
    pub fn as_many(&self, fact: &str, member: FactKind) -> Result<&[String], FactError> {
        match self {
            RawFact::Many(values) => Ok(values),
            RawFact::Single(value) => Err(FactError::Coercion {
                fact: fact.to_string(),
                value: format!("{value:?}"),
                expected: format!("list of {member}"),
                reason: "a single value was given for a list fact".to_string(),
            }),
        }
    }
}

fn scalar_text(fact: &str, value: &serde_json::Value) -> Result<String, FactError> {
    match value {
        serde_json::Value::String(s) => Ok(s.clone()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(FactError::Coercion {
            fact: fact.to_string(),
            value: other.to_string(),
            expected: "a string, number or boolean".to_string(),
            reason: "nested objects, nested lists and nulls cannot be bound".to_string(),
        }),
    }
}
