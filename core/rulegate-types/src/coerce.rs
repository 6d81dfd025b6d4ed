//! Coercion of raw caller strings into typed fact values.

use crate::{FactError, FactKind, FactValue};
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Pattern used for timestamp facts when none is configured.
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// How boolean facts treat values other than `true`/`false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BooleanParsing {
    /// `"true"` (any case) is true, anything else is false.
    #[default]
    Permissive,
    /// Only `"true"`/`"false"` (any case) are accepted.
    Strict,
}

/// Converts raw strings into values of a declared [`FactKind`].
#[derive(Debug, Clone)]
pub struct TypeCoercer {
    datetime_format: String,
    booleans: BooleanParsing,
}

impl Default for TypeCoercer {
    fn default() -> Self {
        Self::new(DEFAULT_DATETIME_FORMAT)
    }
}

impl TypeCoercer {
    pub fn new(datetime_format: impl Into<String>) -> Self {
        Self {
            datetime_format: datetime_format.into(),
            booleans: BooleanParsing::default(),
        }
    }

    #[must_use]
    pub fn with_boolean_parsing(mut self, booleans: BooleanParsing) -> Self {
        self.booleans = booleans;
        self
    }

    pub fn datetime_format(&self) -> &str {
        &self.datetime_format
    }

    /// Coerces a single raw value of `fact` into `kind`.
    ///
    /// A successful result always has kind `kind`, so list members never
    /// mix kinds.
    pub fn coerce(&self, fact: &str, raw: &str, kind: FactKind) -> Result<FactValue, FactError> {
        let fail = |reason: String| FactError::Coercion {
            fact: fact.to_string(),
            value: format!("\"{raw}\""),
            expected: kind.to_string(),
            reason,
        };

        match kind {
            FactKind::Text => Ok(FactValue::Text(raw.to_string())),
            FactKind::Decimal => BigDecimal::from_str(raw)
                .map(FactValue::Decimal)
                .map_err(|e| fail(e.to_string())),
            FactKind::Double => raw
                .trim()
                .parse::<f64>()
                .map(FactValue::Double)
                .map_err(|e| fail(e.to_string())),
            FactKind::Integer => raw
                .parse::<i32>()
                .map(FactValue::Integer)
                .map_err(|e| fail(e.to_string())),
            FactKind::Boolean => self.parse_boolean(raw).ok_or_else(|| {
                fail("strict boolean facts accept only \"true\" or \"false\"".to_string())
            }),
            FactKind::Timestamp => self.parse_timestamp(raw).map_err(|_| {
                fail(format!(
                    "make sure the value applies to the format \"{}\"",
                    self.datetime_format
                ))
            }),
        }
    }

    /// Coerces every raw member of a list fact into `member`. The first
    /// member that fails to coerce fails the whole list.
    pub fn coerce_list(
        &self,
        fact: &str,
        raws: &[String],
        member: FactKind,
    ) -> Result<FactValue, FactError> {
        raws.iter()
            .map(|raw| self.coerce(fact, raw, member))
            .collect::<Result<Vec<_>, _>>()
            .map(FactValue::List)
    }

    fn parse_boolean(&self, raw: &str) -> Option<FactValue> {
        let truthy = raw.eq_ignore_ascii_case("true");
        match self.booleans {
            BooleanParsing::Permissive => Some(FactValue::Boolean(truthy)),
            BooleanParsing::Strict if truthy || raw.eq_ignore_ascii_case("false") => {
                Some(FactValue::Boolean(truthy))
            }
            BooleanParsing::Strict => None,
        }
    }

    // Date-only patterns cannot produce a NaiveDateTime directly, so they
    // fall back to midnight of the parsed day.
    fn parse_timestamp(&self, raw: &str) -> Result<FactValue, chrono::ParseError> {
        let format = self.datetime_format.as_str();
        match NaiveDateTime::parse_from_str(raw, format) {
            Ok(ts) => Ok(FactValue::Timestamp(ts)),
            Err(full) => match NaiveDate::parse_from_str(raw, format) {
                Ok(day) => day
                    .and_hms_opt(0, 0, 0)
                    .map(FactValue::Timestamp)
                    .ok_or(full),
                Err(_) => Err(full),
            },
        }
    }
}
