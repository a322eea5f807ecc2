//! Finding filter type definitions
//!
//! Closed enumerations for filter actions and criterion conditions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// What the findings service does with findings matched by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterAction {
    /// Matched findings are archived (suppressed).
    Archive,
    /// Matched findings are left untouched.
    #[default]
    Noop,
}

impl FilterAction {
    /// Get all available actions.
    #[must_use]
    pub fn all() -> &'static [FilterAction] {
        &[FilterAction::Archive, FilterAction::Noop]
    }

    /// Get the string representation used by the remote service.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterAction::Archive => "ARCHIVE",
            FilterAction::Noop => "NOOP",
        }
    }
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for FilterAction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ARCHIVE" => Ok(FilterAction::Archive),
            "NOOP" => Ok(FilterAction::Noop),
            _ => Err(ValidationError::UnknownAction {
                value: s.to_string(),
            }),
        }
    }
}

/// Match condition of a single criterion.
///
/// The set is closed: condition strings outside it are rejected when the
/// declared configuration is parsed, never at diff time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

impl Condition {
    /// Get all available conditions.
    #[must_use]
    pub fn all() -> &'static [Condition] {
        &[
            Condition::Equals,
            Condition::NotEquals,
            Condition::GreaterThan,
            Condition::GreaterThanOrEqual,
            Condition::LessThan,
            Condition::LessThanOrEqual,
        ]
    }

    /// Get the string representation used in declared configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Equals => "equals",
            Condition::NotEquals => "not_equals",
            Condition::GreaterThan => "greater_than",
            Condition::GreaterThanOrEqual => "greater_than_or_equal",
            Condition::LessThan => "less_than",
            Condition::LessThanOrEqual => "less_than_or_equal",
        }
    }

    /// Whether this condition compares against a single numeric value.
    ///
    /// Comparators carry exactly one value: an integer or an RFC 3339
    /// timestamp (stored remotely as epoch milliseconds).
    #[must_use]
    pub fn is_comparator(&self) -> bool {
        !matches!(self, Condition::Equals | Condition::NotEquals)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Condition {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Condition::all()
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownCondition {
                value: s.to_string(),
            })
    }
}
