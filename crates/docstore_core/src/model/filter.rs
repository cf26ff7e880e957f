//! List-query filter: row range plus OR-of-AND term conditions.
//!
//! # Invariants
//! - A filter without include parts matches every record.
//! - A part without conditions matches every record.
//! - Term values compare as text, byte-wise.
//! - Row numbers are 1-based and inclusive; `from > to` selects nothing.

use super::record::StorageTerm;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Comparison applied between a term value and a condition value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationalOperator {
    EqualTo,
    NotEqualTo,
    LessThan,
    LessThanOrEqualTo,
    GreaterThan,
    GreaterThanOrEqualTo,
}

impl RelationalOperator {
    /// Evaluates `actual <op> expected`.
    pub fn evaluate(self, actual: &str, expected: &str) -> bool {
        let ordering = actual.cmp(expected);
        match self {
            Self::EqualTo => ordering == Ordering::Equal,
            Self::NotEqualTo => ordering != Ordering::Equal,
            Self::LessThan => ordering == Ordering::Less,
            Self::LessThanOrEqualTo => ordering != Ordering::Greater,
            Self::GreaterThan => ordering == Ordering::Greater,
            Self::GreaterThanOrEqualTo => ordering != Ordering::Less,
        }
    }
}

/// `(key, operator, value)` evaluated against a record's storage terms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterCondition {
    pub key: String,
    pub operator: RelationalOperator,
    pub value: String,
}

impl FilterCondition {
    pub fn new(
        key: impl Into<String>,
        operator: RelationalOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            operator,
            value: value.into(),
        }
    }

    /// True when some term has this key and a value satisfying the operator.
    pub fn is_satisfied_by<'a>(&self, terms: impl IntoIterator<Item = &'a StorageTerm>) -> bool {
        terms
            .into_iter()
            .any(|term| term.key == self.key && self.operator.evaluate(&term.value, &self.value))
    }
}

/// Conjunction of conditions.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterPart {
    pub conditions: Vec<FilterCondition>,
}

impl FilterPart {
    pub fn new(conditions: impl IntoIterator<Item = FilterCondition>) -> Self {
        Self {
            conditions: conditions.into_iter().collect(),
        }
    }

    pub fn matches<'a, I>(&self, terms: I) -> bool
    where
        I: IntoIterator<Item = &'a StorageTerm> + Clone,
    {
        self.conditions
            .iter()
            .all(|condition| condition.is_satisfied_by(terms.clone()))
    }
}

/// Query descriptor for `read_list` and record counts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Filter {
    pub from_row_number: Option<u64>,
    pub to_row_number: Option<u64>,
    #[serde(default)]
    pub include_parts: Vec<FilterPart>,
}

impl Filter {
    /// Filter that matches everything and returns every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_row_range(mut self, from: Option<u64>, to: Option<u64>) -> Self {
        self.from_row_number = from;
        self.to_row_number = to;
        self
    }

    pub fn include(mut self, part: FilterPart) -> Self {
        self.include_parts.push(part);
        self
    }

    pub fn has_include_parts(&self) -> bool {
        !self.include_parts.is_empty()
    }

    /// Applies the include parts to one record's terms.
    pub fn matches<'a, I>(&self, terms: I) -> bool
    where
        I: IntoIterator<Item = &'a StorageTerm> + Clone,
    {
        if !self.has_include_parts() {
            return true;
        }
        self.include_parts
            .iter()
            .any(|part| part.matches(terms.clone()))
    }

    /// Returns the zero-based index range selected by the row bounds for a
    /// result of `len` rows.
    pub fn row_window(&self, len: usize) -> std::ops::Range<usize> {
        let start = self
            .from_row_number
            .map_or(0, |from| from.saturating_sub(1))
            .min(len as u64) as usize;
        let end = match self.to_row_number {
            Some(to) => (to.min(len as u64) as usize).max(start),
            None => len,
        };
        start..end
    }
}
