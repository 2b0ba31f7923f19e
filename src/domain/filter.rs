//! Filter stage: score threshold plus categorical predicates.
//!
//! A predicate with an empty allowed set selects everything. A non-empty
//! predicate applies only when the table carries that column at all; when
//! it does, rows without a value for it are excluded. Matching ignores
//! case and surrounding whitespace.

use crate::domain::row::ResultTable;
use crate::domain::universe::{Categorized, CategoryField, SymbolInput};
use std::collections::{BTreeMap, BTreeSet};

pub const DEFAULT_MIN_SCORE: u8 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCriteria {
    pub min_score: u8,
    allowed: BTreeMap<CategoryField, BTreeSet<String>>,
}

impl Default for FilterCriteria {
    fn default() -> Self {
        FilterCriteria::new(DEFAULT_MIN_SCORE)
    }
}

fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

impl FilterCriteria {
    pub fn new(min_score: u8) -> Self {
        FilterCriteria {
            min_score,
            allowed: BTreeMap::new(),
        }
    }

    /// Restricts `field` to `values`. Blank values are ignored, so an
    /// all-blank list leaves the field unconstrained.
    pub fn allow<I, S>(mut self, field: CategoryField, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = values
            .into_iter()
            .map(|v| normalize(v.as_ref()))
            .filter(|v| !v.is_empty())
            .collect();
        if set.is_empty() {
            self.allowed.remove(&field);
        } else {
            self.allowed.insert(field, set);
        }
        self
    }

    pub fn allowed(&self, field: CategoryField) -> Option<&BTreeSet<String>> {
        self.allowed.get(&field)
    }

    pub fn has_categorical(&self) -> bool {
        !self.allowed.is_empty()
    }

    fn matches<T: Categorized>(&self, item: &T, carried: impl Fn(CategoryField) -> bool) -> bool {
        self.allowed.iter().all(|(field, set)| {
            if !carried(*field) {
                return true;
            }
            item.category(*field)
                .is_some_and(|value| set.contains(&normalize(value)))
        })
    }
}

/// Order-preserving subset of `table` that meets `criteria`.
pub fn filter(table: &ResultTable, criteria: &FilterCriteria) -> ResultTable {
    let rows = table
        .rows()
        .iter()
        .filter(|row| row.score() >= criteria.min_score)
        .filter(|row| criteria.matches(*row, |f| table.carries(f)))
        .cloned()
        .collect();
    table.with_rows(rows)
}

/// Applies only the categorical predicates to the input list, before any
/// history is fetched.
pub fn prefilter(
    inputs: Vec<SymbolInput>,
    carried: &BTreeSet<CategoryField>,
    criteria: &FilterCriteria,
) -> Vec<SymbolInput> {
    if !criteria.has_categorical() {
        return inputs;
    }
    inputs
        .into_iter()
        .filter(|input| criteria.matches(input, |f| carried.contains(&f)))
        .collect()
}
