//! Criteria set differ.
//!
//! Criteria are compared as sets keyed by `(field, condition)`. The order of
//! criteria within a group is irrelevant; the order of `values` inside one
//! criterion is not.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::model::{Criterion, CriterionKey};

/// One change to a criterion set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CriterionOp {
    /// The key exists only in the declared set.
    Add(Criterion),
    /// The key exists only in the observed set.
    Remove(Criterion),
    /// The key exists on both sides with different values; carries the
    /// declared criterion.
    Replace(Criterion),
}

impl CriterionOp {
    /// The criterion this operation carries.
    pub fn criterion(&self) -> &Criterion {
        match self {
            CriterionOp::Add(c) | CriterionOp::Remove(c) | CriterionOp::Replace(c) => c,
        }
    }

    /// The key this operation affects.
    pub fn key(&self) -> CriterionKey {
        self.criterion().key()
    }
}

fn index(criteria: &[Criterion]) -> BTreeMap<CriterionKey, &Criterion> {
    criteria.iter().map(|c| (c.key(), c)).collect()
}

/// Compute the operations that turn `observed` into `declared`.
///
/// Operations are returned in key order. Identical sets yield no operations.
pub fn diff_criteria(observed: &[Criterion], declared: &[Criterion]) -> Vec<CriterionOp> {
    let observed = index(observed);
    let declared = index(declared);
    let mut ops = Vec::new();

    for (key, wanted) in &declared {
        match observed.get(key) {
            None => ops.push(CriterionOp::Add((*wanted).clone())),
            Some(current) if current.values != wanted.values => {
                ops.push(CriterionOp::Replace((*wanted).clone()));
            }
            Some(_) => {}
        }
    }

    for (key, current) in &observed {
        if !declared.contains_key(key) {
            ops.push(CriterionOp::Remove((*current).clone()));
        }
    }

    ops.sort_by_key(CriterionOp::key);
    ops
}

/// Apply operations to a criterion set, returning the resulting set in key
/// order.
pub fn apply_criteria(observed: &[Criterion], ops: &[CriterionOp]) -> Vec<Criterion> {
    let mut state: BTreeMap<CriterionKey, Criterion> =
        observed.iter().map(|c| (c.key(), c.clone())).collect();

    for op in ops {
        match op {
            CriterionOp::Add(c) | CriterionOp::Replace(c) => {
                state.insert(c.key(), c.clone());
            }
            CriterionOp::Remove(c) => {
                state.remove(&c.key());
            }
        }
    }

    state.into_values().collect()
}

/// Check whether two criterion sets are equal under key/values semantics.
pub fn criteria_equal(a: &[Criterion], b: &[Criterion]) -> bool {
    diff_criteria(a, b).is_empty()
}
