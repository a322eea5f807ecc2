//! Tag reconciler.

use serde::{Deserialize, Serialize};

use crate::model::Tags;

/// One change to a tag map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TagOp {
    Set { key: String, value: String },
    Unset { key: String },
}

impl TagOp {
    /// The tag key this operation affects.
    pub fn key(&self) -> &str {
        match self {
            TagOp::Set { key, .. } | TagOp::Unset { key } => key,
        }
    }
}

/// Computes set/unset operations between an observed and a declared tag map.
///
/// Observed keys starting with an ignored prefix belong to the remote
/// platform: they are never unset.
#[derive(Debug, Clone, Default)]
pub struct TagReconciler {
    ignored_prefixes: Vec<String>,
}

impl TagReconciler {
    /// Create a reconciler ignoring the given key prefixes.
    pub fn new(ignored_prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ignored_prefixes: ignored_prefixes.into_iter().map(Into::into).collect(),
        }
    }

    /// Check whether a key is managed by the remote platform.
    pub fn is_ignored(&self, key: &str) -> bool {
        self.ignored_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Compute the operations that turn `observed` into `declared`.
    ///
    /// Unsets come first, then sets, each in key order.
    pub fn diff(&self, observed: &Tags, declared: &Tags) -> Vec<TagOp> {
        let unsets = observed
            .keys()
            .filter(|k| !declared.contains_key(*k) && !self.is_ignored(k))
            .map(|k| TagOp::Unset { key: k.clone() });

        let sets = declared
            .iter()
            .filter(|(k, v)| observed.get(*k) != Some(*v))
            .map(|(k, v)| TagOp::Set {
                key: k.clone(),
                value: v.clone(),
            });

        unsets.chain(sets).collect()
    }
}

/// Diff two tag maps without ignoring any keys.
pub fn diff_tags(observed: &Tags, declared: &Tags) -> Vec<TagOp> {
    TagReconciler::default().diff(observed, declared)
}

/// Apply operations to a tag map.
pub fn apply_tags(observed: &Tags, ops: &[TagOp]) -> Tags {
    let mut tags = observed.clone();
    for op in ops {
        match op {
            TagOp::Set { key, value } => {
                tags.insert(key.clone(), value.clone());
            }
            TagOp::Unset { key } => {
                tags.remove(key);
            }
        }
    }
    tags
}

/// Tag operations grouped the way the remote service accepts them: one
/// tag call and one untag call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagChanges {
    pub set: Tags,
    pub unset: Vec<String>,
}

impl TagChanges {
    /// Group operations by kind.
    pub fn from_ops(ops: &[TagOp]) -> Self {
        let mut changes = Self::default();
        for op in ops {
            match op {
                TagOp::Set { key, value } => {
                    changes.set.insert(key.clone(), value.clone());
                }
                TagOp::Unset { key } => changes.unset.push(key.clone()),
            }
        }
        changes
    }

    /// Check if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty() && self.unset.is_empty()
    }
}
