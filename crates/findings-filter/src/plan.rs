//! Reconciliation plan
//!
//! A plan is the difference between an observed and a declared filter:
//! scalar changes, criteria operations and tag operations. It is computed
//! fresh for every update and never stored.

use serde::{Deserialize, Serialize};

use crate::client::UpdateFilterRequest;
use crate::criteria::{diff_criteria, CriterionOp};
use crate::error::ValidationError;
use crate::ids::FilterIdentity;
use crate::model::{DeclaredFilterState, FindingCriteria, RemoteFilterState};
use crate::tags::{TagChanges, TagOp, TagReconciler};
use crate::types::FilterAction;

/// Scalar fields that differ; `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalarChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<FilterAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScalarChanges {
    /// Check if no scalar changes.
    pub fn is_empty(&self) -> bool {
        self.rank.is_none() && self.action.is_none() && self.description.is_none()
    }
}

/// Everything an update has to change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationPlan {
    pub criteria_ops: Vec<CriterionOp>,
    /// True when the criteria differ or when the number of rule groups
    /// differs (zero groups is not the same as one empty group).
    pub rule_groups_changed: bool,
    pub tag_ops: Vec<TagOp>,
    pub scalar_changes: ScalarChanges,
}

impl ReconciliationPlan {
    /// Check if applying the plan would make no remote call.
    pub fn is_empty(&self) -> bool {
        !self.rule_groups_changed && self.tag_ops.is_empty() && self.scalar_changes.is_empty()
    }

    /// Check if the plan needs an `update_filter` call.
    pub fn needs_filter_update(&self) -> bool {
        self.rule_groups_changed || !self.scalar_changes.is_empty()
    }

    /// Tag operations grouped into one tag and one untag call.
    pub fn tag_changes(&self) -> TagChanges {
        TagChanges::from_ops(&self.tag_ops)
    }

    /// Build the partial update request for this plan, or `None` when only
    /// tags change.
    ///
    /// Criteria are sent as the complete declared group; zero declared groups
    /// send an empty criteria map.
    pub fn to_update_request(
        &self,
        identity: &FilterIdentity,
        declared: &DeclaredFilterState,
    ) -> Result<Option<UpdateFilterRequest>, ValidationError> {
        if !self.needs_filter_update() {
            return Ok(None);
        }

        let mut request = UpdateFilterRequest::new(identity.detector_id(), identity.filter_name());
        request.rank = self.scalar_changes.rank;
        request.action = self.scalar_changes.action;
        request.description = self.scalar_changes.description.clone();

        if self.rule_groups_changed {
            request.finding_criteria = Some(match declared.rule_groups.first() {
                Some(group) => FindingCriteria::expand(group)?,
                None => FindingCriteria::default(),
            });
        }

        Ok(Some(request))
    }
}

/// Compute the plan that moves `observed` to `declared`.
///
/// `declared` is expected to be validated and normalized.
pub fn plan_update(
    observed: &RemoteFilterState,
    declared: &DeclaredFilterState,
    tags: &TagReconciler,
) -> ReconciliationPlan {
    let scalar_changes = ScalarChanges {
        rank: (observed.rank != declared.rank).then_some(declared.rank),
        action: (observed.action != declared.action).then_some(declared.action),
        description: (observed.description != declared.description)
            .then(|| declared.description.clone()),
    };

    let criteria_ops = diff_criteria(observed.criteria(), declared.criteria());
    let rule_groups_changed =
        !criteria_ops.is_empty() || observed.rule_groups.len() != declared.rule_groups.len();

    ReconciliationPlan {
        criteria_ops,
        rule_groups_changed,
        tag_ops: tags.diff(&observed.tags, &declared.tags),
        scalar_changes,
    }
}
