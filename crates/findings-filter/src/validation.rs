//! Validation of declared filter configuration.
//!
//! Everything here runs before the engine touches the remote service. A
//! declared state that passes [`validate_declared`] is normalized: comparator
//! timestamps are rewritten as epoch milliseconds so that they compare equal
//! to what the remote service reports back.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::error::ValidationError;
use crate::ids::FilterIdentity;
use crate::model::{parse_comparator_value, Criterion, DeclaredFilterState, RuleGroup, Tags};
use crate::types::{Condition, FilterAction};

/// Lowest accepted rank.
pub const MIN_RANK: i32 = 1;
/// Highest accepted rank.
pub const MAX_RANK: i32 = 100;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LEN: usize = 512;
/// A filter holds at most this many rule groups.
pub const MAX_RULE_GROUPS: usize = 1;

static FILTER_NAME_RE: LazyLock<regex::Regex> = LazyLock::new(|| {
    regex::Regex::new(r"^[A-Za-z0-9_.\-]{3,64}$").expect("FILTER_NAME_RE is a valid regex pattern")
});

/// Check a filter name: 3 to 64 characters of letters, digits, `_`, `.`, `-`.
pub fn validate_filter_name(name: &str) -> Result<(), ValidationError> {
    if FILTER_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ValidationError::InvalidName {
            name: name.to_string(),
            reason: "must be 3-64 characters of letters, digits, '_', '.' or '-'".to_string(),
        })
    }
}

/// Build an identity from a detector id and a filter name, checking both.
pub fn validate_identity(detector_id: &str, name: &str) -> Result<FilterIdentity, ValidationError> {
    validate_filter_name(name)?;
    if detector_id.chars().any(char::is_whitespace) {
        return Err(ValidationError::InvalidDetectorId {
            detector_id: detector_id.to_string(),
            reason: "must not contain whitespace".to_string(),
        });
    }
    FilterIdentity::new(detector_id, name)
}

/// Check a single criterion and return its normalized form.
pub fn validate_criterion(criterion: &Criterion) -> Result<Criterion, ValidationError> {
    if criterion.field.trim().is_empty() {
        return Err(ValidationError::EmptyField);
    }
    if criterion.values.is_empty() {
        return Err(ValidationError::EmptyValues {
            field: criterion.field.clone(),
            condition: criterion.condition.to_string(),
        });
    }
    if !criterion.condition.is_comparator() {
        return Ok(criterion.clone());
    }

    if criterion.values.len() != 1 {
        return Err(ValidationError::SingleValueRequired {
            field: criterion.field.clone(),
            condition: criterion.condition.to_string(),
            count: criterion.values.len(),
        });
    }
    let millis = parse_comparator_value(&criterion.field, &criterion.values[0])?;
    Ok(Criterion {
        field: criterion.field.clone(),
        condition: criterion.condition,
        values: vec![millis.to_string()],
    })
}

/// Check a rule group: at least one criterion, every criterion valid, no
/// repeated `(field, condition)`.
pub fn validate_rule_group(group: &RuleGroup) -> Result<RuleGroup, ValidationError> {
    if group.is_empty() {
        return Err(ValidationError::EmptyRuleGroup);
    }

    let mut seen = HashSet::new();
    let mut criteria = Vec::with_capacity(group.len());

    for criterion in group.iter() {
        let normalized = validate_criterion(criterion)?;
        if !seen.insert(normalized.key()) {
            return Err(ValidationError::DuplicateCriterion {
                field: normalized.field,
                condition: normalized.condition.to_string(),
            });
        }
        criteria.push(normalized);
    }

    Ok(RuleGroup { criteria })
}

/// Check a declared state and return its normalized form.
pub fn validate_declared(
    declared: &DeclaredFilterState,
) -> Result<DeclaredFilterState, ValidationError> {
    if !(MIN_RANK..=MAX_RANK).contains(&declared.rank) {
        return Err(ValidationError::RankOutOfRange {
            rank: declared.rank,
            min: MIN_RANK,
            max: MAX_RANK,
        });
    }

    let length = declared.description.chars().count();
    if length > MAX_DESCRIPTION_LEN {
        return Err(ValidationError::DescriptionTooLong {
            length,
            max: MAX_DESCRIPTION_LEN,
        });
    }

    if declared.rule_groups.len() > MAX_RULE_GROUPS {
        return Err(ValidationError::TooManyRuleGroups {
            count: declared.rule_groups.len(),
        });
    }

    let rule_groups = declared
        .rule_groups
        .iter()
        .map(validate_rule_group)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DeclaredFilterState {
        rank: declared.rank,
        action: declared.action,
        description: declared.description.clone(),
        rule_groups,
        tags: declared.tags.clone(),
    })
}

/// A filter as written by the user, before enum parsing and validation.
///
/// This is the boundary with the declarative-config parser: it produces
/// strings, and [`FilterDefinition::into_declared`] turns them into typed state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterDefinition {
    pub detector_id: String,
    pub name: String,
    pub action: String,
    pub rank: i32,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub finding_criteria: Vec<CriteriaDefinition>,
    #[serde(default)]
    pub tags: Tags,
}

/// One `finding_criteria` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CriteriaDefinition {
    #[serde(default)]
    pub criterion: Vec<CriterionDefinition>,
}

/// One `criterion` block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionDefinition {
    pub field: String,
    pub condition: String,
    pub values: Vec<String>,
}

impl FilterDefinition {
    /// Parse and validate into an identity and a normalized declared state.
    pub fn into_declared(self) -> Result<(FilterIdentity, DeclaredFilterState), ValidationError> {
        let identity = validate_identity(&self.detector_id, &self.name)?;
        let action: FilterAction = self.action.parse()?;

        let rule_groups = self
            .finding_criteria
            .into_iter()
            .map(|block| {
                block
                    .criterion
                    .into_iter()
                    .map(|c| {
                        let condition: Condition = c.condition.parse()?;
                        Ok::<_, ValidationError>(Criterion::new(c.field, condition, c.values))
                    })
                    .collect::<Result<RuleGroup, ValidationError>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let declared = validate_declared(&DeclaredFilterState {
            rank: self.rank,
            action,
            description: self.description,
            rule_groups,
            tags: self.tags,
        })?;

        Ok((identity, declared))
    }
}
