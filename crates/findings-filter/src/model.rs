//! Finding filter state types
//!
//! Criteria, rule groups, declared and observed filter snapshots, and the
//! remote wire shape of finding criteria with the conversions between the
//! two representations.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ValidationError;
use crate::types::{Condition, FilterAction};

/// Tag map of a filter. Ordered for stable output.
pub type Tags = BTreeMap<String, String>;

/// Identity of a criterion within a rule group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CriterionKey {
    pub field: String,
    pub condition: Condition,
}

impl fmt::Display for CriterionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.condition)
    }
}

/// A single match criterion: `field <condition> values`.
///
/// The order of `values` is significant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Criterion {
    pub field: String,
    pub condition: Condition,
    pub values: Vec<String>,
}

impl Criterion {
    /// Create a new criterion.
    pub fn new<I, S>(field: impl Into<String>, condition: Condition, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            field: field.into(),
            condition,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Get the `(field, condition)` key of this criterion.
    pub fn key(&self) -> CriterionKey {
        CriterionKey {
            field: self.field.clone(),
            condition: self.condition,
        }
    }
}

/// An ordered group of criteria, all of which must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub criteria: Vec<Criterion>,
}

impl RuleGroup {
    /// Create an empty rule group.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a criterion using builder pattern.
    pub fn with(mut self, criterion: Criterion) -> Self {
        self.criteria.push(criterion);
        self
    }

    /// Find the criterion with the given key.
    pub fn get(&self, field: &str, condition: Condition) -> Option<&Criterion> {
        self.criteria
            .iter()
            .find(|c| c.field == field && c.condition == condition)
    }

    /// Get the number of criteria.
    pub fn len(&self) -> usize {
        self.criteria.len()
    }

    /// Check if the group has no criteria.
    pub fn is_empty(&self) -> bool {
        self.criteria.is_empty()
    }

    /// Iterate over the criteria.
    pub fn iter(&self) -> impl Iterator<Item = &Criterion> {
        self.criteria.iter()
    }
}

impl FromIterator<Criterion> for RuleGroup {
    fn from_iter<T: IntoIterator<Item = Criterion>>(iter: T) -> Self {
        Self {
            criteria: iter.into_iter().collect(),
        }
    }
}

/// Desired state of a filter as declared by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredFilterState {
    pub rank: i32,
    pub action: FilterAction,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rule_groups: Vec<RuleGroup>,
    #[serde(default)]
    pub tags: Tags,
}

impl DeclaredFilterState {
    /// Create a declared state with no criteria, description or tags.
    pub fn new(rank: i32, action: FilterAction) -> Self {
        Self {
            rank,
            action,
            description: String::new(),
            rule_groups: Vec::new(),
            tags: Tags::new(),
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Append a rule group.
    pub fn with_rule_group(mut self, group: RuleGroup) -> Self {
        self.rule_groups.push(group);
        self
    }

    /// Set a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Criteria of the first (and only) rule group, empty if there is none.
    pub fn criteria(&self) -> &[Criterion] {
        self.rule_groups
            .first()
            .map_or(&[], |g| g.criteria.as_slice())
    }
}

/// Observed state of a filter as read from the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFilterState {
    /// Remote-assigned resource name.
    pub arn: String,
    pub rank: i32,
    pub action: FilterAction,
    pub description: String,
    pub rule_groups: Vec<RuleGroup>,
    pub tags: Tags,
}

impl RemoteFilterState {
    /// Criteria of the first (and only) rule group, empty if there is none.
    pub fn criteria(&self) -> &[Criterion] {
        self.rule_groups
            .first()
            .map_or(&[], |g| g.criteria.as_slice())
    }

    /// Rebuild the declared state that would produce this remote object,
    /// dropping tags whose key starts with one of `ignored_tag_prefixes`.
    pub fn to_declared(&self, ignored_tag_prefixes: &[String]) -> DeclaredFilterState {
        DeclaredFilterState {
            rank: self.rank,
            action: self.action,
            description: self.description.clone(),
            rule_groups: self.rule_groups.clone(),
            tags: self
                .tags
                .iter()
                .filter(|(k, _)| !ignored_tag_prefixes.iter().any(|p| k.starts_with(p)))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }
}

/// Remote wire shape of a filter's criteria: one condition set per field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingCriteria {
    #[serde(default)]
    pub criterion: BTreeMap<String, ConditionSet>,
}

/// All conditions attached to one field on the wire.
///
/// Comparators are integers (epoch milliseconds for timestamps).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eq: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neq: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gte: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lt: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lte: Option<i64>,
}

impl ConditionSet {
    fn is_set(&self, condition: Condition) -> bool {
        match condition {
            Condition::Equals => self.eq.is_some(),
            Condition::NotEquals => self.neq.is_some(),
            Condition::GreaterThan => self.gt.is_some(),
            Condition::GreaterThanOrEqual => self.gte.is_some(),
            Condition::LessThan => self.lt.is_some(),
            Condition::LessThanOrEqual => self.lte.is_some(),
        }
    }

    fn values(&self, condition: Condition) -> Option<Vec<String>> {
        let number = |n: Option<i64>| n.map(|n| vec![n.to_string()]);
        match condition {
            Condition::Equals => self.eq.clone(),
            Condition::NotEquals => self.neq.clone(),
            Condition::GreaterThan => number(self.gt),
            Condition::GreaterThanOrEqual => number(self.gte),
            Condition::LessThan => number(self.lt),
            Condition::LessThanOrEqual => number(self.lte),
        }
    }
}

impl FindingCriteria {
    /// Convert a rule group into the wire shape.
    pub fn expand(group: &RuleGroup) -> Result<Self, ValidationError> {
        let mut criterion: BTreeMap<String, ConditionSet> = BTreeMap::new();

        for c in group.iter() {
            let set = criterion.entry(c.field.clone()).or_default();
            if set.is_set(c.condition) {
                return Err(ValidationError::DuplicateCriterion {
                    field: c.field.clone(),
                    condition: c.condition.to_string(),
                });
            }

            if !c.condition.is_comparator() {
                let values = Some(c.values.clone());
                match c.condition {
                    Condition::Equals => set.eq = values,
                    _ => set.neq = values,
                }
                continue;
            }

            let value = match c.values.as_slice() {
                [value] => parse_comparator_value(&c.field, value)?,
                other => {
                    return Err(ValidationError::SingleValueRequired {
                        field: c.field.clone(),
                        condition: c.condition.to_string(),
                        count: other.len(),
                    })
                }
            };
            match c.condition {
                Condition::GreaterThan => set.gt = Some(value),
                Condition::GreaterThanOrEqual => set.gte = Some(value),
                Condition::LessThan => set.lt = Some(value),
                _ => set.lte = Some(value),
            }
        }

        Ok(Self { criterion })
    }

    /// Convert the wire shape back into a rule group.
    ///
    /// Fields come out in sorted order, conditions in declaration order of
    /// [`Condition`]. Empty value lists are dropped.
    pub fn flatten(&self) -> RuleGroup {
        self.criterion
            .iter()
            .flat_map(|(field, set)| {
                Condition::all().iter().filter_map(move |&condition| {
                    set.values(condition)
                        .filter(|v| !v.is_empty())
                        .map(|values| Criterion {
                            field: field.clone(),
                            condition,
                            values,
                        })
                })
            })
            .collect()
    }

    /// Check if no field carries a condition.
    pub fn is_empty(&self) -> bool {
        self.criterion.is_empty()
    }
}

/// Parse a comparator value: an integer, or an RFC 3339 timestamp converted
/// to epoch milliseconds.
pub fn parse_comparator_value(field: &str, value: &str) -> Result<i64, ValidationError> {
    if let Ok(n) = value.parse::<i64>() {
        return Ok(n);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.timestamp_millis())
        .map_err(|_| ValidationError::InvalidNumericValue {
            field: field.to_string(),
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_group() -> RuleGroup {
        RuleGroup::new()
            .with(Criterion::new("region", Condition::Equals, ["eu-west-1"]))
            .with(Criterion::new(
                "service.additionalInfo.threatListName",
                Condition::NotEquals,
                ["some-threat", "another-threat"],
            ))
            .with(Criterion::new(
                "updatedAt",
                Condition::LessThan,
                ["1570744740000"],
            ))
            .with(Criterion::new(
                "updatedAt",
                Condition::GreaterThan,
                ["1570744240000"],
            ))
    }

    #[test]
    fn test_rule_group_get() {
        let group = sample_group();
        assert_eq!(group.len(), 4);
        assert!(group.get("updatedAt", Condition::LessThan).is_some());
        assert!(group.get("updatedAt", Condition::Equals).is_none());
    }

    #[test]
    fn test_expand_groups_by_field() {
        let criteria = FindingCriteria::expand(&sample_group()).unwrap();

        assert_eq!(criteria.criterion.len(), 3);
        let updated = &criteria.criterion["updatedAt"];
        assert_eq!(updated.lt, Some(1_570_744_740_000));
        assert_eq!(updated.gt, Some(1_570_744_240_000));
        assert_eq!(
            criteria.criterion["service.additionalInfo.threatListName"].neq,
            Some(vec!["some-threat".to_string(), "another-threat".to_string()])
        );
    }

    #[test]
    fn test_flatten_restores_criteria() {
        let group = sample_group();
        let flattened = FindingCriteria::expand(&group).unwrap().flatten();

        assert_eq!(flattened.len(), group.len());
        for c in group.iter() {
            assert_eq!(flattened.get(&c.field, c.condition), Some(c));
        }
    }

    #[test]
    fn test_expand_rejects_multiple_comparator_values() {
        let group = RuleGroup::new().with(Criterion::new(
            "severity",
            Condition::GreaterThan,
            ["4", "5"],
        ));
        assert!(matches!(
            FindingCriteria::expand(&group),
            Err(ValidationError::SingleValueRequired { count: 2, .. })
        ));
    }

    #[test]
    fn test_expand_rejects_duplicate_key() {
        let group = RuleGroup::new()
            .with(Criterion::new("region", Condition::Equals, ["a"]))
            .with(Criterion::new("region", Condition::Equals, ["b"]));
        assert!(matches!(
            FindingCriteria::expand(&group),
            Err(ValidationError::DuplicateCriterion { .. })
        ));
    }

    #[test]
    fn test_parse_comparator_value() {
        assert_eq!(parse_comparator_value("f", "42").unwrap(), 42);
        assert_eq!(
            parse_comparator_value("f", "2019-10-10T21:59:00Z").unwrap(),
            1_570_744_740_000
        );
        assert!(parse_comparator_value("f", "yesterday").is_err());
    }

    #[test]
    fn test_wire_serialization() {
        let criteria = FindingCriteria::expand(
            &RuleGroup::new().with(Criterion::new("severity", Condition::GreaterThanOrEqual, ["4"])),
        )
        .unwrap();
        let json = serde_json::to_value(&criteria).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "criterion": { "severity": { "gte": 4 } } })
        );
    }

    #[test]
    fn test_remote_to_declared_drops_ignored_tags() {
        let remote = RemoteFilterState {
            arn: "arn:aws:guardduty:us-west-2:123456789012:detector/abc/filter/f".to_string(),
            rank: 1,
            action: FilterAction::Archive,
            description: String::new(),
            rule_groups: vec![sample_group()],
            tags: [
                ("Name".to_string(), "f".to_string()),
                ("aws:cloudformation:stack".to_string(), "s".to_string()),
            ]
            .into_iter()
            .collect(),
        };

        let declared = remote.to_declared(&["aws:".to_string()]);
        assert_eq!(declared.tags.len(), 1);
        assert_eq!(declared.criteria().len(), 4);
        assert_eq!(declared.action, FilterAction::Archive);
    }
}
