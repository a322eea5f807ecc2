//! Remote client interface
//!
//! The engine reaches the findings service only through [`FilterClient`].
//! Implementations own transport, credentials and connection pooling; they
//! report failures as [`RemoteError`] values for the classifier.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::RemoteError;
use crate::model::{FindingCriteria, RemoteFilterState, Tags};
use crate::types::FilterAction;

/// Request to create a filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateFilterRequest {
    pub detector_id: String,
    pub name: String,
    pub action: FilterAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rank: i32,
    pub finding_criteria: FindingCriteria,
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,
    /// Idempotency token; a retried create with the same token does not
    /// create a second filter.
    pub client_token: Uuid,
}

/// Partial update of a filter. `None` fields are left untouched remotely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFilterRequest {
    pub detector_id: String,
    pub filter_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<FilterAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rank: Option<i32>,
    /// Always the complete replacement group; the service has no partial
    /// criterion patch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finding_criteria: Option<FindingCriteria>,
}

impl UpdateFilterRequest {
    /// Create an update that changes nothing.
    pub fn new(detector_id: impl Into<String>, filter_name: impl Into<String>) -> Self {
        Self {
            detector_id: detector_id.into(),
            filter_name: filter_name.into(),
            action: None,
            description: None,
            rank: None,
            finding_criteria: None,
        }
    }

    /// Check if no field would change.
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.description.is_none()
            && self.rank.is_none()
            && self.finding_criteria.is_none()
    }
}

/// A filter as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterDescription {
    pub name: String,
    pub arn: String,
    pub action: FilterAction,
    #[serde(default)]
    pub description: Option<String>,
    pub rank: i32,
    #[serde(default)]
    pub finding_criteria: Option<FindingCriteria>,
    #[serde(default)]
    pub tags: Tags,
}

impl FilterDescription {
    /// Flatten into the observed state the engine compares against.
    ///
    /// Missing and empty criteria both mean the filter has no rule group.
    pub fn into_state(self) -> RemoteFilterState {
        let rule_groups = match self.finding_criteria.map(|c| c.flatten()) {
            Some(group) if !group.is_empty() => vec![group],
            _ => Vec::new(),
        };
        RemoteFilterState {
            arn: self.arn,
            rank: self.rank,
            action: self.action,
            description: self.description.unwrap_or_default(),
            rule_groups,
            tags: self.tags,
        }
    }
}

/// Remote finding-filter operations.
#[async_trait]
pub trait FilterClient: Send + Sync {
    /// Create a filter under a detector.
    async fn create_filter(
        &self,
        request: CreateFilterRequest,
    ) -> Result<FilterDescription, RemoteError>;

    /// Read a filter.
    async fn get_filter(
        &self,
        detector_id: &str,
        filter_name: &str,
    ) -> Result<FilterDescription, RemoteError>;

    /// Apply a partial update.
    async fn update_filter(&self, request: UpdateFilterRequest) -> Result<(), RemoteError>;

    /// Delete a filter.
    async fn delete_filter(&self, detector_id: &str, filter_name: &str)
        -> Result<(), RemoteError>;

    /// Add or overwrite tags on a resource.
    async fn tag_resource(&self, arn: &str, tags: Tags) -> Result<(), RemoteError>;

    /// Remove tags from a resource.
    async fn untag_resource(&self, arn: &str, keys: Vec<String>) -> Result<(), RemoteError>;
}
