//! Reconciliation engine.
//!
//! Drives a remote finding filter through create, read, update, delete,
//! drift detection and import. This is the only module that talks to the
//! remote service; everything it decides is computed by the pure modules
//! (`ids`, `criteria`, `tags`, `classify`, `plan`, `confirm`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::classify::{classify, CallContext, Classification};
use crate::client::{CreateFilterRequest, FilterClient};
use crate::config::ReconcilerConfig;
use crate::confirm::confirm_destroyed;
use crate::error::{FilterError, FilterResult};
use crate::ids::{decode, FilterIdentity, OpaqueId};
use crate::lifecycle::{LifecycleEvent, LifecycleState};
use crate::model::{DeclaredFilterState, FindingCriteria, RemoteFilterState};
use crate::plan::{plan_update, ReconciliationPlan};
use crate::tags::TagReconciler;
use crate::validation::{validate_declared, validate_identity};

/// Result of reading a filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Observation {
    Present(RemoteFilterState),
    /// The remote service reports no such filter.
    Absent,
}

impl Observation {
    /// Get the observed state, if the filter exists.
    pub fn present(&self) -> Option<&RemoteFilterState> {
        match self {
            Observation::Present(state) => Some(state),
            Observation::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Observation::Absent)
    }
}

/// Signal that a filter was deleted out of band.
///
/// Not an error: the caller should forget its cached state so the next pass
/// re-creates the filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriftDetected {
    pub identity: FilterIdentity,
    pub detected_at: DateTime<Utc>,
}

/// An existing filter brought under management.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedFilter {
    pub id: OpaqueId,
    pub identity: FilterIdentity,
    pub arn: String,
    /// Declared state reproducing the remote object, reserved tags removed.
    pub declared: DeclaredFilterState,
}

/// Reconciler for finding filters.
///
/// Holds no mutable state; one instance can serve concurrent operations on
/// different filters.
pub struct FilterReconciler<C: FilterClient> {
    client: Arc<C>,
    config: ReconcilerConfig,
    tags: TagReconciler,
}

impl<C: FilterClient> FilterReconciler<C> {
    /// Create a reconciler with the default configuration.
    pub fn new(client: Arc<C>) -> Self {
        let config = ReconcilerConfig::default();
        Self {
            tags: TagReconciler::new(config.ignored_tag_prefixes.iter().cloned()),
            client,
            config,
        }
    }

    /// Create with custom configuration.
    pub fn with_config(client: Arc<C>, config: ReconcilerConfig) -> FilterResult<Self> {
        config.validate()?;
        Ok(Self {
            tags: TagReconciler::new(config.ignored_tag_prefixes.iter().cloned()),
            client,
            config,
        })
    }

    /// Get the configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Create a filter and return its opaque id.
    ///
    /// Each call sends a fresh client token. Use [`Self::create_with_token`]
    /// to retry a create without risking a second filter.
    pub async fn create(
        &self,
        detector_id: &str,
        name: &str,
        declared: &DeclaredFilterState,
    ) -> FilterResult<OpaqueId> {
        self.create_with_token(detector_id, name, declared, Uuid::new_v4())
            .await
    }

    /// Create a filter under a caller-held idempotency token.
    ///
    /// The service treats repeated creates carrying the same token as one
    /// request, so the caller keeps the token across its own retries.
    pub async fn create_with_token(
        &self,
        detector_id: &str,
        name: &str,
        declared: &DeclaredFilterState,
        client_token: Uuid,
    ) -> FilterResult<OpaqueId> {
        let identity = validate_identity(detector_id, name)?;
        let declared = validate_declared(declared)?;
        let finding_criteria = match declared.rule_groups.first() {
            Some(group) => FindingCriteria::expand(group)?,
            None => FindingCriteria::default(),
        };

        let request = CreateFilterRequest {
            detector_id: identity.detector_id().to_string(),
            name: identity.filter_name().to_string(),
            action: declared.action,
            description: (!declared.description.is_empty()).then(|| declared.description.clone()),
            rank: declared.rank,
            finding_criteria,
            tags: declared.tags.clone(),
            client_token,
        };

        let id = identity.encode();
        let state = transition(&identity, LifecycleState::Absent, LifecycleEvent::CreateStarted);

        match classify(self.client.create_filter(request).await, CallContext::Standard)
            .into_result(id.as_str())
        {
            Ok(created) => {
                transition(&identity, state, LifecycleEvent::Succeeded);
                info!(
                    detector_id = %identity.detector_id(),
                    filter_name = %identity.filter_name(),
                    arn = %created.arn,
                    "Created finding filter"
                );
                Ok(id)
            }
            Err(e) => {
                transition(&identity, state, LifecycleEvent::Failed);
                Err(e)
            }
        }
    }

    /// Read a filter by opaque id.
    pub async fn read(&self, id: &str) -> FilterResult<Observation> {
        let identity = decode(id)?;
        self.observe(&identity).await
    }

    async fn observe(&self, identity: &FilterIdentity) -> FilterResult<Observation> {
        let result = self
            .client
            .get_filter(identity.detector_id(), identity.filter_name())
            .await;

        let outcome = match classify(result, CallContext::Standard) {
            Classification::NotFound => return Ok(Observation::Absent),
            other => other,
        };
        let description = outcome.into_result(identity.encode().as_str())?;

        Ok(Observation::Present(description.into_state()))
    }

    /// Bring `observed` in line with `declared`.
    ///
    /// Returns the plan that was applied. An empty plan makes no remote call.
    pub async fn update(
        &self,
        id: &str,
        observed: &RemoteFilterState,
        declared: &DeclaredFilterState,
    ) -> FilterResult<ReconciliationPlan> {
        let identity = decode(id)?;
        let declared = validate_declared(declared)?;
        let plan = plan_update(observed, &declared, &self.tags);

        if plan.is_empty() {
            debug!(
                detector_id = %identity.detector_id(),
                filter_name = %identity.filter_name(),
                "Finding filter up to date"
            );
            return Ok(plan);
        }

        debug!(
            detector_id = %identity.detector_id(),
            filter_name = %identity.filter_name(),
            criteria_ops = plan.criteria_ops.len(),
            rule_groups_changed = plan.rule_groups_changed,
            tag_ops = plan.tag_ops.len(),
            scalar_changes = ?plan.scalar_changes,
            "Planned finding filter update"
        );

        let state = transition(&identity, LifecycleState::Present, LifecycleEvent::UpdateStarted);
        match self.apply_plan(&identity, &observed.arn, &declared, &plan).await {
            Ok(()) => {
                transition(&identity, state, LifecycleEvent::Succeeded);
                info!(
                    detector_id = %identity.detector_id(),
                    filter_name = %identity.filter_name(),
                    "Updated finding filter"
                );
                Ok(plan)
            }
            Err(e) => {
                transition(&identity, state, LifecycleEvent::Failed);
                Err(e)
            }
        }
    }

    async fn apply_plan(
        &self,
        identity: &FilterIdentity,
        arn: &str,
        declared: &DeclaredFilterState,
        plan: &ReconciliationPlan,
    ) -> FilterResult<()> {
        let id = identity.encode();

        if let Some(request) = plan.to_update_request(identity, declared)? {
            classify(self.client.update_filter(request).await, CallContext::Standard)
                .into_result(id.as_str())?;
        }

        let changes = plan.tag_changes();
        if !changes.unset.is_empty() {
            classify(
                self.client.untag_resource(arn, changes.unset).await,
                CallContext::Standard,
            )
            .into_result(id.as_str())?;
        }
        if !changes.set.is_empty() {
            classify(
                self.client.tag_resource(arn, changes.set).await,
                CallContext::Standard,
            )
            .into_result(id.as_str())?;
        }

        Ok(())
    }

    /// Delete a filter and wait until the remote service stops reporting it.
    ///
    /// Returns the number of confirmation reads it took.
    pub async fn delete(&self, id: &str, cancel: &CancellationToken) -> FilterResult<u32> {
        let identity = decode(id)?;
        if cancel.is_cancelled() {
            return Err(FilterError::Cancelled {
                operation: "delete",
                attempts: 0,
            });
        }

        let state = transition(&identity, LifecycleState::Present, LifecycleEvent::DeleteStarted);
        match self.delete_and_confirm(&identity, cancel).await {
            Ok(attempts) => {
                transition(&identity, state, LifecycleEvent::Succeeded);
                info!(
                    detector_id = %identity.detector_id(),
                    filter_name = %identity.filter_name(),
                    attempts,
                    "Deleted finding filter"
                );
                Ok(attempts)
            }
            Err(e) => {
                transition(&identity, state, LifecycleEvent::Failed);
                Err(e)
            }
        }
    }

    async fn delete_and_confirm(
        &self,
        identity: &FilterIdentity,
        cancel: &CancellationToken,
    ) -> FilterResult<u32> {
        let result = self
            .client
            .delete_filter(identity.detector_id(), identity.filter_name())
            .await;

        match classify(result, CallContext::Standard) {
            Classification::NotFound => debug!(
                detector_id = %identity.detector_id(),
                filter_name = %identity.filter_name(),
                "Finding filter already gone"
            ),
            other => other.into_result(identity.encode().as_str())?,
        }

        confirm_destroyed(
            self.client.as_ref(),
            identity,
            &self.config.confirmation,
            cancel,
        )
        .await
    }

    /// Check whether a filter was deleted out of band.
    pub async fn detect_disappearance(&self, id: &str) -> FilterResult<Option<DriftDetected>> {
        let identity = decode(id)?;
        match self.observe(&identity).await? {
            Observation::Present(_) => Ok(None),
            Observation::Absent => {
                transition(&identity, LifecycleState::Present, LifecycleEvent::Disappeared);
                info!(
                    detector_id = %identity.detector_id(),
                    filter_name = %identity.filter_name(),
                    "Finding filter disappeared, it will be re-created"
                );
                Ok(Some(DriftDetected {
                    identity,
                    detected_at: Utc::now(),
                }))
            }
        }
    }

    /// Import an existing filter by opaque id.
    pub async fn import(&self, id: &str) -> FilterResult<ImportedFilter> {
        let identity = decode(id)?;
        let state = match self.observe(&identity).await? {
            Observation::Present(state) => state,
            Observation::Absent => {
                return Err(FilterError::NotFound { id: id.to_string() });
            }
        };
        transition(&identity, LifecycleState::Absent, LifecycleEvent::Observed);

        info!(
            detector_id = %identity.detector_id(),
            filter_name = %identity.filter_name(),
            arn = %state.arn,
            "Imported finding filter"
        );

        Ok(ImportedFilter {
            id: identity.encode(),
            declared: state.to_declared(&self.config.ignored_tag_prefixes),
            arn: state.arn,
            identity,
        })
    }
}

fn transition(
    identity: &FilterIdentity,
    from: LifecycleState,
    event: LifecycleEvent,
) -> LifecycleState {
    match from.on(event) {
        Some(to) => {
            debug!(
                detector_id = %identity.detector_id(),
                filter_name = %identity.filter_name(),
                from = %from,
                to = %to,
                event = ?event,
                "Lifecycle transition"
            );
            to
        }
        None => from,
    }
}
