//! # Finding Filter Reconciler
//!
//! Declarative management of finding filters in a remote security-findings
//! service.
//!
//! A finding filter lives inside a detector and decides, by rank, which
//! findings are archived or left alone. Users declare the filter they want;
//! this crate drives the remote object through create, read, update and
//! delete until it matches, and notices when someone deletes it out of band.
//!
//! ## Architecture
//!
//! - [`FilterClient`](client::FilterClient) - The async remote interface
//!   implementors plug their transport into
//! - [`FilterReconciler`](engine::FilterReconciler) - Create, read, update,
//!   delete, drift detection and import on top of a client
//!
//! Everything the engine decides is computed by pure functions:
//!
//! - [`ids`] - Opaque `<detector_id>:<filter_name>` identifiers
//! - [`criteria`] - Set diff of match criteria keyed by `(field, condition)`
//! - [`tags`] - Tag map diff
//! - [`classify`] - Remote outcome classification
//! - [`plan`] - The update plan combining the above
//! - [`confirm`] - Bounded delete confirmation
//!
//! ## Example
//!
//! ```ignore
//! use findings_filter::prelude::*;
//!
//! let reconciler = FilterReconciler::with_config(client, ReconcilerConfig::from_env()?)?;
//!
//! let declared = DeclaredFilterState::new(1, FilterAction::Archive)
//!     .with_description("Archive low severity findings")
//!     .with_rule_group(
//!         RuleGroup::new().with(Criterion::new("severity", Condition::LessThan, ["4"])),
//!     )
//!     .with_tag("Name", "low-severity");
//!
//! let id = reconciler.create("12abc34d567e8fa901bc2d34e56789f0", "low-severity", &declared).await?;
//!
//! if let Observation::Present(observed) = reconciler.read(id.as_str()).await? {
//!     reconciler.update(id.as_str(), &observed, &declared).await?;
//! }
//!
//! reconciler.delete(id.as_str(), &CancellationToken::new()).await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`types`] - `FilterAction` and `Condition` enums
//! - [`model`] - Criteria, rule groups, filter states and the wire shape
//! - [`validation`] - Checks and normalization of declared filters
//! - [`lifecycle`] - Lifecycle state machine
//! - [`client`] - Remote client trait and request types
//! - [`config`] - Reconciler configuration
//! - [`error`] - Error types with transient/permanent classification

pub mod classify;
pub mod client;
pub mod config;
pub mod confirm;
pub mod criteria;
pub mod engine;
pub mod error;
pub mod ids;
pub mod lifecycle;
pub mod model;
pub mod plan;
pub mod tags;
pub mod types;
pub mod validation;

/// Prelude module for convenient imports.
///
/// ```
/// use findings_filter::prelude::*;
/// ```
pub mod prelude {
    // IDs
    pub use crate::ids::{decode, encode, FilterIdentity, OpaqueId};

    // Types and enums
    pub use crate::types::{Condition, FilterAction};

    // Error handling
    pub use crate::error::{
        DecodeError, FilterError, FilterResult, RemoteError, TransportErrorKind, ValidationError,
    };

    // Model
    pub use crate::model::{
        Criterion, CriterionKey, DeclaredFilterState, FindingCriteria, RemoteFilterState,
        RuleGroup, Tags,
    };

    // Differs and planning
    pub use crate::criteria::{apply_criteria, diff_criteria, CriterionOp};
    pub use crate::plan::{plan_update, ReconciliationPlan, ScalarChanges};
    pub use crate::tags::{apply_tags, diff_tags, TagOp, TagReconciler};

    // Classification
    pub use crate::classify::{classify, CallContext, Classification};

    // Client
    pub use crate::client::{
        CreateFilterRequest, FilterClient, FilterDescription, UpdateFilterRequest,
    };

    // Engine
    pub use crate::engine::{DriftDetected, FilterReconciler, ImportedFilter, Observation};
    pub use crate::lifecycle::{LifecycleEvent, LifecycleState};

    // Configuration
    pub use crate::config::{ConfirmationConfig, ReconcilerConfig};
    pub use crate::validation::FilterDefinition;

    pub use tokio_util::sync::CancellationToken;
}

// Re-export async_trait for client implementors
pub use async_trait::async_trait;
