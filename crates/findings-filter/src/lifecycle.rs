//! Filter lifecycle state machine.
//!
//! ```text
//! Absent -> Creating -> Present -> Updating -> Present -> Deleting -> Absent
//!                       Present -> Absent                 (out-of-band deletion)
//! ```
//!
//! The engine steps through it on every operation and logs each transition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a filter stands from the reconciler's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Absent => "absent",
            LifecycleState::Creating => "creating",
            LifecycleState::Present => "present",
            LifecycleState::Updating => "updating",
            LifecycleState::Deleting => "deleting",
        }
    }

    /// Check if no operation is in flight.
    #[must_use]
    pub fn is_stable(&self) -> bool {
        matches!(self, LifecycleState::Absent | LifecycleState::Present)
    }

    /// Check if a transition from this state to another is valid.
    #[must_use]
    pub fn can_transition_to(&self, target: &Self) -> bool {
        use LifecycleState::*;
        matches!(
            (self, target),
            (Absent, Creating)
                | (Absent, Present)
                | (Creating, Present)
                | (Creating, Absent)
                | (Present, Updating)
                | (Present, Deleting)
                | (Present, Absent)
                | (Updating, Present)
                | (Deleting, Absent)
                | (Deleting, Present)
        )
    }

    /// Apply an event; `None` when the event is not valid in this state.
    #[must_use]
    pub fn on(&self, event: LifecycleEvent) -> Option<LifecycleState> {
        use LifecycleEvent as E;
        use LifecycleState as S;

        let next = match (self, event) {
            (S::Absent, E::CreateStarted) => S::Creating,
            (S::Absent, E::Observed) => S::Present,
            (S::Creating, E::Succeeded) => S::Present,
            (S::Creating, E::Failed) => S::Absent,
            (S::Present, E::UpdateStarted) => S::Updating,
            (S::Present, E::DeleteStarted) => S::Deleting,
            (S::Present, E::Disappeared) => S::Absent,
            (S::Present, E::Observed) => S::Present,
            // A failed update leaves the last observed object in place.
            (S::Updating, E::Succeeded | E::Failed) => S::Present,
            (S::Deleting, E::Succeeded) => S::Absent,
            (S::Deleting, E::Failed) => S::Present,
            _ => return None,
        };
        Some(next)
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Something that moves a filter between lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    CreateStarted,
    UpdateStarted,
    DeleteStarted,
    /// The in-flight operation finished.
    Succeeded,
    /// The in-flight operation failed.
    Failed,
    /// A read found the filter.
    Observed,
    /// A read found the filter gone without a delete from us.
    Disappeared,
}
