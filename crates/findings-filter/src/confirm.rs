//! Destroy confirmation.
//!
//! After a delete call the filter may stay visible for a while. The engine
//! polls it with increasing delays until it is gone, the attempt limit runs
//! out, or the caller cancels. The polling is an explicit state machine:
//! [`ConfirmationLoop`] holds the attempt counter and maps each classified
//! read to the next [`Step`].

use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::classify::{classify, CallContext, Classification};
use crate::client::FilterClient;
use crate::config::ConfirmationConfig;
use crate::error::{FilterError, FilterResult, RemoteError};
use crate::ids::FilterIdentity;

/// Classified result of one confirmation read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// The filter is still there.
    Present,
    /// The filter is gone (or can no longer exist for this caller).
    Absent,
    /// The read failed transiently.
    Transient,
}

/// What to do after a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Deletion confirmed.
    Confirmed,
    /// Read again after the delay.
    Wait(Duration),
    /// The attempt limit is reached.
    Exhausted,
}

/// Attempt counter and transition table of the confirmation loop.
#[derive(Debug, Clone)]
pub struct ConfirmationLoop {
    config: ConfirmationConfig,
    attempts: u32,
}

impl ConfirmationLoop {
    /// Create a loop with no attempts made.
    pub fn new(config: ConfirmationConfig) -> Self {
        Self {
            config,
            attempts: 0,
        }
    }

    /// Number of reads recorded so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Record a read and decide the next step.
    pub fn record(&mut self, visibility: Visibility) -> Step {
        self.attempts += 1;
        match visibility {
            Visibility::Absent => Step::Confirmed,
            Visibility::Present | Visibility::Transient
                if self.attempts >= self.config.max_attempts =>
            {
                Step::Exhausted
            }
            Visibility::Present | Visibility::Transient => {
                Step::Wait(self.delay_for(self.attempts - 1))
            }
        }
    }

    /// Delay after the given 0-indexed attempt: exponential, capped.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.config.initial_delay_ms as f64
            * self
                .config
                .backoff_multiplier
                .powi(attempt.min(i32::MAX as u32) as i32);
        let capped = base.min(self.config.max_delay_ms as f64);
        Duration::from_millis(capped as u64)
    }
}

/// Poll the filter until the remote service no longer reports it.
///
/// `NotFound` ends the loop successfully, and so does permission denied:
/// a filter cannot be visible to a caller who may not read it. Transient
/// failures use up attempts like a still-present filter. A fatal read error
/// ends the loop immediately.
pub async fn confirm_destroyed(
    client: &dyn FilterClient,
    identity: &FilterIdentity,
    config: &ConfirmationConfig,
    cancel: &CancellationToken,
) -> FilterResult<u32> {
    let mut tracker = ConfirmationLoop::new(config.clone());
    let mut last_transient: Option<RemoteError> = None;

    loop {
        if cancel.is_cancelled() {
            return Err(FilterError::Cancelled {
                operation: "delete confirmation",
                attempts: tracker.attempts(),
            });
        }

        let outcome = classify(
            client
                .get_filter(identity.detector_id(), identity.filter_name())
                .await,
            CallContext::DestroyConfirmation,
        );

        let visibility = match outcome {
            Classification::Success(_) => Visibility::Present,
            Classification::NotFound => Visibility::Absent,
            Classification::PermissionDenied(message) => {
                warn!(
                    detector_id = %identity.detector_id(),
                    filter_name = %identity.filter_name(),
                    error = %message,
                    "Permission denied while confirming deletion, treating filter as gone"
                );
                Visibility::Absent
            }
            Classification::Retryable(error) => {
                last_transient = Some(error);
                Visibility::Transient
            }
            Classification::Fatal(error) => {
                return Err(FilterError::fatal_with_source(
                    format!("confirming deletion of finding filter {identity} failed"),
                    error,
                ));
            }
        };

        match tracker.record(visibility) {
            Step::Confirmed => return Ok(tracker.attempts()),
            Step::Wait(delay) => {
                debug!(
                    detector_id = %identity.detector_id(),
                    filter_name = %identity.filter_name(),
                    attempt = tracker.attempts(),
                    max_attempts = config.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    visibility = ?visibility,
                    "Finding filter still visible, waiting before next confirmation read"
                );
                tokio::select! {
                    () = cancel.cancelled() => {
                        return Err(FilterError::Cancelled {
                            operation: "delete confirmation",
                            attempts: tracker.attempts(),
                        });
                    }
                    () = tokio::time::sleep(delay) => {}
                }
            }
            Step::Exhausted => {
                warn!(
                    detector_id = %identity.detector_id(),
                    filter_name = %identity.filter_name(),
                    attempts = tracker.attempts(),
                    "Gave up confirming deletion"
                );
                return Err(match (visibility, last_transient) {
                    (Visibility::Transient, Some(source)) => FilterError::Retryable { source },
                    _ => FilterError::fatal(format!(
                        "expected finding filter to be destroyed, {} found after {} attempts",
                        identity.filter_name(),
                        tracker.attempts()
                    )),
                });
            }
        }
    }
}
