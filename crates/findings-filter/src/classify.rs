//! Response classifier.
//!
//! Maps the outcome of a remote call onto the five outcomes the engine acts
//! on. Classification depends on the error code and message the service
//! returns, and for the "detector not owned" response on whether the call is
//! a destroy-confirmation read.

use crate::error::{FilterError, RemoteError};

/// Service code for malformed or rejected requests. The findings service
/// also uses it for missing filters and foreign detectors, told apart by the
/// message.
pub const BAD_REQUEST: &str = "BadRequestException";
/// Service code for explicit access denial.
pub const ACCESS_DENIED: &str = "AccessDeniedException";
/// Service code for server-side failures.
pub const INTERNAL_SERVER_ERROR: &str = "InternalServerErrorException";

const NOT_FOUND_MARKER: &str = "no such resource found";
const NOT_OWNED_MARKER: &str = "is not owned by the current account";

const RETRYABLE_CODES: &[&str] = &[
    INTERNAL_SERVER_ERROR,
    "ServiceUnavailableException",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestTimeout",
    "RequestTimeoutException",
];

/// Which kind of call produced the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallContext {
    /// Any create, read, update or delete call.
    #[default]
    Standard,
    /// A read issued to confirm that a delete took effect.
    DestroyConfirmation,
}

/// Classified outcome of a remote call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification<T> {
    Success(T),
    NotFound,
    PermissionDenied(String),
    Retryable(RemoteError),
    Fatal(RemoteError),
}

impl<T> Classification<T> {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Classification::Success(_) => "success",
            Classification::NotFound => "not_found",
            Classification::PermissionDenied(_) => "permission_denied",
            Classification::Retryable(_) => "retryable",
            Classification::Fatal(_) => "fatal",
        }
    }

    /// Convert into a result, turning `NotFound` into
    /// [`FilterError::NotFound`] for `id`.
    pub fn into_result(self, id: &str) -> Result<T, FilterError> {
        match self {
            Classification::Success(value) => Ok(value),
            Classification::NotFound => Err(FilterError::NotFound { id: id.to_string() }),
            Classification::PermissionDenied(message) => {
                Err(FilterError::PermissionDenied { message })
            }
            Classification::Retryable(source) => Err(FilterError::Retryable { source }),
            Classification::Fatal(source) => {
                Err(FilterError::fatal_with_source(source.to_string(), source))
            }
        }
    }
}

/// Classify a single remote error.
///
/// Duplicate-name rejections fall through to `Fatal`: retrying a create
/// that collides with an existing name can never succeed.
pub fn classify_error<T>(error: RemoteError, context: CallContext) -> Classification<T> {
    let retryable = match &error {
        RemoteError::Transport { .. } => true,
        RemoteError::Service { code, status, .. } => {
            RETRYABLE_CODES.contains(&code.as_str())
                || matches!(status, Some(429) | Some(500..=599))
        }
    };
    if retryable {
        return Classification::Retryable(error);
    }

    let code = error.code().unwrap_or_default();
    let message = error.message();

    if code == ACCESS_DENIED {
        return Classification::PermissionDenied(message.to_string());
    }
    if code == BAD_REQUEST && message.contains(NOT_FOUND_MARKER) {
        return Classification::NotFound;
    }
    if code == BAD_REQUEST && message.contains(NOT_OWNED_MARKER) {
        // A filter cannot exist under a detector the caller does not own.
        return match context {
            CallContext::DestroyConfirmation => Classification::NotFound,
            CallContext::Standard => Classification::PermissionDenied(message.to_string()),
        };
    }

    Classification::Fatal(error)
}

/// Classify the result of a remote call.
pub fn classify<T>(result: Result<T, RemoteError>, context: CallContext) -> Classification<T> {
    match result {
        Ok(value) => Classification::Success(value),
        Err(error) => classify_error(error, context),
    }
}
