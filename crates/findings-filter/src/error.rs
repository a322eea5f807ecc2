//! Finding filter error types
//!
//! Configuration errors (identifier decoding, validation) are never retried.
//! Remote errors are classified by [`crate::classify`] before they reach the
//! caller as a [`FilterError`].

use std::fmt;
use thiserror::Error;

/// Which half of a composite filter identifier is affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdPart {
    DetectorId,
    FilterName,
}

impl fmt::Display for IdPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdPart::DetectorId => write!(f, "detector id"),
            IdPart::FilterName => write!(f, "filter name"),
        }
    }
}

/// Failure to decode an opaque filter identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The separator is missing or appears more than once.
    #[error("malformed filter id '{id}': expected <detector_id>:<filter_name>")]
    Malformed { id: String },

    /// One side of the separator is empty.
    #[error("malformed filter id '{id}': {part} is empty")]
    EmptyPart { id: String, part: IdPart },
}

impl DecodeError {
    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DecodeError::Malformed { .. } => "ID_MALFORMED",
            DecodeError::EmptyPart { .. } => "ID_EMPTY_PART",
        }
    }
}

/// Declared configuration rejected before any remote call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("unknown criterion condition '{value}'")]
    UnknownCondition { value: String },

    #[error("unknown filter action '{value}', expected ARCHIVE or NOOP")]
    UnknownAction { value: String },

    #[error("criterion field must not be empty")]
    EmptyField,

    #[error("criterion {field} {condition} has no values")]
    EmptyValues { field: String, condition: String },

    #[error("duplicate criterion for {field} {condition}")]
    DuplicateCriterion { field: String, condition: String },

    /// Comparator conditions take exactly one value.
    #[error("criterion {field} {condition} requires exactly one value, got {count}")]
    SingleValueRequired {
        field: String,
        condition: String,
        count: usize,
    },

    #[error("criterion {field} value '{value}' is neither an integer nor an RFC 3339 timestamp")]
    InvalidNumericValue { field: String, value: String },

    #[error("rank {rank} out of range {min}..={max}")]
    RankOutOfRange { rank: i32, min: i32, max: i32 },

    #[error("invalid filter name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid detector id '{detector_id}': {reason}")]
    InvalidDetectorId { detector_id: String, reason: String },

    #[error("description is {length} characters, maximum is {max}")]
    DescriptionTooLong { length: usize, max: usize },

    #[error("rule group has no criteria")]
    EmptyRuleGroup,

    #[error("a filter holds at most one rule group, got {count}")]
    TooManyRuleGroups { count: usize },

    #[error("invalid reconciler configuration: {message}")]
    InvalidConfig { message: String },
}

impl ValidationError {
    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ValidationError::UnknownCondition { .. } => "UNKNOWN_CONDITION",
            ValidationError::UnknownAction { .. } => "UNKNOWN_ACTION",
            ValidationError::EmptyField => "EMPTY_FIELD",
            ValidationError::EmptyValues { .. } => "EMPTY_VALUES",
            ValidationError::DuplicateCriterion { .. } => "DUPLICATE_CRITERION",
            ValidationError::SingleValueRequired { .. } => "SINGLE_VALUE_REQUIRED",
            ValidationError::InvalidNumericValue { .. } => "INVALID_NUMERIC_VALUE",
            ValidationError::RankOutOfRange { .. } => "RANK_OUT_OF_RANGE",
            ValidationError::InvalidName { .. } => "INVALID_NAME",
            ValidationError::InvalidDetectorId { .. } => "INVALID_DETECTOR_ID",
            ValidationError::DescriptionTooLong { .. } => "DESCRIPTION_TOO_LONG",
            ValidationError::EmptyRuleGroup => "EMPTY_RULE_GROUP",
            ValidationError::TooManyRuleGroups { .. } => "TOO_MANY_RULE_GROUPS",
            ValidationError::InvalidConfig { .. } => "INVALID_CONFIG",
        }
    }
}

/// Kind of transport-level failure reported by a remote client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    Timeout,
    Connection,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timeout"),
            TransportErrorKind::Connection => write!(f, "connection"),
        }
    }
}

/// Error returned by a [`crate::client::FilterClient`] call.
///
/// Either a structured service response (error code, message, optional HTTP
/// status) or a transport failure that never produced a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("{code}: {message}")]
    Service {
        code: String,
        message: String,
        status: Option<u16>,
    },

    #[error("{kind} error: {message}")]
    Transport {
        kind: TransportErrorKind,
        message: String,
    },
}

impl RemoteError {
    /// Create a structured service error.
    pub fn service(code: impl Into<String>, message: impl Into<String>) -> Self {
        RemoteError::Service {
            code: code.into(),
            message: message.into(),
            status: None,
        }
    }

    /// Create a structured service error carrying an HTTP status.
    pub fn service_with_status(
        code: impl Into<String>,
        message: impl Into<String>,
        status: u16,
    ) -> Self {
        RemoteError::Service {
            code: code.into(),
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a timeout error.
    pub fn timeout(message: impl Into<String>) -> Self {
        RemoteError::Transport {
            kind: TransportErrorKind::Timeout,
            message: message.into(),
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        RemoteError::Transport {
            kind: TransportErrorKind::Connection,
            message: message.into(),
        }
    }

    /// Service error code, if this is a structured response.
    pub fn code(&self) -> Option<&str> {
        match self {
            RemoteError::Service { code, .. } => Some(code),
            RemoteError::Transport { .. } => None,
        }
    }

    /// Human-readable message.
    pub fn message(&self) -> &str {
        match self {
            RemoteError::Service { message, .. } | RemoteError::Transport { message, .. } => {
                message
            }
        }
    }
}

/// Error surfaced by the reconciliation engine.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid filter id: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid filter configuration: {0}")]
    Validation(#[from] ValidationError),

    /// The filter does not exist remotely (outside of Read, where absence is
    /// a normal observation).
    #[error("finding filter not found: {id}")]
    NotFound { id: String },

    /// The caller lacks access. Surfaced verbatim so the access policy can be
    /// fixed.
    #[error("permission denied: {message}")]
    PermissionDenied { message: String },

    /// A transient failure; the caller may retry the whole operation.
    #[error("transient remote failure: {source}")]
    Retryable {
        #[source]
        source: RemoteError,
    },

    #[error("{message}")]
    Fatal {
        message: String,
        #[source]
        source: Option<RemoteError>,
    },

    /// The caller's cancellation signal fired between attempts.
    #[error("{operation} cancelled after {attempts} attempts")]
    Cancelled {
        operation: &'static str,
        attempts: u32,
    },
}

impl FilterError {
    /// Check if the external orchestrator may retry the operation.
    pub fn is_transient(&self) -> bool {
        matches!(self, FilterError::Retryable { .. })
    }

    /// Check if the error stems from the declared configuration rather than
    /// the remote side.
    pub fn is_configuration(&self) -> bool {
        matches!(self, FilterError::Decode(_) | FilterError::Validation(_))
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            FilterError::Decode(e) => e.error_code(),
            FilterError::Validation(e) => e.error_code(),
            FilterError::NotFound { .. } => "FILTER_NOT_FOUND",
            FilterError::PermissionDenied { .. } => "PERMISSION_DENIED",
            FilterError::Retryable { .. } => "RETRYABLE",
            FilterError::Fatal { .. } => "FATAL",
            FilterError::Cancelled { .. } => "CANCELLED",
        }
    }

    /// Create a fatal error.
    pub fn fatal(message: impl Into<String>) -> Self {
        FilterError::Fatal {
            message: message.into(),
            source: None,
        }
    }

    /// Create a fatal error wrapping the remote cause.
    pub fn fatal_with_source(message: impl Into<String>, source: RemoteError) -> Self {
        FilterError::Fatal {
            message: message.into(),
            source: Some(source),
        }
    }
}

/// Result type for reconciliation operations.
pub type FilterResult<T> = Result<T, FilterError>;
