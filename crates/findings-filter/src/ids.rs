//! Finding filter identifiers
//!
//! A filter is addressed remotely by two parts, the detector it belongs to
//! and its name. Callers and state stores see a single opaque string,
//! `<detector_id>:<filter_name>`, which must decode back to the same pair.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DecodeError, IdPart, ValidationError};

/// Separator between the detector id and the filter name.
///
/// Reserved: neither part may contain it.
pub const ID_SEPARATOR: char = ':';

/// The two-part remote key of a finding filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterIdentity {
    detector_id: String,
    filter_name: String,
}

impl FilterIdentity {
    /// Create an identity, rejecting empty parts and embedded separators.
    pub fn new(
        detector_id: impl Into<String>,
        filter_name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let detector_id = detector_id.into();
        let filter_name = filter_name.into();

        if let Some(reason) = part_violation(&detector_id) {
            return Err(ValidationError::InvalidDetectorId {
                detector_id,
                reason: reason.to_string(),
            });
        }
        if let Some(reason) = part_violation(&filter_name) {
            return Err(ValidationError::InvalidName {
                name: filter_name,
                reason: reason.to_string(),
            });
        }

        Ok(Self {
            detector_id,
            filter_name,
        })
    }

    /// Get the detector (parent scope) id.
    pub fn detector_id(&self) -> &str {
        &self.detector_id
    }

    /// Get the filter name.
    pub fn filter_name(&self) -> &str {
        &self.filter_name
    }

    /// Encode into the opaque identifier handed to callers.
    pub fn encode(&self) -> OpaqueId {
        encode(self)
    }
}

impl fmt::Display for FilterIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.detector_id, ID_SEPARATOR, self.filter_name)
    }
}

impl FromStr for FilterIdentity {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

fn part_violation(part: &str) -> Option<&'static str> {
    if part.is_empty() {
        Some("must not be empty")
    } else if part.contains(ID_SEPARATOR) {
        Some("must not contain ':'")
    } else {
        None
    }
}

/// Opaque, stable identifier of a finding filter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpaqueId(String);

impl OpaqueId {
    /// Wrap an externally supplied identifier (e.g. from an import request)
    /// without decoding it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode back into its two parts.
    pub fn decode(&self) -> Result<FilterIdentity, DecodeError> {
        decode(&self.0)
    }
}

impl fmt::Display for OpaqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&FilterIdentity> for OpaqueId {
    fn from(identity: &FilterIdentity) -> Self {
        encode(identity)
    }
}

impl From<OpaqueId> for String {
    fn from(id: OpaqueId) -> Self {
        id.0
    }
}

/// Join the two parts of an identity with [`ID_SEPARATOR`].
pub fn encode(identity: &FilterIdentity) -> OpaqueId {
    OpaqueId(identity.to_string())
}

/// Split an opaque identifier into its detector id and filter name.
///
/// Fails with [`DecodeError::Malformed`] when the separator is missing or
/// repeated, and with [`DecodeError::EmptyPart`] when either side is empty.
pub fn decode(id: &str) -> Result<FilterIdentity, DecodeError> {
    let malformed = || DecodeError::Malformed { id: id.to_string() };

    let (detector_id, filter_name) = id.split_once(ID_SEPARATOR).ok_or_else(malformed)?;
    if filter_name.contains(ID_SEPARATOR) {
        return Err(malformed());
    }

    let empty = |part| DecodeError::EmptyPart {
        id: id.to_string(),
        part,
    };
    if detector_id.is_empty() {
        return Err(empty(IdPart::DetectorId));
    }
    if filter_name.is_empty() {
        return Err(empty(IdPart::FilterName));
    }

    Ok(FilterIdentity {
        detector_id: detector_id.to_string(),
        filter_name: filter_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const DETECTOR: &str = "12abc34d567e8fa901bc2d34e56789f0";

    #[test]
    fn test_encode() {
        let identity = FilterIdentity::new(DETECTOR, "test-filter").unwrap();
        assert_eq!(
            identity.encode().as_str(),
            "12abc34d567e8fa901bc2d34e56789f0:test-filter"
        );
    }

    #[test]
    fn test_decode() {
        let identity = decode("12abc34d567e8fa901bc2d34e56789f0:test-filter").unwrap();
        assert_eq!(identity.detector_id(), DETECTOR);
        assert_eq!(identity.filter_name(), "test-filter");
    }

    #[test]
    fn test_decode_missing_separator() {
        let err = decode("12abc34d567e8fa901bc2d34e56789f0").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_decode_repeated_separator() {
        let err = decode("abc:def:ghi").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed { .. }));
    }

    #[test]
    fn test_decode_empty_parts() {
        assert_eq!(
            decode(":test-filter").unwrap_err(),
            DecodeError::EmptyPart {
                id: ":test-filter".to_string(),
                part: IdPart::DetectorId,
            }
        );
        assert_eq!(
            decode("abc:").unwrap_err(),
            DecodeError::EmptyPart {
                id: "abc:".to_string(),
                part: IdPart::FilterName,
            }
        );
        assert!(matches!(
            decode(":").unwrap_err(),
            DecodeError::EmptyPart {
                part: IdPart::DetectorId,
                ..
            }
        ));
    }

    #[test]
    fn test_identity_rejects_separator() {
        assert!(matches!(
            FilterIdentity::new("abc", "a:b"),
            Err(ValidationError::InvalidName { .. })
        ));
        assert!(matches!(
            FilterIdentity::new("a:b", "name"),
            Err(ValidationError::InvalidDetectorId { .. })
        ));
        assert!(matches!(
            FilterIdentity::new("", "name"),
            Err(ValidationError::InvalidDetectorId { .. })
        ));
    }

    #[test]
    fn test_from_str() {
        let identity: FilterIdentity = "abc:def".parse().unwrap();
        assert_eq!(identity.filter_name(), "def");
    }

    #[test]
    fn test_opaque_id_serialization() {
        let id = FilterIdentity::new("abc", "def").unwrap().encode();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abc:def\"");

        let parsed: OpaqueId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.decode().unwrap().detector_id(), "abc");
    }
}
