//! Typed ID definitions and the stream version counter.

use crate::{define_id, IdError};

// =============================================================================
// Aggregates
// =============================================================================

define_id!(CustomerId, "cust");

// =============================================================================
// Stream Version
// =============================================================================

/// Position of an event within its stream.
///
/// Events are numbered from [`StreamVersion::FIRST`] upward without gaps.
/// [`StreamVersion::INITIAL`] is the version of a stream that holds no
/// events yet and is only ever used as an expected version, never stored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamVersion(u32);

impl StreamVersion {
    /// The version of a stream without events.
    pub const INITIAL: Self = Self(0);

    /// The version of the first event in a stream.
    pub const FIRST: Self = Self(1);

    /// Creates a StreamVersion from a u32.
    #[must_use]
    pub const fn new(version: u32) -> Self {
        Self(version)
    }

    /// Returns the underlying u32 value.
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Returns the next version, or `None` once the counter is exhausted.
    #[must_use]
    pub const fn checked_next(&self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(version) => Some(Self(version)),
            None => None,
        }
    }

    /// Returns true if this version can be carried by a stored event.
    #[must_use]
    pub const fn is_event_version(&self) -> bool {
        self.0 >= 1
    }
}

impl std::fmt::Display for StreamVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for StreamVersion {
    fn from(version: u32) -> Self {
        Self(version)
    }
}

impl TryFrom<i32> for StreamVersion {
    type Error = IdError;

    fn try_from(version: i32) -> Result<Self, Self::Error> {
        u32::try_from(version)
            .map(Self)
            .map_err(|_| IdError::InvalidStreamVersion(i64::from(version)))
    }
}

impl TryFrom<StreamVersion> for i32 {
    type Error = IdError;

    fn try_from(version: StreamVersion) -> Result<Self, Self::Error> {
        i32::try_from(version.0).map_err(|_| IdError::InvalidStreamVersion(i64::from(version.0)))
    }
}

impl serde::Serialize for StreamVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> serde::Deserialize<'de> for StreamVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let version = u32::deserialize(deserializer)?;
        Ok(Self(version))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_customer_id_roundtrip() {
        let id = CustomerId::generate();
        let s = id.to_string();
        let parsed: CustomerId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_customer_id_prefix() {
        let id = CustomerId::generate();
        assert!(id.to_string().starts_with("cust_"));
    }

    #[test]
    fn test_customer_id_invalid_prefix() {
        let result: Result<CustomerId, _> = "org_01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(
            result.unwrap_err(),
            IdError::InvalidPrefix {
                expected: "cust",
                ..
            }
        ));
    }

    #[test]
    fn test_customer_id_missing_separator() {
        let result: Result<CustomerId, _> = "cust01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert!(matches!(result.unwrap_err(), IdError::MissingSeparator));
    }

    #[test]
    fn test_customer_id_empty() {
        let result: Result<CustomerId, _> = "   ".parse();
        assert!(result.unwrap_err().is_empty());
    }

    #[test]
    fn test_customer_id_invalid_ulid() {
        let result: Result<CustomerId, _> = "cust_invalid".parse();
        assert!(matches!(result.unwrap_err(), IdError::InvalidUlid(_)));
    }

    #[test]
    fn test_customer_id_json_roundtrip() {
        let id = CustomerId::generate();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: CustomerId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_stream_version_next() {
        assert_eq!(StreamVersion::INITIAL.checked_next(), Some(StreamVersion::FIRST));
        assert_eq!(StreamVersion::FIRST.checked_next().map(|v| v.value()), Some(2));
        assert_eq!(StreamVersion::new(u32::MAX).checked_next(), None);
        assert!(!StreamVersion::INITIAL.is_event_version());
        assert!(StreamVersion::FIRST.is_event_version());
    }

    #[test]
    fn test_stream_version_rejects_negative_column_values() {
        assert_eq!(
            StreamVersion::try_from(-1),
            Err(IdError::InvalidStreamVersion(-1))
        );
        assert_eq!(StreamVersion::try_from(7), Ok(StreamVersion::new(7)));
    }

    #[test]
    fn test_stream_version_out_of_column_range() {
        let too_big = StreamVersion::new(u32::MAX);
        assert!(i32::try_from(too_big).is_err());
    }

    proptest! {
        #[test]
        fn prop_stream_version_column_roundtrip(v in 0i32..i32::MAX) {
            let version = StreamVersion::try_from(v).unwrap();
            prop_assert_eq!(i32::try_from(version).unwrap(), v);
        }
    }
}
