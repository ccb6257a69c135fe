//! Error taxonomy shared by value objects, aggregates, the codec and the store.

use accounts_id::IdError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias using [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The kind of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed raw input.
    InputInvalid,
    /// A command that is not safe to evaluate.
    CommandInvalid,
    /// A business rule was violated.
    DomainConstraintViolation,
    /// The stream already exists.
    Duplicate,
    /// No stream exists for the requested id.
    NotFound,
    /// The stream moved on since it was loaded.
    Concurrency,
    /// I/O, transaction or session misuse failure.
    Technical,
    /// An event could not be encoded.
    MarshalingFailed,
    /// Stored bytes could not be decoded into an event.
    UnmarshalingFailed,
}

impl ErrorKind {
    /// All kinds, in declaration order.
    pub const ALL: [ErrorKind; 9] = [
        ErrorKind::InputInvalid,
        ErrorKind::CommandInvalid,
        ErrorKind::DomainConstraintViolation,
        ErrorKind::Duplicate,
        ErrorKind::NotFound,
        ErrorKind::Concurrency,
        ErrorKind::Technical,
        ErrorKind::MarshalingFailed,
        ErrorKind::UnmarshalingFailed,
    ];

    /// The stable tag used when a kind is persisted.
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InputInvalid => "input_invalid",
            ErrorKind::CommandInvalid => "command_invalid",
            ErrorKind::DomainConstraintViolation => "domain_constraint_violation",
            ErrorKind::Duplicate => "duplicate",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Concurrency => "concurrency",
            ErrorKind::Technical => "technical",
            ErrorKind::MarshalingFailed => "marshaling_failed",
            ErrorKind::UnmarshalingFailed => "unmarshaling_failed",
        }
    }

    /// Parses a persisted tag back into a kind.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error tagged with its [`ErrorKind`] and an optional underlying cause.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl Error {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn input_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InputInvalid, message)
    }

    pub fn command_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CommandInvalid, message)
    }

    pub fn domain_constraint_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DomainConstraintViolation, message)
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Duplicate, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn concurrency(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Concurrency, message)
    }

    pub fn technical(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Technical, message)
    }

    pub fn marshaling_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MarshalingFailed, message)
    }

    pub fn unmarshaling_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnmarshalingFailed, message)
    }

    /// Attaches the underlying cause.
    #[must_use]
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync + 'static>>,
    ) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns true if this error is of the given kind.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == kind
    }
}

impl From<IdError> for Error {
    fn from(err: IdError) -> Self {
        Error::input_invalid(err.to_string()).with_source(err)
    }
}

/// Returns true if `err`, or any error in its source chain, is an [`Error`]
/// of the given kind.
pub fn is_kind(err: &(dyn std::error::Error + 'static), kind: ErrorKind) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if let Some(found) = e.downcast_ref::<Error>() {
            if found.is(kind) {
                return true;
            }
        }
        current = e.source();
    }
    false
}

/// The persisted reason of a failure event.
///
/// Round-tripping a reason through storage reproduces an error with the same
/// message and kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureReason {
    kind: ErrorKind,
    message: String,
}

impl FailureReason {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Builds an error carrying this reason.
    pub fn to_error(&self) -> Error {
        Error::new(self.kind, self.message.clone())
    }
}

impl From<&Error> for FailureReason {
    fn from(err: &Error) -> Self {
        Self::new(err.kind(), err.message())
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("wrapped")]
    struct Wrapper(#[source] Error);

    #[test]
    fn test_is_kind_matches_direct_error() {
        let err = Error::concurrency("stream moved on");
        assert!(is_kind(&err, ErrorKind::Concurrency));
        assert!(!is_kind(&err, ErrorKind::Technical));
    }

    #[test]
    fn test_is_kind_walks_source_chain() {
        let err = Wrapper(Error::not_found("no stream"));
        assert!(is_kind(&err, ErrorKind::NotFound));
        assert!(!is_kind(&err, ErrorKind::Duplicate));
    }

    #[test]
    fn test_is_kind_sees_nested_error_kinds() {
        let inner = Error::duplicate("stream exists");
        let outer = Error::technical("register failed").with_source(inner);
        assert!(is_kind(&outer, ErrorKind::Technical));
        assert!(is_kind(&outer, ErrorKind::Duplicate));
    }

    #[test]
    fn test_error_display() {
        let err = Error::input_invalid("email address is empty");
        assert_eq!(err.to_string(), "input_invalid: email address is empty");
    }

    #[test]
    fn test_id_error_maps_to_input_invalid() {
        let err: Error = IdError::Empty.into();
        assert!(err.is(ErrorKind::InputInvalid));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_kind_tags_roundtrip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_tag(kind.as_str()), Some(kind));
        }
        assert_eq!(ErrorKind::from_tag("bogus"), None);
    }

    #[test]
    fn test_kind_serde_matches_tag() {
        let json = serde_json::to_string(&ErrorKind::DomainConstraintViolation).unwrap();
        assert_eq!(json, "\"domain_constraint_violation\"");
    }

    #[test]
    fn test_failure_reason_reproduces_error() {
        let original = Error::domain_constraint_violation("wrong confirmation hash supplied");
        let reason = FailureReason::from(&original);
        let rebuilt = reason.to_error();
        assert_eq!(rebuilt.message(), original.message());
        assert_eq!(rebuilt.kind(), original.kind());
        assert_eq!(rebuilt.to_string(), original.to_string());
    }
}
