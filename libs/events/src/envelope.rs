//! Event metadata and stream identity.

use accounts_id::StreamVersion;
use chrono::{DateTime, SubsecRound, Utc};

use crate::FailureReason;

/// Metadata embedded in every event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMeta {
    event_name: String,
    occurred_at: DateTime<Utc>,
    stream_version: StreamVersion,
}

impl EventMeta {
    /// Metadata for an event happening now.
    ///
    /// The timestamp is truncated to microseconds, the precision Postgres
    /// keeps, so stored and in-memory events compare equal.
    pub fn build(event_name: impl Into<String>, stream_version: StreamVersion) -> Self {
        Self {
            event_name: event_name.into(),
            occurred_at: Utc::now().trunc_subsecs(6),
            stream_version,
        }
    }

    /// Metadata of an event read back from storage.
    pub fn rebuild(
        event_name: impl Into<String>,
        occurred_at: DateTime<Utc>,
        stream_version: StreamVersion,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            occurred_at,
            stream_version,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn stream_version(&self) -> StreamVersion {
        self.stream_version
    }
}

/// Behaviour shared by every event of a closed event set.
pub trait DomainEvent {
    fn meta(&self) -> &EventMeta;

    /// True for events recording that a command failed a business rule.
    fn is_failure_event(&self) -> bool {
        self.failure_reason().is_some()
    }

    fn failure_reason(&self) -> Option<&FailureReason>;

    fn event_name(&self) -> &str {
        self.meta().event_name()
    }

    fn stream_version(&self) -> StreamVersion {
        self.meta().stream_version()
    }
}

/// The highest stream version in `events`, or [`StreamVersion::INITIAL`]
/// when there are none.
pub fn current_stream_version<E: DomainEvent>(events: &[E]) -> StreamVersion {
    events
        .iter()
        .map(DomainEvent::stream_version)
        .max()
        .unwrap_or(StreamVersion::INITIAL)
}

/// Identity of one event stream, e.g. `customer-cust_01HV4Z2WQXKJNM8GPQY6VBKC3D`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamId(String);

impl StreamId {
    /// The stream of one aggregate instance.
    pub fn for_aggregate(aggregate_type: &str, aggregate_id: impl std::fmt::Display) -> Self {
        Self(format!("{aggregate_type}-{aggregate_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StreamId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use accounts_id::CustomerId;

    struct SomeEvent {
        meta: EventMeta,
        reason: Option<FailureReason>,
    }

    impl DomainEvent for SomeEvent {
        fn meta(&self) -> &EventMeta {
            &self.meta
        }

        fn failure_reason(&self) -> Option<&FailureReason> {
            self.reason.as_ref()
        }
    }

    fn some_event(version: u32) -> SomeEvent {
        SomeEvent {
            meta: EventMeta::build("some.event", StreamVersion::new(version)),
            reason: None,
        }
    }

    #[test]
    fn test_meta_timestamp_has_microsecond_precision() {
        let meta = EventMeta::build("some.event", StreamVersion::FIRST);
        assert_eq!(meta.occurred_at().timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_current_stream_version() {
        let empty: Vec<SomeEvent> = Vec::new();
        assert_eq!(current_stream_version(&empty), StreamVersion::INITIAL);

        let events = vec![some_event(1), some_event(3), some_event(2)];
        assert_eq!(current_stream_version(&events), StreamVersion::new(3));
    }

    #[test]
    fn test_failure_flag_follows_reason() {
        let mut event = some_event(1);
        assert!(!event.is_failure_event());
        event.reason = Some(FailureReason::new(
            ErrorKind::DomainConstraintViolation,
            "nope",
        ));
        assert!(event.is_failure_event());
    }

    #[test]
    fn test_stream_id_format() {
        let id = CustomerId::generate();
        let stream_id = StreamId::for_aggregate("customer", id);
        assert_eq!(stream_id.as_str(), format!("customer-{id}"));
    }
}
