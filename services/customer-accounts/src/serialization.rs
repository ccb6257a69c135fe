//! Event codec.
//!
//! Customer events are stored as JSON under their stable event name. Every
//! payload embeds a `meta` header with the event name, occurrence time,
//! stream version and, for failure events, the failure reason and its kind.
//! On the way back the stream version stored next to the row is
//! authoritative.

use accounts_events::{DomainEvent, Error, ErrorKind, EventMeta, FailureReason, Result};
use accounts_id::StreamVersion;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::domain::events::{
    event_names, CustomerEvent, Deleted, EmailAddressChanged, EmailAddressConfirmationFailed,
    EmailAddressConfirmed, NameChanged, Registered,
};
use crate::domain::values::{ConfirmationHash, CustomerId, EmailAddress, PersonName};

/// Marshals and unmarshals one closed event set by stable event name.
pub trait EventCodec: Send + Sync {
    type Event: DomainEvent + Send + Sync;

    fn marshal_event(&self, event: &Self::Event) -> Result<Vec<u8>>;

    fn unmarshal_event(
        &self,
        event_name: &str,
        payload: &[u8],
        stream_version: StreamVersion,
    ) -> Result<Self::Event>;
}

/// Codec for [`CustomerEvent`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomerEventCodec;

impl EventCodec for CustomerEventCodec {
    type Event = CustomerEvent;

    fn marshal_event(&self, event: &CustomerEvent) -> Result<Vec<u8>> {
        marshal_customer_event(event)
    }

    fn unmarshal_event(
        &self,
        event_name: &str,
        payload: &[u8],
        stream_version: StreamVersion,
    ) -> Result<CustomerEvent> {
        unmarshal_customer_event(event_name, payload, stream_version)
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaJson {
    event_name: String,
    occurred_at: DateTime<Utc>,
    stream_version: StreamVersion,
    is_failure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    failure_kind: Option<ErrorKind>,
}

impl MetaJson {
    fn from_event(event: &CustomerEvent) -> Self {
        let meta = event.meta();
        let reason = event.failure_reason();
        Self {
            event_name: meta.event_name().to_string(),
            occurred_at: meta.occurred_at(),
            stream_version: meta.stream_version(),
            is_failure: reason.is_some(),
            failure_reason: reason.map(|r| r.message().to_string()),
            failure_kind: reason.map(FailureReason::kind),
        }
    }

    fn rebuild(&self, event_name: &str, stream_version: StreamVersion) -> Result<EventMeta> {
        if !stream_version.is_event_version() {
            return Err(Error::unmarshaling_failed(format!(
                "{event_name}: invalid stream version {stream_version}"
            )));
        }
        Ok(EventMeta::rebuild(
            event_name,
            self.occurred_at,
            stream_version,
        ))
    }

    fn failure_reason(&self, event_name: &str) -> Result<FailureReason> {
        match (self.is_failure, &self.failure_reason, self.failure_kind) {
            (true, Some(message), Some(kind)) => Ok(FailureReason::new(kind, message.clone())),
            _ => Err(Error::unmarshaling_failed(format!(
                "{event_name}: failure event without failure reason"
            ))),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisteredJson {
    customer_id: CustomerId,
    email_address: String,
    confirmation_hash: String,
    given_name: String,
    family_name: String,
    meta: MetaJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddressConfirmedJson {
    customer_id: CustomerId,
    email_address: String,
    meta: MetaJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddressConfirmationFailedJson {
    customer_id: CustomerId,
    email_address: String,
    confirmation_hash: String,
    meta: MetaJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddressChangedJson {
    customer_id: CustomerId,
    email_address: String,
    confirmation_hash: String,
    previous_email_address: String,
    meta: MetaJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NameChangedJson {
    customer_id: CustomerId,
    given_name: String,
    family_name: String,
    meta: MetaJson,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeletedJson {
    customer_id: CustomerId,
    email_address: String,
    meta: MetaJson,
}

// =============================================================================
// Marshal
// =============================================================================

/// The event name a variant must carry.
fn variant_event_name(event: &CustomerEvent) -> &'static str {
    match event {
        CustomerEvent::Registered(_) => event_names::REGISTERED,
        CustomerEvent::EmailAddressConfirmed(_) => event_names::EMAIL_ADDRESS_CONFIRMED,
        CustomerEvent::EmailAddressConfirmationFailed(_) => {
            event_names::EMAIL_ADDRESS_CONFIRMATION_FAILED
        }
        CustomerEvent::EmailAddressChanged(_) => event_names::EMAIL_ADDRESS_CHANGED,
        CustomerEvent::NameChanged(_) => event_names::NAME_CHANGED,
        CustomerEvent::Deleted(_) => event_names::DELETED,
    }
}

/// Encodes `event` as JSON.
///
/// Fails with `MarshalingFailed` if the event's name is unknown or does not
/// belong to its variant.
pub fn marshal_customer_event(event: &CustomerEvent) -> Result<Vec<u8>> {
    let event_name = event.event_name();
    if !event_names::ALL.contains(&event_name) {
        return Err(Error::marshaling_failed(format!(
            "unknown event name '{event_name}'"
        )));
    }
    let expected = variant_event_name(event);
    if event_name != expected {
        return Err(Error::marshaling_failed(format!(
            "event name '{event_name}' does not match event type '{expected}'"
        )));
    }

    let meta = MetaJson::from_event(event);
    let encoded = match event {
        CustomerEvent::Registered(e) => serde_json::to_vec(&RegisteredJson {
            customer_id: e.customer_id,
            email_address: e.email_address.as_str().to_string(),
            confirmation_hash: e.confirmation_hash.as_str().to_string(),
            given_name: e.person_name.given_name().to_string(),
            family_name: e.person_name.family_name().to_string(),
            meta,
        }),
        CustomerEvent::EmailAddressConfirmed(e) => serde_json::to_vec(&EmailAddressConfirmedJson {
            customer_id: e.customer_id,
            email_address: e.email_address.as_str().to_string(),
            meta,
        }),
        CustomerEvent::EmailAddressConfirmationFailed(e) => {
            serde_json::to_vec(&EmailAddressConfirmationFailedJson {
                customer_id: e.customer_id,
                email_address: e.email_address.as_str().to_string(),
                confirmation_hash: e.confirmation_hash.as_str().to_string(),
                meta,
            })
        }
        CustomerEvent::EmailAddressChanged(e) => serde_json::to_vec(&EmailAddressChangedJson {
            customer_id: e.customer_id,
            email_address: e.email_address.as_str().to_string(),
            confirmation_hash: e.confirmation_hash.as_str().to_string(),
            previous_email_address: e.previous_email_address.as_str().to_string(),
            meta,
        }),
        CustomerEvent::NameChanged(e) => serde_json::to_vec(&NameChangedJson {
            customer_id: e.customer_id,
            given_name: e.person_name.given_name().to_string(),
            family_name: e.person_name.family_name().to_string(),
            meta,
        }),
        CustomerEvent::Deleted(e) => serde_json::to_vec(&DeletedJson {
            customer_id: e.customer_id,
            email_address: e.email_address.as_str().to_string(),
            meta,
        }),
    };

    encoded.map_err(|e| {
        Error::marshaling_failed(format!("{event_name}: {e}")).with_source(e)
    })
}

// =============================================================================
// Unmarshal
// =============================================================================

fn decode<T: DeserializeOwned>(event_name: &str, payload: &[u8]) -> Result<T> {
    serde_json::from_slice(payload).map_err(|e| {
        Error::unmarshaling_failed(format!("{event_name}: {e}")).with_source(e)
    })
}

/// Decodes a stored payload into a [`CustomerEvent`] at `stream_version`.
///
/// Fails with `UnmarshalingFailed` for unknown names or malformed payloads.
pub fn unmarshal_customer_event(
    event_name: &str,
    payload: &[u8],
    stream_version: StreamVersion,
) -> Result<CustomerEvent> {
    let event = match event_name {
        event_names::REGISTERED => {
            let dto: RegisteredJson = decode(event_name, payload)?;
            CustomerEvent::Registered(Registered {
                meta: dto.meta.rebuild(event_name, stream_version)?,
                customer_id: dto.customer_id,
                email_address: EmailAddress::rebuild(dto.email_address),
                confirmation_hash: ConfirmationHash::rebuild(dto.confirmation_hash),
                person_name: PersonName::rebuild(dto.given_name, dto.family_name),
            })
        }
        event_names::EMAIL_ADDRESS_CONFIRMED => {
            let dto: EmailAddressConfirmedJson = decode(event_name, payload)?;
            CustomerEvent::EmailAddressConfirmed(EmailAddressConfirmed {
                meta: dto.meta.rebuild(event_name, stream_version)?,
                customer_id: dto.customer_id,
                email_address: EmailAddress::rebuild(dto.email_address),
            })
        }
        event_names::EMAIL_ADDRESS_CONFIRMATION_FAILED => {
            let dto: EmailAddressConfirmationFailedJson = decode(event_name, payload)?;
            CustomerEvent::EmailAddressConfirmationFailed(EmailAddressConfirmationFailed {
                meta: dto.meta.rebuild(event_name, stream_version)?,
                reason: dto.meta.failure_reason(event_name)?,
                customer_id: dto.customer_id,
                email_address: EmailAddress::rebuild(dto.email_address),
                confirmation_hash: ConfirmationHash::rebuild(dto.confirmation_hash),
            })
        }
        event_names::EMAIL_ADDRESS_CHANGED => {
            let dto: EmailAddressChangedJson = decode(event_name, payload)?;
            CustomerEvent::EmailAddressChanged(EmailAddressChanged {
                meta: dto.meta.rebuild(event_name, stream_version)?,
                customer_id: dto.customer_id,
                email_address: EmailAddress::rebuild(dto.email_address),
                confirmation_hash: ConfirmationHash::rebuild(dto.confirmation_hash),
                previous_email_address: EmailAddress::rebuild(dto.previous_email_address),
            })
        }
        event_names::NAME_CHANGED => {
            let dto: NameChangedJson = decode(event_name, payload)?;
            CustomerEvent::NameChanged(NameChanged {
                meta: dto.meta.rebuild(event_name, stream_version)?,
                customer_id: dto.customer_id,
                person_name: PersonName::rebuild(dto.given_name, dto.family_name),
            })
        }
        event_names::DELETED => {
            let dto: DeletedJson = decode(event_name, payload)?;
            CustomerEvent::Deleted(Deleted {
                meta: dto.meta.rebuild(event_name, stream_version)?,
                customer_id: dto.customer_id,
                email_address: EmailAddress::rebuild(dto.email_address),
            })
        }
        unknown => {
            return Err(Error::unmarshaling_failed(format!(
                "unknown event name '{unknown}'"
            )))
        }
    };

    Ok(event)
}
