//! The closed set of customer events.
//!
//! Each variant embeds an [`EventMeta`] and the id of the customer it belongs
//! to. Replay matches exhaustively over [`CustomerEvent`], so adding a variant
//! forces every fold to handle it.

use accounts_events::{DomainEvent, EventMeta, FailureReason};
use accounts_id::StreamVersion;

use super::values::{ConfirmationHash, CustomerId, EmailAddress, PersonName};

// =============================================================================
// Event Name Constants
// =============================================================================

/// Stable external event names, used by the codec and stored with each row.
pub mod event_names {
    pub const REGISTERED: &str = "customer.registered";
    pub const EMAIL_ADDRESS_CONFIRMED: &str = "customer.email_address_confirmed";
    pub const EMAIL_ADDRESS_CONFIRMATION_FAILED: &str =
        "customer.email_address_confirmation_failed";
    pub const EMAIL_ADDRESS_CHANGED: &str = "customer.email_address_changed";
    pub const NAME_CHANGED: &str = "customer.name_changed";
    pub const DELETED: &str = "customer.deleted";

    pub const ALL: [&str; 6] = [
        REGISTERED,
        EMAIL_ADDRESS_CONFIRMED,
        EMAIL_ADDRESS_CONFIRMATION_FAILED,
        EMAIL_ADDRESS_CHANGED,
        NAME_CHANGED,
        DELETED,
    ];
}

// =============================================================================
// Event Payloads
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registered {
    pub meta: EventMeta,
    pub customer_id: CustomerId,
    pub email_address: EmailAddress,
    pub confirmation_hash: ConfirmationHash,
    pub person_name: PersonName,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddressConfirmed {
    pub meta: EventMeta,
    pub customer_id: CustomerId,
    pub email_address: EmailAddress,
}

/// A confirmation attempt that did not match the current address or hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddressConfirmationFailed {
    pub meta: EventMeta,
    pub customer_id: CustomerId,
    pub email_address: EmailAddress,
    pub confirmation_hash: ConfirmationHash,
    pub reason: FailureReason,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddressChanged {
    pub meta: EventMeta,
    pub customer_id: CustomerId,
    pub email_address: EmailAddress,
    pub confirmation_hash: ConfirmationHash,
    /// The address in effect before the change.
    pub previous_email_address: EmailAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameChanged {
    pub meta: EventMeta,
    pub customer_id: CustomerId,
    pub person_name: PersonName,
}

/// Terminal marker of a customer stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deleted {
    pub meta: EventMeta,
    pub customer_id: CustomerId,
    pub email_address: EmailAddress,
}

// =============================================================================
// Event Enum
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomerEvent {
    Registered(Registered),
    EmailAddressConfirmed(EmailAddressConfirmed),
    EmailAddressConfirmationFailed(EmailAddressConfirmationFailed),
    EmailAddressChanged(EmailAddressChanged),
    NameChanged(NameChanged),
    Deleted(Deleted),
}

impl CustomerEvent {
    pub fn registered(
        customer_id: CustomerId,
        email_address: EmailAddress,
        confirmation_hash: ConfirmationHash,
        person_name: PersonName,
        stream_version: StreamVersion,
    ) -> Self {
        Self::Registered(Registered {
            meta: EventMeta::build(event_names::REGISTERED, stream_version),
            customer_id,
            email_address,
            confirmation_hash,
            person_name,
        })
    }

    pub fn email_address_confirmed(
        customer_id: CustomerId,
        email_address: EmailAddress,
        stream_version: StreamVersion,
    ) -> Self {
        Self::EmailAddressConfirmed(EmailAddressConfirmed {
            meta: EventMeta::build(event_names::EMAIL_ADDRESS_CONFIRMED, stream_version),
            customer_id,
            email_address,
        })
    }

    pub fn email_address_confirmation_failed(
        customer_id: CustomerId,
        email_address: EmailAddress,
        confirmation_hash: ConfirmationHash,
        reason: FailureReason,
        stream_version: StreamVersion,
    ) -> Self {
        Self::EmailAddressConfirmationFailed(EmailAddressConfirmationFailed {
            meta: EventMeta::build(
                event_names::EMAIL_ADDRESS_CONFIRMATION_FAILED,
                stream_version,
            ),
            customer_id,
            email_address,
            confirmation_hash,
            reason,
        })
    }

    pub fn email_address_changed(
        customer_id: CustomerId,
        email_address: EmailAddress,
        confirmation_hash: ConfirmationHash,
        previous_email_address: EmailAddress,
        stream_version: StreamVersion,
    ) -> Self {
        Self::EmailAddressChanged(EmailAddressChanged {
            meta: EventMeta::build(event_names::EMAIL_ADDRESS_CHANGED, stream_version),
            customer_id,
            email_address,
            confirmation_hash,
            previous_email_address,
        })
    }

    pub fn name_changed(
        customer_id: CustomerId,
        person_name: PersonName,
        stream_version: StreamVersion,
    ) -> Self {
        Self::NameChanged(NameChanged {
            meta: EventMeta::build(event_names::NAME_CHANGED, stream_version),
            customer_id,
            person_name,
        })
    }

    pub fn deleted(
        customer_id: CustomerId,
        email_address: EmailAddress,
        stream_version: StreamVersion,
    ) -> Self {
        Self::Deleted(Deleted {
            meta: EventMeta::build(event_names::DELETED, stream_version),
            customer_id,
            email_address,
        })
    }

    /// The customer this event belongs to.
    pub fn customer_id(&self) -> CustomerId {
        match self {
            Self::Registered(e) => e.customer_id,
            Self::EmailAddressConfirmed(e) => e.customer_id,
            Self::EmailAddressConfirmationFailed(e) => e.customer_id,
            Self::EmailAddressChanged(e) => e.customer_id,
            Self::NameChanged(e) => e.customer_id,
            Self::Deleted(e) => e.customer_id,
        }
    }
}

impl DomainEvent for CustomerEvent {
    fn meta(&self) -> &EventMeta {
        match self {
            Self::Registered(e) => &e.meta,
            Self::EmailAddressConfirmed(e) => &e.meta,
            Self::EmailAddressConfirmationFailed(e) => &e.meta,
            Self::EmailAddressChanged(e) => &e.meta,
            Self::NameChanged(e) => &e.meta,
            Self::Deleted(e) => &e.meta,
        }
    }

    fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            Self::EmailAddressConfirmationFailed(e) => Some(&e.reason),
            Self::Registered(_)
            | Self::EmailAddressConfirmed(_)
            | Self::EmailAddressChanged(_)
            | Self::NameChanged(_)
            | Self::Deleted(_) => None,
        }
    }
}
