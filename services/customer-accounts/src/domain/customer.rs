//! Customer aggregate logic.
//!
//! Every operation is a pure function of the current event stream and a
//! command, returning the events to record. Nothing here touches storage or
//! shared state, so replays can run on any number of threads as long as each
//! works on its own stream snapshot.
//!
//! # Invariants
//!
//! - The stream is folded in stream version order; the last write wins
//! - New events are numbered `max(existing versions) + 1`, never reused
//! - Repeating a command that changes nothing records nothing
//! - A deleted customer accepts no further changes

use accounts_events::{DomainEvent, Error, ErrorKind, FailureReason, Result};
use accounts_id::StreamVersion;

use super::commands::{
    ChangeEmailAddress, ChangeName, ConfirmEmailAddress, CustomerCommand, DeleteCustomer,
    RegisterCustomer,
};
use super::events::{CustomerEvent, Registered};
use super::values::{ConfirmationHash, CustomerId, EmailAddress, PersonName};

/// Current state of a customer, derived by replaying its stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerState {
    pub customer_id: CustomerId,
    pub email_address: EmailAddress,
    pub confirmation_hash: ConfirmationHash,
    pub is_email_address_confirmed: bool,
    pub person_name: PersonName,
    pub is_deleted: bool,
    pub current_stream_version: StreamVersion,
}

impl CustomerState {
    /// Folds `stream` into the current state.
    ///
    /// Fails with `NotFound` for an empty stream.
    pub fn replay(stream: &[CustomerEvent]) -> Result<Self> {
        let mut ordered: Vec<&CustomerEvent> = stream.iter().collect();
        ordered.sort_by_key(|event| event.stream_version());

        let mut events = ordered.into_iter();
        let Some(first) = events.next() else {
            return Err(Error::not_found("customer stream has no events"));
        };
        let CustomerEvent::Registered(registered) = first else {
            return Err(Error::technical(format!(
                "customer stream starts with {} instead of a registration",
                first.event_name()
            )));
        };

        let mut state = Self::registered(registered);
        for event in events {
            state.apply(event)?;
        }
        Ok(state)
    }

    fn registered(event: &Registered) -> Self {
        Self {
            customer_id: event.customer_id,
            email_address: event.email_address.clone(),
            confirmation_hash: event.confirmation_hash.clone(),
            is_email_address_confirmed: false,
            person_name: event.person_name.clone(),
            is_deleted: false,
            current_stream_version: event.meta.stream_version(),
        }
    }

    fn apply(&mut self, event: &CustomerEvent) -> Result<()> {
        match event {
            CustomerEvent::Registered(_) => {
                return Err(Error::technical(format!(
                    "customer {} is registered again at version {}",
                    self.customer_id,
                    event.stream_version()
                )));
            }
            CustomerEvent::EmailAddressConfirmed(_) => {
                self.is_email_address_confirmed = true;
            }
            CustomerEvent::EmailAddressConfirmationFailed(_) => {}
            CustomerEvent::EmailAddressChanged(e) => {
                self.email_address = e.email_address.clone();
                self.confirmation_hash = e.confirmation_hash.clone();
                self.is_email_address_confirmed = false;
            }
            CustomerEvent::NameChanged(e) => {
                self.person_name = e.person_name.clone();
            }
            CustomerEvent::Deleted(_) => {
                self.is_deleted = true;
            }
        }
        self.current_stream_version = event.stream_version();
        Ok(())
    }

    fn next_stream_version(&self) -> Result<StreamVersion> {
        self.current_stream_version.checked_next().ok_or_else(|| {
            Error::technical(format!(
                "customer {} has no stream version left after {}",
                self.customer_id, self.current_stream_version
            ))
        })
    }

    fn ensure_accepts<C: CustomerCommand>(&self, command: &C) -> Result<()> {
        if command.customer_id() != self.customer_id {
            return Err(Error::command_invalid(format!(
                "{} targets {} but the stream belongs to {}",
                C::NAME,
                command.customer_id(),
                self.customer_id
            )));
        }
        if self.is_deleted {
            return Err(Error::domain_constraint_violation(format!(
                "{}: customer {} is deleted",
                C::NAME,
                self.customer_id
            )));
        }
        Ok(())
    }
}

/// Records the registration of a new customer at version 1.
pub fn register_customer(command: &RegisterCustomer) -> Vec<CustomerEvent> {
    vec![CustomerEvent::registered(
        command.customer_id(),
        command.email_address().clone(),
        command.confirmation_hash().clone(),
        command.person_name().clone(),
        StreamVersion::FIRST,
    )]
}

/// Confirms the current email address.
///
/// A mismatching address or hash is recorded as a failure event rather than
/// returned as an error; confirming an already confirmed address records
/// nothing.
pub fn confirm_email_address(
    stream: &[CustomerEvent],
    command: &ConfirmEmailAddress,
) -> Result<Vec<CustomerEvent>> {
    let state = CustomerState::replay(stream)?;
    state.ensure_accepts(command)?;

    let targets_current_address = state.email_address == *command.email_address();

    if state.is_email_address_confirmed && targets_current_address {
        return Ok(Vec::new());
    }

    if !targets_current_address || state.confirmation_hash != *command.confirmation_hash() {
        let message = if targets_current_address {
            "wrong confirmation hash supplied"
        } else {
            "confirmation targets an email address that is not current"
        };
        return Ok(vec![CustomerEvent::email_address_confirmation_failed(
            command.customer_id(),
            command.email_address().clone(),
            command.confirmation_hash().clone(),
            FailureReason::new(ErrorKind::DomainConstraintViolation, message),
            state.next_stream_version()?,
        )]);
    }

    Ok(vec![CustomerEvent::email_address_confirmed(
        command.customer_id(),
        command.email_address().clone(),
        state.next_stream_version()?,
    )])
}

/// Changes the email address; the new address starts unconfirmed.
pub fn change_email_address(
    stream: &[CustomerEvent],
    command: &ChangeEmailAddress,
) -> Result<Vec<CustomerEvent>> {
    let state = CustomerState::replay(stream)?;
    state.ensure_accepts(command)?;

    if state.email_address == *command.email_address() {
        return Ok(Vec::new());
    }

    Ok(vec![CustomerEvent::email_address_changed(
        command.customer_id(),
        command.email_address().clone(),
        command.confirmation_hash().clone(),
        state.email_address.clone(),
        state.next_stream_version()?,
    )])
}

pub fn change_name(stream: &[CustomerEvent], command: &ChangeName) -> Result<Vec<CustomerEvent>> {
    let state = CustomerState::replay(stream)?;
    state.ensure_accepts(command)?;

    if state.person_name == *command.person_name() {
        return Ok(Vec::new());
    }

    Ok(vec![CustomerEvent::name_changed(
        command.customer_id(),
        command.person_name().clone(),
        state.next_stream_version()?,
    )])
}

/// Marks the customer as deleted. Deleting twice records nothing.
pub fn delete_customer(
    stream: &[CustomerEvent],
    command: &DeleteCustomer,
) -> Result<Vec<CustomerEvent>> {
    let state = CustomerState::replay(stream)?;

    if state.is_deleted && command.customer_id() == state.customer_id {
        return Ok(Vec::new());
    }
    state.ensure_accepts(command)?;

    Ok(vec![CustomerEvent::deleted(
        command.customer_id(),
        state.email_address.clone(),
        state.next_stream_version()?,
    )])
}
