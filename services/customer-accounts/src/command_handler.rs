//! Runs customer commands against the event store.
//!
//! Every command gets its own transaction: load the stream, let the
//! aggregate decide, append with the loaded version as the expected one and
//! commit. Any error rolls the transaction back and is returned unchanged.
//! Conflicts are not retried here.

use accounts_events::{current_stream_version, DomainEvent, Error, Result};
use tracing::{info, instrument, warn};

use crate::db::{CustomerEventStore, CustomerEventStoreSession};
use crate::domain::commands::{
    ChangeEmailAddress, ChangeName, ConfirmEmailAddress, CustomerCommand, DeleteCustomer,
    RegisterCustomer,
};
use crate::domain::values::CustomerId;
use crate::domain::{self, CustomerEvent, CustomerState};

#[derive(Clone)]
pub struct CustomerCommandHandler {
    store: CustomerEventStore,
}

impl CustomerCommandHandler {
    pub fn new(store: CustomerEventStore) -> Self {
        Self { store }
    }

    /// Starts a new customer stream.
    ///
    /// Fails with `Duplicate` if the customer already exists.
    #[instrument(skip_all, fields(command = RegisterCustomer::NAME, customer_id = %command.customer_id()))]
    pub async fn register(&self, command: &RegisterCustomer) -> Result<()> {
        let customer_id = command.customer_id();
        let events = domain::register_customer(command);

        let mut session = self.store.begin_session().await?;
        let outcome = session.register(customer_id, &events).await.map(|()| events);
        self.finish(session, outcome).await
    }

    /// Confirms the current email address.
    ///
    /// A mismatching hash or address is recorded as a failure event. The
    /// event is committed and the call then fails with
    /// `DomainConstraintViolation`.
    #[instrument(skip_all, fields(command = ConfirmEmailAddress::NAME, customer_id = %command.customer_id()))]
    pub async fn confirm_email_address(&self, command: &ConfirmEmailAddress) -> Result<()> {
        self.handle(command.customer_id(), |stream| {
            domain::confirm_email_address(stream, command)
        })
        .await
    }

    #[instrument(skip_all, fields(command = ChangeEmailAddress::NAME, customer_id = %command.customer_id()))]
    pub async fn change_email_address(&self, command: &ChangeEmailAddress) -> Result<()> {
        self.handle(command.customer_id(), |stream| {
            domain::change_email_address(stream, command)
        })
        .await
    }

    #[instrument(skip_all, fields(command = ChangeName::NAME, customer_id = %command.customer_id()))]
    pub async fn change_name(&self, command: &ChangeName) -> Result<()> {
        self.handle(command.customer_id(), |stream| domain::change_name(stream, command))
            .await
    }

    #[instrument(skip_all, fields(command = DeleteCustomer::NAME, customer_id = %command.customer_id()))]
    pub async fn delete_customer(&self, command: &DeleteCustomer) -> Result<()> {
        self.handle(command.customer_id(), |stream| {
            domain::delete_customer(stream, command)
        })
        .await
    }

    /// Current state of the customer, folded from its stream.
    ///
    /// Fails with `NotFound` for unknown customers.
    pub async fn customer_view(&self, customer_id: CustomerId) -> Result<CustomerState> {
        let mut session = self.store.begin_session().await?;
        let stream = session.event_stream(customer_id).await;
        session.rollback().await?;
        CustomerState::replay(&stream?)
    }

    async fn handle<F>(&self, customer_id: CustomerId, decide: F) -> Result<()>
    where
        F: FnOnce(&[CustomerEvent]) -> Result<Vec<CustomerEvent>>,
    {
        let mut session = self.store.begin_session().await?;
        let outcome = load_decide_persist(&mut session, customer_id, decide).await;
        self.finish(session, outcome).await
    }

    /// Commits recorded events, or rolls back on error.
    async fn finish(
        &self,
        mut session: CustomerEventStoreSession,
        outcome: Result<Vec<CustomerEvent>>,
    ) -> Result<()> {
        let recorded = match outcome {
            Ok(recorded) => recorded,
            Err(err) => {
                if let Err(rollback_err) = session.rollback().await {
                    warn!(error = %rollback_err, "rollback failed");
                }
                return Err(err);
            }
        };

        session.commit().await?;

        if recorded.is_empty() {
            info!("command ignored, nothing to record");
            return Ok(());
        }
        info!(
            recorded = recorded.len(),
            stream_version = %current_stream_version(&recorded),
            "command handled"
        );

        match recorded.iter().find_map(|event| event.failure_reason()) {
            Some(reason) => Err(Error::domain_constraint_violation(reason.message())),
            None => Ok(()),
        }
    }
}

async fn load_decide_persist<F>(
    session: &mut CustomerEventStoreSession,
    customer_id: CustomerId,
    decide: F,
) -> Result<Vec<CustomerEvent>>
where
    F: FnOnce(&[CustomerEvent]) -> Result<Vec<CustomerEvent>>,
{
    let stream = session.event_stream(customer_id).await?;
    let recorded = decide(&stream)?;
    session
        .persist(customer_id, &recorded, current_stream_version(&stream))
        .await?;
    Ok(recorded)
}
