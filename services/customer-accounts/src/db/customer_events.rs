//! Customer streams on top of the generic [`EventStore`].

use accounts_events::{Error, Result, StreamId};
use accounts_id::StreamVersion;
use sqlx::{postgres::PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use super::error::technical;
use super::event_store::{EventStore, ExpectedVersion};
use crate::domain::{values::CustomerId, CustomerEvent};
use crate::serialization::CustomerEventCodec;

const AGGREGATE_TYPE: &str = "customer";

/// Stream id of a customer: `customer-<id>`.
pub fn customer_stream_id(customer_id: CustomerId) -> StreamId {
    StreamId::for_aggregate(AGGREGATE_TYPE, customer_id)
}

/// Event store for customer streams.
#[derive(Clone)]
pub struct CustomerEventStore {
    store: EventStore<CustomerEventCodec>,
}

impl CustomerEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            store: EventStore::new(pool, CustomerEventCodec),
        }
    }

    /// Binds a session to the caller's transaction.
    pub fn start_session(&self, tx: Transaction<'static, Postgres>) -> CustomerEventStoreSession {
        CustomerEventStoreSession {
            store: self.store.clone(),
            tx: Some(tx),
        }
    }

    /// Begins a transaction on the pool and binds a session to it.
    pub async fn begin_session(&self) -> Result<CustomerEventStoreSession> {
        let tx = self
            .store
            .pool()
            .begin()
            .await
            .map_err(|e| technical("failed to begin transaction", e))?;
        Ok(self.start_session(tx))
    }

    /// Deletes every event of the customer. Idempotent.
    pub async fn purge_event_stream(&self, customer_id: CustomerId) -> Result<()> {
        self.store
            .purge_event_stream(&customer_stream_id(customer_id))
            .await
            .map(|_| ())
    }
}

/// A single-use unit of work over one transaction.
///
/// Once [`commit`](Self::commit) or [`rollback`](Self::rollback) ran, every
/// further call fails with `Technical`. Dropping an unfinished session rolls
/// its transaction back.
pub struct CustomerEventStoreSession {
    store: EventStore<CustomerEventCodec>,
    tx: Option<Transaction<'static, Postgres>>,
}

impl CustomerEventStoreSession {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| Error::technical("session already finalized"))
    }

    /// Appends the initial events of a new customer stream.
    ///
    /// Fails with `Duplicate` if the stream already exists.
    #[instrument(skip(self, events), fields(customer_id = %customer_id))]
    pub async fn register(&mut self, customer_id: CustomerId, events: &[CustomerEvent]) -> Result<()> {
        let store = self.store.clone();
        let tx = self.tx()?;
        store
            .append_events_to_stream(
                &mut **tx,
                &customer_stream_id(customer_id),
                events,
                ExpectedVersion::NoStream,
            )
            .await
    }

    /// Appends `events` after checking that the stream is still at
    /// `expected_version`.
    ///
    /// Fails with `Concurrency` if another writer got there first.
    #[instrument(skip(self, events), fields(customer_id = %customer_id, expected = %expected_version))]
    pub async fn persist(
        &mut self,
        customer_id: CustomerId,
        events: &[CustomerEvent],
        expected_version: StreamVersion,
    ) -> Result<()> {
        let store = self.store.clone();
        let tx = self.tx()?;
        store
            .append_events_to_stream(
                &mut **tx,
                &customer_stream_id(customer_id),
                events,
                ExpectedVersion::Exact(expected_version),
            )
            .await
    }

    /// The full stream of the customer.
    ///
    /// Fails with `NotFound` if the customer has no events.
    pub async fn event_stream(&mut self, customer_id: CustomerId) -> Result<Vec<CustomerEvent>> {
        self.load_event_stream(customer_id, StreamVersion::FIRST, StreamVersion::new(u32::MAX))
            .await
    }

    /// The customer's events with `from <= version <= to`.
    ///
    /// Fails with `NotFound` if no event matches.
    pub async fn load_event_stream(
        &mut self,
        customer_id: CustomerId,
        from: StreamVersion,
        to: StreamVersion,
    ) -> Result<Vec<CustomerEvent>> {
        let store = self.store.clone();
        let stream_id = customer_stream_id(customer_id);
        let tx = self.tx()?;
        let events = store.load_event_stream(&mut **tx, &stream_id, from, to).await?;
        if events.is_empty() {
            return Err(Error::not_found(format!("no events found for {stream_id}")));
        }
        Ok(events)
    }

    /// Highest stored version of the customer's stream, `0` if empty.
    pub async fn max_stream_version(&mut self, customer_id: CustomerId) -> Result<StreamVersion> {
        let store = self.store.clone();
        let tx = self.tx()?;
        store
            .max_stream_version(&mut **tx, &customer_stream_id(customer_id))
            .await
    }

    pub async fn commit(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::technical("session already finalized"))?;
        tx.commit()
            .await
            .map_err(|e| technical("failed to commit transaction", e))?;
        debug!("session committed");
        Ok(())
    }

    pub async fn rollback(&mut self) -> Result<()> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| Error::technical("session already finalized"))?;
        tx.rollback()
            .await
            .map_err(|e| technical("failed to roll back transaction", e))?;
        debug!("session rolled back");
        Ok(())
    }

    /// Returns true until the session was committed or rolled back.
    pub fn is_active(&self) -> bool {
        self.tx.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_stream_id_format() {
        let id = CustomerId::generate();
        assert_eq!(customer_stream_id(id).as_str(), format!("customer-{id}"));
    }
}
