//! Append-only event store on the `eventstore` table.
//!
//! The store never opens transactions for writes or reads of a stream. The
//! caller passes the connection of its own transaction so that "load, decide,
//! append" runs atomically. Concurrent writers are detected through the
//! expected version check and the `(stream_id, stream_version)` unique
//! constraint.

use accounts_events::{DomainEvent, Error, Result, StreamId};
use accounts_id::StreamVersion;
use chrono::{DateTime, Utc};
use sqlx::{
    postgres::{PgPool, PgRow},
    PgConnection, Row,
};
use tracing::{debug, info, instrument};

use super::error::{is_unique_violation, technical};
use crate::serialization::EventCodec;

/// A row from the `eventstore` table.
#[derive(Debug, Clone)]
pub struct EventRow {
    pub stream_id: String,
    pub stream_version: i32,
    pub event_name: String,
    pub payload: Vec<u8>,
    pub occurred_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for EventRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            stream_id: row.try_get("stream_id")?,
            stream_version: row.try_get("stream_version")?,
            event_name: row.try_get("event_name")?,
            payload: row.try_get("payload")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }
}

/// What the writer believes about the stream before appending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// The stream must not exist yet. A clash is reported as `Duplicate`.
    NoStream,
    /// The stream's highest version must be exactly this one. A clash is
    /// reported as `Concurrency`.
    Exact(StreamVersion),
}

impl ExpectedVersion {
    fn version(&self) -> StreamVersion {
        match self {
            ExpectedVersion::NoStream => StreamVersion::INITIAL,
            ExpectedVersion::Exact(version) => *version,
        }
    }

    fn conflict(&self, stream_id: &StreamId, detail: impl std::fmt::Display) -> Error {
        match self {
            ExpectedVersion::NoStream => {
                Error::duplicate(format!("stream {stream_id} already exists: {detail}"))
            }
            ExpectedVersion::Exact(version) => Error::concurrency(format!(
                "stream {stream_id} moved past expected version {version}: {detail}"
            )),
        }
    }
}

impl std::fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpectedVersion::NoStream => f.write_str("no_stream"),
            ExpectedVersion::Exact(version) => write!(f, "{version}"),
        }
    }
}

/// Stream-level operations for one closed event set.
#[derive(Clone)]
pub struct EventStore<C> {
    pool: PgPool,
    codec: C,
}

impl<C: EventCodec> EventStore<C> {
    pub fn new(pool: PgPool, codec: C) -> Self {
        Self { pool, codec }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Appends `events` to `stream_id` on the caller's connection.
    ///
    /// The batch must continue the stream without gaps, starting right after
    /// the expected version. An empty batch is a no-op.
    ///
    /// # Errors
    ///
    /// - `Concurrency` if the stored max version is not the expected one, or
    ///   if the batch does not start right after it.
    /// - `Duplicate` if `ExpectedVersion::NoStream` meets an existing stream.
    /// - `Technical` for gaps inside the batch and any database failure.
    #[instrument(skip(self, conn, events), fields(stream_id = %stream_id, expected = %expected, count = events.len()))]
    pub async fn append_events_to_stream(
        &self,
        conn: &mut PgConnection,
        stream_id: &StreamId,
        events: &[C::Event],
        expected: ExpectedVersion,
    ) -> Result<()> {
        if events.is_empty() {
            debug!("nothing to append");
            return Ok(());
        }
        check_contiguous(stream_id, events, expected)?;

        if let ExpectedVersion::Exact(version) = expected {
            let actual = self.max_stream_version(conn, stream_id).await?;
            if actual != version {
                return Err(expected.conflict(stream_id, format!("found {actual}")));
            }
        }

        for event in events {
            let payload = self.codec.marshal_event(event)?;
            let stream_version = to_column(event.stream_version())?;

            sqlx::query(
                r#"
                INSERT INTO eventstore (stream_id, stream_version, event_name, payload, occurred_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(stream_id.as_str())
            .bind(stream_version)
            .bind(event.event_name())
            .bind(&payload)
            .bind(event.meta().occurred_at())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    let detail = format!("version {} already stored", event.stream_version());
                    expected.conflict(stream_id, detail).with_source(e)
                } else {
                    technical("failed to append event", e)
                }
            })?;

            debug!(
                event_name = event.event_name(),
                stream_version = %event.stream_version(),
                "event appended"
            );
        }

        Ok(())
    }

    /// Loads and decodes the events with `from <= version <= to`, ascending.
    ///
    /// Returns an empty list if nothing matches.
    #[instrument(skip(self, conn), fields(stream_id = %stream_id, from = %from, to = %to))]
    pub async fn load_event_stream(
        &self,
        conn: &mut PgConnection,
        stream_id: &StreamId,
        from: StreamVersion,
        to: StreamVersion,
    ) -> Result<Vec<C::Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT stream_id, stream_version, event_name, payload, occurred_at
            FROM eventstore
            WHERE stream_id = $1 AND stream_version BETWEEN $2 AND $3
            ORDER BY stream_version ASC
            "#,
        )
        .bind(stream_id.as_str())
        .bind(clamp_to_column(from))
        .bind(clamp_to_column(to))
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| technical("failed to load event stream", e))?;

        debug!(rows = rows.len(), "event stream loaded");

        rows.iter().map(|row| self.decode(row)).collect()
    }

    /// Highest stored version of `stream_id`, or `StreamVersion::INITIAL`.
    pub async fn max_stream_version(
        &self,
        conn: &mut PgConnection,
        stream_id: &StreamId,
    ) -> Result<StreamVersion> {
        let row = sqlx::query(
            r#"
            SELECT MAX(stream_version) AS max_version
            FROM eventstore
            WHERE stream_id = $1
            "#,
        )
        .bind(stream_id.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| technical("failed to read stream version", e))?;

        let max_version: Option<i32> = row
            .try_get("max_version")
            .map_err(|e| technical("failed to read stream version", e))?;

        match max_version {
            None => Ok(StreamVersion::INITIAL),
            Some(version) => StreamVersion::try_from(version)
                .map_err(|e| Error::technical(e.to_string()).with_source(e)),
        }
    }

    /// Hard-deletes every row of `stream_id`. Purging a missing stream is not
    /// an error.
    ///
    /// Runs on the pool, outside of any session.
    #[instrument(skip(self), fields(stream_id = %stream_id))]
    pub async fn purge_event_stream(&self, stream_id: &StreamId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM eventstore WHERE stream_id = $1")
            .bind(stream_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| technical("failed to purge event stream", e))?;

        let purged = result.rows_affected();
        info!(purged, "event stream purged");
        Ok(purged)
    }

    fn decode(&self, row: &EventRow) -> Result<C::Event> {
        let stream_version = StreamVersion::try_from(row.stream_version).map_err(|e| {
            Error::unmarshaling_failed(format!("{}: {e}", row.stream_id)).with_source(e)
        })?;
        self.codec
            .unmarshal_event(&row.event_name, &row.payload, stream_version)
    }
}

/// Rejects batches that do not continue the stream one version at a time.
fn check_contiguous<E: DomainEvent>(
    stream_id: &StreamId,
    events: &[E],
    expected: ExpectedVersion,
) -> Result<()> {
    let mut previous = expected.version();
    for (index, event) in events.iter().enumerate() {
        let Some(next) = previous.checked_next() else {
            return Err(Error::technical(format!(
                "stream {stream_id}: no stream version left after {previous}"
            )));
        };
        let version = event.stream_version();
        if version != next {
            return Err(if index == 0 {
                Error::concurrency(format!(
                    "stream {stream_id}: batch starts at version {version}, expected {next}"
                ))
            } else {
                Error::technical(format!(
                    "stream {stream_id}: batch skips from {previous} to {version}"
                ))
            });
        }
        previous = next;
    }
    Ok(())
}

fn to_column(version: StreamVersion) -> Result<i32> {
    i32::try_from(version).map_err(|e| Error::technical(e.to_string()).with_source(e))
}

fn clamp_to_column(version: StreamVersion) -> i32 {
    i32::try_from(version).unwrap_or(i32::MAX)
}
