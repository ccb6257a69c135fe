mod common;

use std::time::Duration;

use accounts_events::{DomainEvent, ErrorKind};
use accounts_id::StreamVersion;
use common::{secret, start_db};
use customer_accounts::command_handler::CustomerCommandHandler;
use customer_accounts::db::{CustomerEventStore, DbError};
use customer_accounts::domain::commands::{ChangeName, CustomerCommand, RegisterCustomer};
use customer_accounts::domain::values::{
    ConfirmationHash, CustomerId, EmailAddress, PersonName,
};
use customer_accounts::domain::{register_customer, CustomerEvent};

fn registration() -> (CustomerId, Vec<CustomerEvent>) {
    let command = RegisterCustomer::build("john@doe.com", "John", "Doe", &secret()).unwrap();
    (command.customer_id(), register_customer(&command))
}

async fn registered(store: &CustomerEventStore) -> CustomerId {
    let (customer_id, events) = registration();
    let mut session = store.begin_session().await.unwrap();
    session.register(customer_id, &events).await.unwrap();
    session.commit().await.unwrap();
    customer_id
}

fn name_changed(customer_id: CustomerId, given: &str, version: u32) -> CustomerEvent {
    CustomerEvent::name_changed(
        customer_id,
        PersonName::rebuild(given, "Doe"),
        StreamVersion::new(version),
    )
}

async fn stream_versions(store: &CustomerEventStore, customer_id: CustomerId) -> Vec<u32> {
    let mut session = store.begin_session().await.unwrap();
    let stream = session.event_stream(customer_id).await.unwrap();
    session.rollback().await.unwrap();
    stream.iter().map(|e| e.stream_version().value()).collect()
}

#[tokio::test]
async fn test_register_and_read_back() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let (customer_id, events) = registration();

    let mut session = store.begin_session().await.unwrap();
    session.register(customer_id, &events).await.unwrap();
    session.commit().await.unwrap();

    let mut session = store.begin_session().await.unwrap();
    let stream = session.event_stream(customer_id).await.unwrap();
    session.rollback().await.unwrap();

    assert_eq!(stream, events);
}

#[tokio::test]
async fn test_register_twice_is_duplicate() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let (customer_id, events) = registration();

    let mut session = store.begin_session().await.unwrap();
    session.register(customer_id, &events).await.unwrap();
    session.commit().await.unwrap();

    let mut session = store.begin_session().await.unwrap();
    let err = session.register(customer_id, &events).await.unwrap_err();
    session.rollback().await.unwrap();

    assert_eq!(err.kind(), ErrorKind::Duplicate);
    assert_eq!(stream_versions(&store, customer_id).await, vec![1]);
}

#[tokio::test]
async fn test_unknown_stream_is_not_found() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();

    let mut session = store.begin_session().await.unwrap();
    let err = session
        .event_stream(CustomerId::generate())
        .await
        .unwrap_err();
    session.rollback().await.unwrap();

    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_persist_appends_after_expected_version() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let customer_id = registered(&store).await;

    let mut session = store.begin_session().await.unwrap();
    let events = vec![
        name_changed(customer_id, "Johnny", 2),
        name_changed(customer_id, "Jon", 3),
    ];
    session
        .persist(customer_id, &events, StreamVersion::FIRST)
        .await
        .unwrap();
    assert_eq!(
        session.max_stream_version(customer_id).await.unwrap(),
        StreamVersion::new(3)
    );
    session.commit().await.unwrap();

    assert_eq!(stream_versions(&store, customer_id).await, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_persist_empty_batch_is_noop() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let customer_id = registered(&store).await;

    let mut session = store.begin_session().await.unwrap();
    session
        .persist(customer_id, &[], StreamVersion::new(7))
        .await
        .unwrap();
    session.commit().await.unwrap();

    assert_eq!(stream_versions(&store, customer_id).await, vec![1]);
}

#[tokio::test]
async fn test_stale_writer_gets_concurrency_error() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let customer_id = registered(&store).await;

    let mut slow = store.begin_session().await.unwrap();
    let loaded = slow.event_stream(customer_id).await.unwrap();
    assert_eq!(loaded.len(), 1);

    let mut fast = store.begin_session().await.unwrap();
    fast.persist(
        customer_id,
        &[name_changed(customer_id, "Fast", 2)],
        StreamVersion::FIRST,
    )
    .await
    .unwrap();
    fast.commit().await.unwrap();

    let err = slow
        .persist(
            customer_id,
            &[name_changed(customer_id, "Slow", 2)],
            StreamVersion::FIRST,
        )
        .await
        .unwrap_err();
    slow.rollback().await.unwrap();

    assert_eq!(err.kind(), ErrorKind::Concurrency);

    let mut session = store.begin_session().await.unwrap();
    let stream = session.event_stream(customer_id).await.unwrap();
    session.rollback().await.unwrap();
    assert_eq!(stream.len(), 2);
    let CustomerEvent::NameChanged(changed) = &stream[1] else {
        panic!("expected a name change, got {}", stream[1].event_name());
    };
    assert_eq!(changed.person_name.given_name(), "Fast");
}

#[tokio::test]
async fn test_batch_not_following_expected_version_is_rejected() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let customer_id = registered(&store).await;

    let mut session = store.begin_session().await.unwrap();
    let err = session
        .persist(
            customer_id,
            &[name_changed(customer_id, "Skip", 3)],
            StreamVersion::FIRST,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Concurrency);

    let err = session
        .persist(
            customer_id,
            &[
                name_changed(customer_id, "One", 2),
                name_changed(customer_id, "Gap", 4),
            ],
            StreamVersion::FIRST,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Technical);
    session.rollback().await.unwrap();

    assert_eq!(stream_versions(&store, customer_id).await, vec![1]);
}

#[tokio::test]
async fn test_finalized_session_cannot_be_reused() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let (customer_id, events) = registration();

    let mut session = store.begin_session().await.unwrap();
    session.register(customer_id, &events).await.unwrap();
    session.commit().await.unwrap();
    assert!(!session.is_active());

    let err = session.event_stream(customer_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Technical);

    let err = session
        .persist(
            customer_id,
            &[name_changed(customer_id, "Late", 2)],
            StreamVersion::FIRST,
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Technical);

    assert_eq!(session.commit().await.unwrap_err().kind(), ErrorKind::Technical);
    assert_eq!(session.rollback().await.unwrap_err().kind(), ErrorKind::Technical);
}

#[tokio::test]
async fn test_rollback_discards_appends() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let (customer_id, events) = registration();

    let mut session = store.begin_session().await.unwrap();
    session.register(customer_id, &events).await.unwrap();
    session.rollback().await.unwrap();

    let mut session = store.begin_session().await.unwrap();
    let err = session.event_stream(customer_id).await.unwrap_err();
    session.rollback().await.unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_load_event_stream_range() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let customer_id = registered(&store).await;

    let email = EmailAddress::rebuild("john@doe.com");
    let new_email = EmailAddress::rebuild("john.frank@doe.com");
    let events = vec![
        name_changed(customer_id, "Johnny", 2),
        CustomerEvent::email_address_changed(
            customer_id,
            new_email.clone(),
            ConfirmationHash::rebuild("hash"),
            email,
            StreamVersion::new(3),
        ),
        CustomerEvent::deleted(customer_id, new_email, StreamVersion::new(4)),
    ];

    let mut session = store.begin_session().await.unwrap();
    session
        .persist(customer_id, &events, StreamVersion::FIRST)
        .await
        .unwrap();
    session.commit().await.unwrap();

    let mut session = store.begin_session().await.unwrap();
    let middle = session
        .load_event_stream(customer_id, StreamVersion::new(2), StreamVersion::new(3))
        .await
        .unwrap();
    let err = session
        .load_event_stream(customer_id, StreamVersion::new(5), StreamVersion::new(9))
        .await
        .unwrap_err();
    session.rollback().await.unwrap();

    assert_eq!(middle, events[..2].to_vec());
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_purge_is_idempotent() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let customer_id = registered(&store).await;

    store.purge_event_stream(customer_id).await.unwrap();
    store.purge_event_stream(customer_id).await.unwrap();
    store
        .purge_event_stream(CustomerId::generate())
        .await
        .unwrap();

    let mut session = store.begin_session().await.unwrap();
    let err = session.event_stream(customer_id).await.unwrap_err();
    assert_eq!(
        session.max_stream_version(customer_id).await.unwrap(),
        StreamVersion::INITIAL
    );
    session.rollback().await.unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Waits until some backend is blocked on a lock, i.e. a writer queued behind
/// an uncommitted insert.
async fn wait_for_lock_waiter(pool: &sqlx::PgPool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let waiting: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pg_stat_activity \
             WHERE wait_event_type = 'Lock' AND datname = current_database()",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        if waiting > 0 {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no writer blocked on the stream within 10s"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_racing_writers_lose_on_unique_version() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let customer_id = registered(&store).await;

    let mut first = store.begin_session().await.unwrap();
    first
        .persist(
            customer_id,
            &[name_changed(customer_id, "First", 2)],
            StreamVersion::FIRST,
        )
        .await
        .unwrap();

    let second = tokio::spawn({
        let store = store.clone();
        async move {
            let mut session = store.begin_session().await.unwrap();
            let result = session
                .persist(
                    customer_id,
                    &[name_changed(customer_id, "Second", 2)],
                    StreamVersion::FIRST,
                )
                .await;
            session.rollback().await.unwrap();
            result
        }
    });

    wait_for_lock_waiter(test_db.db.pool()).await;
    first.commit().await.unwrap();

    let err = second.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Concurrency);
    assert!(err.message().contains("already stored"), "{err}");

    let mut session = store.begin_session().await.unwrap();
    let stream = session.event_stream(customer_id).await.unwrap();
    session.rollback().await.unwrap();
    assert_eq!(stream.len(), 2);
    let CustomerEvent::NameChanged(changed) = &stream[1] else {
        panic!("expected a name change, got {}", stream[1].event_name());
    };
    assert_eq!(changed.person_name.given_name(), "First");
}

#[tokio::test]
async fn test_closed_pool_surfaces_technical_errors() {
    let test_db = start_db().await;
    let store = test_db.db.event_store();
    let handler = CustomerCommandHandler::new(store.clone());
    let customer_id = registered(&store).await;
    test_db.db.health_check().await.unwrap();

    test_db.db.pool().close().await;

    assert!(matches!(
        test_db.db.health_check().await,
        Err(DbError::Query(_))
    ));
    let err = store.begin_session().await.err().unwrap();
    assert_eq!(err.kind(), ErrorKind::Technical);
    let err = store.purge_event_stream(customer_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Technical);
    let err = handler.customer_view(customer_id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Technical);
    let err = handler
        .change_name(&ChangeName::build(&customer_id.to_string(), "Jon", "Doe").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Technical);
}
