#![allow(dead_code)]

use accounts_testing::{init_test_tracing, PostgresFixture};
use customer_accounts::db::{Database, DbConfig};
use customer_accounts::domain::values::ConfirmationSecret;

/// A migrated database in a fresh container. Keep it alive for the whole test.
pub struct TestDb {
    _postgres: PostgresFixture,
    pub db: Database,
}

pub async fn start_db() -> TestDb {
    init_test_tracing();
    let postgres = PostgresFixture::start().await;
    let db = Database::connect(&DbConfig::with_url(postgres.database_url()))
        .await
        .expect("connect to test database");
    db.run_migrations().await.expect("run migrations");
    TestDb {
        _postgres: postgres,
        db,
    }
}

pub fn secret() -> ConfirmationSecret {
    ConfirmationSecret::build("itest-confirmation-secret").expect("valid secret")
}
