//! Infrastructure errors of the database layer.

use accounts_events::Error;
use thiserror::Error;

/// Pool and migration failures.
///
/// Event store operations report [`accounts_events::Error`] directly; this
/// type covers the plumbing around them.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}. Run from repo root or services/customer-accounts.")]
    MigrationDirNotFound { tried: String, last_error: String },
}

impl From<DbError> for Error {
    fn from(err: DbError) -> Self {
        Error::technical(err.to_string()).with_source(err)
    }
}

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Returns true if `err` is a unique constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

/// Wraps a sqlx failure as a `Technical` error.
pub(crate) fn technical(context: &str, err: sqlx::Error) -> Error {
    Error::technical(format!("{context}: {err}")).with_source(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use accounts_events::ErrorKind;

    #[test]
    fn test_db_error_converts_to_technical() {
        let err: Error = DbError::MigrationDirNotFound {
            tried: "./migrations".to_string(),
            last_error: "missing".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Technical);
        assert!(err.message().contains("./migrations"));
    }

    #[test]
    fn test_non_database_errors_are_not_unique_violations() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
        assert!(technical("load", sqlx::Error::RowNotFound).is(ErrorKind::Technical));
    }
}
