//! Mapping of database errors onto core error kinds.

use telemetry::metrics;
use tracker_core::Error;

/// SQLSTATE for `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

/// Convert a sqlx error. `what` names the missing thing for `NOT_FOUND`.
pub(crate) fn db_error(err: sqlx::Error, what: &str) -> Error {
    match &err {
        sqlx::Error::RowNotFound => Error::not_found(what),
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            Error::duplicate(format!("{} already exists", what))
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some(QUERY_CANCELED) => {
            Error::Timeout
        }
        _ => {
            tracing::error!(error = %err, "Database error");
            metrics().store_errors.inc();
            Error::store(err.to_string())
        }
    }
}
