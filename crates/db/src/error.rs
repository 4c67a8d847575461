//! Typed error type for the db crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// The descriptor could not be parsed, the server could not be reached or
    /// authenticated, or the connection dropped mid-call.
    #[error("connection error: {0}")]
    Connection(#[source] sqlx::Error),

    /// The server rejected a statement (syntax, constraint, type, unknown table).
    #[error("query error: {0}")]
    Query(#[source] sqlx::Error),

    /// Payload or filter columns that the destination table does not have.
    #[error("columns {columns:?} do not exist in table '{table}'")]
    SchemaMismatch { table: String, columns: Vec<String> },

    /// Update against a table without a primary key, or a payload lacking
    /// one of the key columns.
    #[error("table '{table}' has no usable primary key for update")]
    MissingKey { table: String },

    #[error("not connected")]
    NotConnected,

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("cannot decode row: {0}")]
    Decode(#[from] serde_json::Error),
}

impl DbError {
    /// Wrap an error raised while establishing a connection.
    pub fn connection(err: sqlx::Error) -> Self {
        Self::Connection(err)
    }

    /// Whether this error means the connection itself is unusable.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::Configuration(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => Self::Connection(err),
            other => Self::Query(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_failures_classify_as_connection_errors() {
        let err = DbError::from(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        )));
        assert!(err.is_connection());
    }

    #[test]
    fn row_not_found_classifies_as_query_error() {
        let err = DbError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, DbError::Query(_)));
    }

    #[test]
    fn schema_mismatch_names_table_and_columns() {
        let err = DbError::SchemaMismatch {
            table: "visits".into(),
            columns: vec!["colour".into()],
        };
        assert_eq!(
            err.to_string(),
            "columns [\"colour\"] do not exist in table 'visits'"
        );
    }
}
