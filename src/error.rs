use thiserror::Error;

use crate::sqlizer::BuildError;

#[derive(Debug, Error)]
pub enum PgMiddlewareError {
    /// The builder could not render SQL. Raised before any I/O is attempted.
    #[error("to sql: {0}")]
    Build(#[from] BuildError),

    /// A single-row fetch matched zero rows.
    #[error("no rows in result set")]
    NoRows,

    /// A single-row fetch matched more than one row.
    #[error("expected 1 row, got: {0}")]
    TooManyRows(usize),

    /// The destination type cannot receive the returned columns.
    #[error("scan: {0}")]
    Scan(String),

    #[error("{op}: {source}")]
    Execution {
        op: &'static str,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("acquire connection for {op}: {source}")]
    Pool {
        op: &'static str,
        #[source]
        source: deadpool_postgres::PoolError,
    },

    #[error("begin tx: {0}")]
    BeginTx(#[source] Box<PgMiddlewareError>),

    /// Commit or rollback (or any query) on a transaction that was already finalized.
    #[error("tx is closed")]
    TxClosed,

    /// The transaction was rolled back instead of committed; none of its effects applied.
    #[error("commit unexpectedly resulted in rollback")]
    CommitRollback {
        #[source]
        source: Option<tokio_postgres::Error>,
    },

    /// COMMIT failed at the transport level. The outcome is unknown and the connection was discarded.
    #[error("commit: {0}")]
    Commit(#[source] tokio_postgres::Error),

    /// ROLLBACK failed. The connection was discarded instead of returned to the pool.
    #[error("rollback: {0}")]
    Rollback(#[source] tokio_postgres::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),
}

impl PgMiddlewareError {
    pub(crate) fn execution(op: &'static str) -> impl FnOnce(tokio_postgres::Error) -> Self {
        move |source| Self::Execution { op, source }
    }

    pub(crate) fn pool(op: &'static str) -> impl FnOnce(deadpool_postgres::PoolError) -> Self {
        move |source| Self::Pool { op, source }
    }

    #[must_use]
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    #[must_use]
    pub fn is_tx_closed(&self) -> bool {
        matches!(self, Self::TxClosed)
    }

    #[must_use]
    pub fn is_commit_rollback(&self) -> bool {
        matches!(self, Self::CommitRollback { .. })
    }

    /// True when the builder failed to render, i.e. nothing reached the database.
    #[must_use]
    pub fn is_construction(&self) -> bool {
        matches!(self, Self::Build(_))
    }

    /// The server-reported error (SQLSTATE, message, ...) behind this failure, if any.
    #[must_use]
    pub fn db_error(&self) -> Option<&tokio_postgres::error::DbError> {
        match self {
            Self::Execution { source, .. } | Self::Commit(source) | Self::Rollback(source) => {
                source.as_db_error()
            }
            Self::CommitRollback {
                source: Some(source),
            } => source.as_db_error(),
            Self::BeginTx(inner) => inner.db_error(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_error_is_construction() {
        let err: PgMiddlewareError = BuildError::new("missing table").into();
        assert!(err.is_construction());
        assert!(!err.is_no_rows());
        assert_eq!(err.to_string(), "to sql: missing table");
    }

    #[test]
    fn classification_helpers() {
        assert!(PgMiddlewareError::NoRows.is_no_rows());
        assert!(PgMiddlewareError::TxClosed.is_tx_closed());
        assert!(PgMiddlewareError::CommitRollback { source: None }.is_commit_rollback());
        assert!(PgMiddlewareError::CommitRollback { source: None }.db_error().is_none());
    }

    #[test]
    fn begin_tx_wraps_cause() {
        let err = PgMiddlewareError::BeginTx(Box::new(PgMiddlewareError::ConnectionError(
            "refused".into(),
        )));
        assert_eq!(err.to_string(), "begin tx: Connection error: refused");
        assert!(std::error::Error::source(&err).is_some());
    }
}
