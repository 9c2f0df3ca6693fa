use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use deadpool_postgres::Object;
use serde::{Deserialize, Serialize};
use tokio_postgres::Row;
use tracing::{debug, warn};

use crate::error::PgMiddlewareError;
use crate::executor::{Executor, rows_affected};
use crate::postgres::Params;
use crate::queryable::Queryable;
use crate::types::RowValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    ReadWrite,
    ReadOnly,
}

/// Options for `BEGIN`. Unset fields fall back to the server's session defaults.
///
/// Can be loaded from application config:
/// ```rust
/// use pg_middleware::prelude::*;
///
/// let opts: TxOptions =
///     serde_json::from_str(r#"{"isolation_level":"serializable","access_mode":"read_only"}"#).unwrap();
/// assert_eq!(opts.begin_sql(), "BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY");
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TxOptions {
    pub isolation_level: Option<IsolationLevel>,
    pub access_mode: Option<AccessMode>,
    /// `DEFERRABLE` only has an effect on `SERIALIZABLE READ ONLY` transactions.
    pub deferrable: Option<bool>,
}

impl TxOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn isolation_level(mut self, level: IsolationLevel) -> Self {
        self.isolation_level = Some(level);
        self
    }

    #[must_use]
    pub fn access_mode(mut self, mode: AccessMode) -> Self {
        self.access_mode = Some(mode);
        self
    }

    #[must_use]
    pub fn deferrable(mut self, deferrable: bool) -> Self {
        self.deferrable = Some(deferrable);
        self
    }

    #[must_use]
    pub fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");
        if let Some(level) = self.isolation_level {
            sql.push_str(" ISOLATION LEVEL ");
            sql.push_str(level.as_sql());
        }
        match self.access_mode {
            Some(AccessMode::ReadWrite) => sql.push_str(" READ WRITE"),
            Some(AccessMode::ReadOnly) => sql.push_str(" READ ONLY"),
            None => {}
        }
        match self.deferrable {
            Some(true) => sql.push_str(" DEFERRABLE"),
            Some(false) => sql.push_str(" NOT DEFERRABLE"),
            None => {}
        }
        sql
    }
}

/// A finalizable transaction: `Queryable` plus commit and rollback.
pub trait Transaction: Queryable {
    /// Commit the transaction.
    ///
    /// Returns `TxClosed` if already finalized, but is otherwise safe to call repeatedly.
    /// Returns `CommitRollback` if the server rolled back instead (the transaction was
    /// already aborted, or COMMIT itself was rejected).
    fn commit(&mut self) -> impl Future<Output = Result<(), PgMiddlewareError>> + Send;

    /// Roll back the transaction.
    ///
    /// Returns `TxClosed` if already finalized, so an unconditional rollback after a
    /// successful commit is harmless. Any other failure discards the underlying connection.
    fn rollback(&mut self) -> impl Future<Output = Result<(), PgMiddlewareError>> + Send;
}

/// A live transaction on one pooled connection.
///
/// Open from creation until the first `commit` or `rollback`; closed afterwards, at which point
/// every operation returns `TxClosed`.
///
/// Dropping an open `Tx` inside a tokio runtime spawns a `ROLLBACK` and returns the connection
/// to the pool once it completes. Outside a runtime, or if that `ROLLBACK` fails, the connection
/// is detached from the pool and closed instead: `Pool::status().size` drops by one and the next
/// checkout opens a fresh connection. Finalize explicitly to keep the connection.
pub struct Tx {
    conn: Option<Object>,
    // Set while the server holds the transaction in the aborted state, i.e. after a failed
    // statement and until a ROLLBACK TO SAVEPOINT (the only statement that can then succeed).
    broken: AtomicBool,
}

impl fmt::Debug for Tx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("closed", &self.is_closed())
            .field("broken", &self.is_broken())
            .finish()
    }
}

impl Tx {
    pub(crate) async fn begin(
        conn: Object,
        options: Option<&TxOptions>,
    ) -> Result<Self, PgMiddlewareError> {
        let sql = options.map_or_else(|| "BEGIN".to_string(), TxOptions::begin_sql);
        // The drop guard owns the connection before BEGIN is sent, so a cancelled begin is
        // rolled back rather than returned to the pool mid-transaction.
        let mut tx = Self {
            conn: Some(conn),
            broken: AtomicBool::new(false),
        };
        let begun = tx.conn()?.batch_execute(&sql).await;
        if let Err(e) = begun {
            if let Some(conn) = tx.conn.take() {
                // A server rejection leaves the session idle; anything else is untrusted.
                if e.as_db_error().is_none() {
                    discard(conn);
                }
            }
            return Err(PgMiddlewareError::execution("BEGIN")(e));
        }
        debug!(statement = %sql, "transaction started");
        Ok(tx)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    /// True while the transaction is aborted server-side; a `commit` now rolls back instead.
    /// Cleared by the next statement that succeeds, e.g. `ROLLBACK TO SAVEPOINT`.
    #[must_use]
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// See [`Transaction::commit`].
    ///
    /// # Errors
    /// `TxClosed`, `CommitRollback`, or `Commit` when the outcome is unknown.
    pub async fn commit(&mut self) -> Result<(), PgMiddlewareError> {
        let conn = self.conn.take().ok_or(PgMiddlewareError::TxClosed)?;

        if self.is_broken() {
            debug!("commit requested on aborted transaction; rolling back");
            if let Err(e) = conn.batch_execute("ROLLBACK").await {
                warn!(error = %e, "rollback of aborted transaction failed");
                discard(conn);
            }
            return Err(PgMiddlewareError::CommitRollback { source: None });
        }

        match conn.batch_execute("COMMIT").await {
            Ok(()) => {
                debug!("transaction committed");
                Ok(())
            }
            // The server answered: it has rolled back and the session is idle again.
            Err(e) if e.as_db_error().is_some() => {
                debug!(error = %e, "commit rejected; transaction rolled back");
                Err(PgMiddlewareError::CommitRollback { source: Some(e) })
            }
            Err(e) => {
                warn!(error = %e, "commit failed without a server response");
                discard(conn);
                Err(PgMiddlewareError::Commit(e))
            }
        }
    }

    /// See [`Transaction::rollback`].
    ///
    /// # Errors
    /// `TxClosed`, or `Rollback` if the ROLLBACK statement failed.
    pub async fn rollback(&mut self) -> Result<(), PgMiddlewareError> {
        let conn = self.conn.take().ok_or(PgMiddlewareError::TxClosed)?;
        match conn.batch_execute("ROLLBACK").await {
            Ok(()) => {
                debug!("transaction rolled back");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "rollback failed");
                discard(conn);
                Err(PgMiddlewareError::Rollback(e))
            }
        }
    }

    fn conn(&self) -> Result<&Object, PgMiddlewareError> {
        self.conn.as_ref().ok_or(PgMiddlewareError::TxClosed)
    }

    fn settle<T>(
        &self,
        op: &'static str,
        result: Result<T, tokio_postgres::Error>,
    ) -> Result<T, PgMiddlewareError> {
        match result {
            Ok(value) => {
                self.broken.store(false, Ordering::Release);
                Ok(value)
            }
            Err(source) => {
                if source.as_db_error().is_some() || source.is_closed() {
                    self.broken.store(true, Ordering::Release);
                }
                Err(PgMiddlewareError::Execution { op, source })
            }
        }
    }
}

#[async_trait]
impl Executor for Tx {
    async fn execute_raw(&self, sql: &str, args: &[RowValues]) -> Result<usize, PgMiddlewareError> {
        let conn = self.conn()?;
        let params = Params::convert(args);
        let rows = self.settle("exec", conn.execute(sql, params.as_refs()).await)?;
        rows_affected(rows)
    }

    async fn query_raw(&self, sql: &str, args: &[RowValues]) -> Result<Vec<Row>, PgMiddlewareError> {
        let conn = self.conn()?;
        let params = Params::convert(args);
        self.settle("query", conn.query(sql, params.as_refs()).await)
    }
}

impl Transaction for Tx {
    fn commit(&mut self) -> impl Future<Output = Result<(), PgMiddlewareError>> + Send {
        Tx::commit(self)
    }

    fn rollback(&mut self) -> impl Future<Output = Result<(), PgMiddlewareError>> + Send {
        Tx::rollback(self)
    }
}

impl Drop for Tx {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        warn!("transaction dropped while open; rolling back");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = conn.batch_execute("ROLLBACK").await {
                        warn!(error = %e, "rollback of dropped transaction failed");
                        discard(conn);
                    }
                });
            }
            Err(_) => discard(conn),
        }
    }
}

/// Detach the connection from its pool so it is closed instead of reused.
fn discard(conn: Object) {
    warn!("discarding connection with untrusted transaction state");
    drop(Object::take(conn));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options_render_plain_begin() {
        assert_eq!(TxOptions::default().begin_sql(), "BEGIN");
    }

    #[test]
    fn all_options_render_in_order() {
        let opts = TxOptions::new()
            .isolation_level(IsolationLevel::Serializable)
            .access_mode(AccessMode::ReadOnly)
            .deferrable(true);
        assert_eq!(
            opts.begin_sql(),
            "BEGIN ISOLATION LEVEL SERIALIZABLE READ ONLY DEFERRABLE"
        );

        let opts = TxOptions::new()
            .isolation_level(IsolationLevel::RepeatableRead)
            .deferrable(false);
        assert_eq!(
            opts.begin_sql(),
            "BEGIN ISOLATION LEVEL REPEATABLE READ NOT DEFERRABLE"
        );
    }

    #[test]
    fn options_deserialize_with_missing_fields() {
        let opts: TxOptions = serde_json::from_str(r#"{"access_mode":"read_write"}"#).unwrap();
        assert_eq!(opts.access_mode, Some(AccessMode::ReadWrite));
        assert_eq!(opts.isolation_level, None);
        assert_eq!(opts.begin_sql(), "BEGIN READ WRITE");
    }
}
