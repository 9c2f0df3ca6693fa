use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;
use deadpool_postgres::Config as PgConfig;
use tokio_postgres::Row;
use tracing::warn;

use crate::error::PgMiddlewareError;
use crate::executor::{Executor, rows_affected};
use crate::postgres::{Params, create_pool};
use crate::queryable::Queryable;
use crate::transaction::{Transaction, Tx, TxOptions};
use crate::types::RowValues;

/// Future returned by the body passed to [`Pool::in_tx`].
pub type TxFuture<'t, T> = Pin<Box<dyn Future<Output = Result<T, PgMiddlewareError>> + Send + 't>>;

/// A `Queryable` that can start transactions.
pub trait BeginTx: Queryable {
    type Tx: Transaction;

    /// Start a transaction. `None` uses the server's default options.
    /// `commit` or `rollback` must be called on the result to finalize it.
    fn begin_tx(
        &self,
        options: Option<TxOptions>,
    ) -> impl Future<Output = Result<Self::Tx, PgMiddlewareError>> + Send;
}

/// Connection-pool handle. Cheap to clone; every clone shares the same pool.
///
/// Each `Queryable` call checks out its own connection for the duration of the call, so
/// the handle can be used from any number of tasks at once.
#[derive(Clone)]
pub struct Pool {
    pool: deadpool_postgres::Pool,
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool").field("status", &self.status()).finish()
    }
}

impl Pool {
    /// Wrap an already configured pool.
    #[must_use]
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { pool }
    }

    /// Validate `pg_config` and build a pool from it.
    ///
    /// # Errors
    /// Returns `ConfigError` if required fields are missing or `ConnectionError` if the pool
    /// cannot be created.
    pub fn from_config(pg_config: &PgConfig) -> Result<Self, PgMiddlewareError> {
        create_pool(pg_config).map(Self::new)
    }

    #[must_use]
    pub fn inner(&self) -> &deadpool_postgres::Pool {
        &self.pool
    }

    #[must_use]
    pub fn status(&self) -> deadpool_postgres::Status {
        self.pool.status()
    }

    /// Start a transaction on a freshly checked-out connection.
    ///
    /// # Errors
    /// Returns `BeginTx` wrapping the pool or `BEGIN` failure.
    pub async fn begin_tx(&self, options: Option<TxOptions>) -> Result<Tx, PgMiddlewareError> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| PgMiddlewareError::BeginTx(Box::new(PgMiddlewareError::pool("BEGIN")(e))))?;
        Tx::begin(conn, options.as_ref())
            .await
            .map_err(|e| PgMiddlewareError::BeginTx(Box::new(e)))
    }

    /// Run `body` inside a transaction.
    ///
    /// Commits when `body` succeeds (unless it already finalized the transaction itself) and
    /// rolls back when it fails, returning the body's error.
    ///
    /// ```rust,no_run
    /// use pg_middleware::prelude::*;
    ///
    /// # async fn demo(pool: &Pool) -> Result<(), PgMiddlewareError> {
    /// let moved = pool
    ///     .in_tx(None, |tx| {
    ///         Box::pin(async move {
    ///             tx.exec_raw("UPDATE accounts SET balance = balance - 10 WHERE id = $1", &[RowValues::Int(1)])
    ///                 .await?;
    ///             tx.exec_raw("UPDATE accounts SET balance = balance + 10 WHERE id = $1", &[RowValues::Int(2)])
    ///                 .await
    ///         })
    ///     })
    ///     .await?;
    /// # let _ = moved;
    /// # Ok(()) }
    /// ```
    ///
    /// # Errors
    /// `BeginTx`, the body's error, or the commit error.
    pub async fn in_tx<T, F>(&self, options: Option<TxOptions>, body: F) -> Result<T, PgMiddlewareError>
    where
        T: Send,
        F: for<'t> FnOnce(&'t mut Tx) -> TxFuture<'t, T> + Send,
    {
        let mut tx = self.begin_tx(options).await?;
        match body(&mut tx).await {
            Ok(value) => {
                if !tx.is_closed() {
                    tx.commit().await?;
                }
                Ok(value)
            }
            Err(err) => {
                match tx.rollback().await {
                    Ok(()) | Err(PgMiddlewareError::TxClosed) => {}
                    Err(rollback_err) => {
                        warn!(error = %rollback_err, "rollback after failed transaction body");
                    }
                }
                Err(err)
            }
        }
    }
}

#[async_trait]
impl Executor for Pool {
    async fn execute_raw(&self, sql: &str, args: &[RowValues]) -> Result<usize, PgMiddlewareError> {
        let conn = self.pool.get().await.map_err(PgMiddlewareError::pool("exec"))?;
        let params = Params::convert(args);
        let rows = conn
            .execute(sql, params.as_refs())
            .await
            .map_err(PgMiddlewareError::execution("exec"))?;
        rows_affected(rows)
    }

    async fn query_raw(&self, sql: &str, args: &[RowValues]) -> Result<Vec<Row>, PgMiddlewareError> {
        let conn = self.pool.get().await.map_err(PgMiddlewareError::pool("query"))?;
        let params = Params::convert(args);
        conn.query(sql, params.as_refs())
            .await
            .map_err(PgMiddlewareError::execution("query"))
    }
}

impl BeginTx for Pool {
    type Tx = Tx;

    fn begin_tx(
        &self,
        options: Option<TxOptions>,
    ) -> impl Future<Output = Result<Self::Tx, PgMiddlewareError>> + Send {
        Pool::begin_tx(self, options)
    }
}
