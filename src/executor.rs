use async_trait::async_trait;
use tokio_postgres::Row;

use crate::error::PgMiddlewareError;
use crate::types::RowValues;

/// The raw primitives a handle needs: run a statement for effect, or run a query for rows.
///
/// `Pool` and `Tx` implement this; [`Queryable`](crate::Queryable) is derived from it.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `sql` and return the number of rows affected.
    ///
    /// # Errors
    /// Returns the driver, pool or transaction-state error that prevented execution.
    async fn execute_raw(&self, sql: &str, args: &[RowValues]) -> Result<usize, PgMiddlewareError>;

    /// Run `sql` and return every row it produced.
    ///
    /// # Errors
    /// Returns the driver, pool or transaction-state error that prevented execution.
    async fn query_raw(&self, sql: &str, args: &[RowValues]) -> Result<Vec<Row>, PgMiddlewareError>;
}

pub(crate) fn rows_affected(rows: u64) -> Result<usize, PgMiddlewareError> {
    usize::try_from(rows).map_err(|e| {
        PgMiddlewareError::ConnectionError(format!("Invalid rows affected count: {e}"))
    })
}
