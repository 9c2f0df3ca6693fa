use std::future::Future;

use crate::dispatch;
use crate::error::PgMiddlewareError;
use crate::executor::Executor;
use crate::scan::FromRow;
use crate::sqlizer::Sqlizer;
use crate::types::RowValues;

/// Operations needed to query the database. Both [`Pool`](crate::Pool) and [`Tx`](crate::Tx)
/// implement it, so code written against `&impl Queryable` runs inside or outside a transaction.
///
/// Builder and raw variants of one access pattern behave identically once the builder has
/// rendered; the builder variants additionally fail with `Build` before any I/O.
///
/// ```rust,no_run
/// use pg_middleware::prelude::*;
///
/// async fn rename(q: &impl Queryable, id: i64, name: &str) -> Result<usize, PgMiddlewareError> {
///     q.exec(&RawQuery::new("UPDATE users SET name = $1 WHERE id = $2").arg(name).arg(id))
///         .await
/// }
/// ```
pub trait Queryable: Send + Sync {
    /// Execute the builder query and return rows affected.
    fn exec<B>(&self, query: &B) -> impl Future<Output = Result<usize, PgMiddlewareError>> + Send
    where
        B: Sqlizer + Sync + ?Sized;

    /// Execute the raw query and return rows affected.
    fn exec_raw(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> impl Future<Output = Result<usize, PgMiddlewareError>> + Send;

    /// Query a single row. Returns `PgMiddlewareError::NoRows` if no row satisfies the builder query.
    fn get<T, B>(&self, query: &B) -> impl Future<Output = Result<T, PgMiddlewareError>> + Send
    where
        T: FromRow + Send,
        B: Sqlizer + Sync + ?Sized;

    /// Query a single row. Returns `PgMiddlewareError::NoRows` if no row satisfies the raw query.
    fn get_raw<T>(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> impl Future<Output = Result<T, PgMiddlewareError>> + Send
    where
        T: FromRow + Send;

    /// Query multiple rows. An empty `Vec` if no row satisfies the builder query.
    fn select<T, B>(
        &self,
        query: &B,
    ) -> impl Future<Output = Result<Vec<T>, PgMiddlewareError>> + Send
    where
        T: FromRow + Send,
        B: Sqlizer + Sync + ?Sized;

    /// Query multiple rows. An empty `Vec` if no row satisfies the raw query.
    fn select_raw<T>(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> impl Future<Output = Result<Vec<T>, PgMiddlewareError>> + Send
    where
        T: FromRow + Send;
}

impl<E: Executor + ?Sized> Queryable for E {
    fn exec<B>(&self, query: &B) -> impl Future<Output = Result<usize, PgMiddlewareError>> + Send
    where
        B: Sqlizer + Sync + ?Sized,
    {
        dispatch::exec(self, query)
    }

    fn exec_raw(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> impl Future<Output = Result<usize, PgMiddlewareError>> + Send {
        async move { self.execute_raw(sql, args).await }
    }

    fn get<T, B>(&self, query: &B) -> impl Future<Output = Result<T, PgMiddlewareError>> + Send
    where
        T: FromRow + Send,
        B: Sqlizer + Sync + ?Sized,
    {
        dispatch::get(self, query)
    }

    fn get_raw<T>(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> impl Future<Output = Result<T, PgMiddlewareError>> + Send
    where
        T: FromRow + Send,
    {
        dispatch::get_raw(self, sql, args)
    }

    fn select<T, B>(
        &self,
        query: &B,
    ) -> impl Future<Output = Result<Vec<T>, PgMiddlewareError>> + Send
    where
        T: FromRow + Send,
        B: Sqlizer + Sync + ?Sized,
    {
        dispatch::select(self, query)
    }

    fn select_raw<T>(
        &self,
        sql: &str,
        args: &[RowValues],
    ) -> impl Future<Output = Result<Vec<T>, PgMiddlewareError>> + Send
    where
        T: FromRow + Send,
    {
        dispatch::select_raw(self, sql, args)
    }
}
