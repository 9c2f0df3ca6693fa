//! Builder-based calls normalized onto the raw `Executor` primitives.
//!
//! Each helper renders the builder first; a render failure returns
//! `PgMiddlewareError::Build` and the executor is never touched.

use crate::error::PgMiddlewareError;
use crate::executor::Executor;
use crate::scan::{FromRow, scan_all, scan_one};
use crate::sqlizer::Sqlizer;
use crate::types::RowValues;

/// Execute the builder's statement for effect.
///
/// # Errors
/// `Build` if rendering fails, otherwise whatever `execute_raw` returns.
pub async fn exec<E, B>(executor: &E, query: &B) -> Result<usize, PgMiddlewareError>
where
    E: Executor + ?Sized,
    B: Sqlizer + Sync + ?Sized,
{
    let parts = query.to_sql()?;
    executor.execute_raw(&parts.sql, &parts.args).await
}

/// Fetch exactly one row into `T`.
///
/// # Errors
/// `Build` if rendering fails, `NoRows` for zero rows, otherwise as [`get_raw`].
pub async fn get<T, E, B>(executor: &E, query: &B) -> Result<T, PgMiddlewareError>
where
    T: FromRow,
    E: Executor + ?Sized,
    B: Sqlizer + Sync + ?Sized,
{
    let parts = query.to_sql()?;
    get_raw(executor, &parts.sql, &parts.args).await
}

/// Fetch every row into `Vec<T>`; zero rows is `Ok(vec![])`.
///
/// # Errors
/// `Build` if rendering fails, otherwise as [`select_raw`].
pub async fn select<T, E, B>(executor: &E, query: &B) -> Result<Vec<T>, PgMiddlewareError>
where
    T: FromRow,
    E: Executor + ?Sized,
    B: Sqlizer + Sync + ?Sized,
{
    let parts = query.to_sql()?;
    select_raw(executor, &parts.sql, &parts.args).await
}

/// # Errors
/// `NoRows`, `TooManyRows`, `Scan`, or the executor's error.
pub async fn get_raw<T, E>(executor: &E, sql: &str, args: &[RowValues]) -> Result<T, PgMiddlewareError>
where
    T: FromRow,
    E: Executor + ?Sized,
{
    let rows = executor.query_raw(sql, args).await?;
    scan_one(&rows)
}

/// # Errors
/// `Scan`, or the executor's error. Never `NoRows`.
pub async fn select_raw<T, E>(
    executor: &E,
    sql: &str,
    args: &[RowValues],
) -> Result<Vec<T>, PgMiddlewareError>
where
    T: FromRow,
    E: Executor + ?Sized,
{
    let rows = executor.query_raw(sql, args).await?;
    scan_all(&rows)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio_postgres::Row;

    use super::*;
    use crate::queryable::Queryable;
    use crate::sqlizer::{BuildError, RawQuery, SqlParts};

    /// Executor that records every call and answers with no rows.
    #[derive(Default)]
    struct RecordingExecutor {
        calls: Mutex<Vec<(String, Vec<RowValues>)>>,
        affected: usize,
    }

    impl RecordingExecutor {
        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Executor for RecordingExecutor {
        async fn execute_raw(&self, sql: &str, args: &[RowValues]) -> Result<usize, PgMiddlewareError> {
            self.calls.lock().unwrap().push((sql.to_string(), args.to_vec()));
            Ok(self.affected)
        }

        async fn query_raw(&self, sql: &str, args: &[RowValues]) -> Result<Vec<Row>, PgMiddlewareError> {
            self.calls.lock().unwrap().push((sql.to_string(), args.to_vec()));
            Ok(Vec::new())
        }
    }

    /// Builder that always fails and counts how often it was asked to render.
    #[derive(Default)]
    struct BrokenBuilder {
        renders: AtomicUsize,
    }

    impl Sqlizer for BrokenBuilder {
        fn to_sql(&self) -> Result<SqlParts, BuildError> {
            self.renders.fetch_add(1, Ordering::SeqCst);
            Err(BuildError::new("select without columns"))
        }
    }

    #[tokio::test]
    async fn render_failure_never_reaches_executor() {
        let executor = RecordingExecutor::default();
        let builder = BrokenBuilder::default();

        let err = executor.exec(&builder).await.unwrap_err();
        assert!(err.is_construction());
        let err = executor.get::<i64, _>(&builder).await.unwrap_err();
        assert!(err.is_construction());
        let err = executor.select::<i64, _>(&builder).await.unwrap_err();
        assert!(err.is_construction());

        assert_eq!(builder.renders.load(Ordering::SeqCst), 3);
        assert_eq!(executor.call_count(), 0);
    }

    #[tokio::test]
    async fn get_on_zero_rows_is_no_rows_select_is_empty() {
        let executor = RecordingExecutor::default();
        let query = RawQuery::new("SELECT name FROM users WHERE id = $1").arg(9_i64);

        let err = executor.get::<String, _>(&query).await.unwrap_err();
        assert!(err.is_no_rows());
        let err = executor
            .get_raw::<String>("SELECT name FROM users WHERE id = $1", &[RowValues::Int(9)])
            .await
            .unwrap_err();
        assert!(err.is_no_rows());

        let names: Vec<String> = executor.select(&query).await.unwrap();
        assert!(names.is_empty());
        let names: Vec<String> = executor
            .select_raw("SELECT name FROM users WHERE id = $1", &[RowValues::Int(9)])
            .await
            .unwrap();
        assert!(names.is_empty());
    }

    #[tokio::test]
    async fn builder_and_raw_paths_issue_identical_calls() {
        let executor = RecordingExecutor {
            affected: 3,
            ..Default::default()
        };
        let sql = "UPDATE users SET active = $1 WHERE org = $2";
        let args = vec![RowValues::Bool(false), RowValues::Int(4)];

        let via_builder = executor
            .exec(&RawQuery::new(sql).args(args.clone()))
            .await
            .unwrap();
        let via_raw = executor.exec_raw(sql, &args).await.unwrap();
        assert_eq!(via_builder, 3);
        assert_eq!(via_builder, via_raw);

        let calls = executor.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], calls[1]);
        assert_eq!(calls[0].0, sql);
    }
}
