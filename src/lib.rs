//! Async `Queryable`/`Tx` wrappers around a deadpool-postgres pool.
//!
//! One trait surface covers both the pool handle and the transaction handle, and accepts
//! either a query builder (anything implementing [`Sqlizer`]) or raw SQL plus arguments.
//!
//! ```rust,no_run
//! use pg_middleware::prelude::*;
//!
//! # async fn demo(cfg: PgConfig) -> Result<(), PgMiddlewareError> {
//! let pool = Pool::from_config(&cfg)?;
//!
//! let mut tx = pool.begin_tx(None).await?;
//! tx.exec(&RawQuery::new("INSERT INTO t (id, name) VALUES ($1, $2)").arg(1_i64).arg("alice"))
//!     .await?;
//! tx.commit().await?;
//!
//! let name: String = pool
//!     .get_raw("SELECT name FROM t WHERE id = $1", &[RowValues::Int(1)])
//!     .await?;
//! assert_eq!(name, "alice");
//! # Ok(()) }
//! ```

pub mod dispatch;
pub mod error;
pub mod executor;
pub mod pool;
pub mod postgres;
pub mod prelude;
pub mod queryable;
pub mod scan;
pub mod sqlizer;
pub mod transaction;
pub mod types;

pub use deadpool_postgres::Config as PgConfig;

pub use error::PgMiddlewareError;
pub use executor::Executor;
pub use pool::{BeginTx, Pool, TxFuture};
pub use queryable::Queryable;
pub use scan::FromRow;
pub use sqlizer::{BuildError, RawQuery, SqlParts, Sqlizer};
pub use transaction::{AccessMode, IsolationLevel, Transaction, Tx, TxOptions};
pub use types::{DbRow, RowValues};
