//! Convenient imports for common functionality.

pub use crate::PgConfig;
pub use crate::error::PgMiddlewareError;
pub use crate::executor::Executor;
pub use crate::pool::{BeginTx, Pool, TxFuture};
pub use crate::queryable::Queryable;
pub use crate::scan::FromRow;
pub use crate::sqlizer::{BuildError, RawQuery, SqlParts, Sqlizer};
pub use crate::transaction::{AccessMode, IsolationLevel, Transaction, Tx, TxOptions};
pub use crate::types::{DbRow, RowValues};
