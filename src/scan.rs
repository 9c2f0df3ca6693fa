//! Destination contract for fetched rows.
//!
//! `FromRow` is implemented for scalars (one column), tuples (one field per column)
//! and [`DbRow`] (any shape). Implement it by hand for your own structs:
//!
//! ```rust
//! use pg_middleware::prelude::*;
//! use tokio_postgres::Row;
//!
//! struct User {
//!     id: i64,
//!     name: String,
//! }
//!
//! impl FromRow for User {
//!     fn from_row(row: &Row) -> Result<Self, PgMiddlewareError> {
//!         Ok(User {
//!             id: pg_middleware::scan::column(row, "id")?,
//!             name: pg_middleware::scan::column(row, "name")?,
//!         })
//!     }
//! }
//! ```

use std::sync::Arc;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use tokio_postgres::Row;
use tokio_postgres::types::FromSqlOwned;

use crate::error::PgMiddlewareError;
use crate::types::{DbRow, RowValues};

pub trait FromRow: Sized {
    /// # Errors
    /// Returns `PgMiddlewareError::Scan` if the row's columns do not fit `Self`.
    fn from_row(row: &Row) -> Result<Self, PgMiddlewareError>;
}

/// Exactly one row into `T`.
///
/// # Errors
/// `NoRows` for an empty result, `TooManyRows` for more than one row, `Scan` on a shape mismatch.
pub fn scan_one<T: FromRow>(rows: &[Row]) -> Result<T, PgMiddlewareError> {
    match rows {
        [] => Err(PgMiddlewareError::NoRows),
        [row] => T::from_row(row),
        _ => Err(PgMiddlewareError::TooManyRows(rows.len())),
    }
}

/// Every row into `T`. An empty result is an empty `Vec`.
///
/// # Errors
/// Returns `Scan` on the first row that does not fit `T`.
pub fn scan_all<T: FromRow>(rows: &[Row]) -> Result<Vec<T>, PgMiddlewareError> {
    rows.iter().map(T::from_row).collect()
}

/// Read a column by name.
///
/// # Errors
/// Returns `Scan` if the column is missing or its type does not convert to `T`.
pub fn column<T: FromSqlOwned>(row: &Row, name: &str) -> Result<T, PgMiddlewareError> {
    row.try_get(name)
        .map_err(|e| PgMiddlewareError::Scan(format!("column \"{name}\": {e}")))
}

fn column_at<T: FromSqlOwned>(row: &Row, idx: usize) -> Result<T, PgMiddlewareError> {
    row.try_get(idx).map_err(|e| {
        let name = row.columns().get(idx).map_or("?", |c| c.name());
        PgMiddlewareError::Scan(format!("column {idx} (\"{name}\"): {e}"))
    })
}

fn expect_columns(row: &Row, expected: usize) -> Result<(), PgMiddlewareError> {
    if row.len() == expected {
        Ok(())
    } else {
        Err(PgMiddlewareError::Scan(format!(
            "destination expects {expected} column(s), row has {}",
            row.len()
        )))
    }
}

macro_rules! impl_from_row_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromRow for $ty {
                fn from_row(row: &Row) -> Result<Self, PgMiddlewareError> {
                    expect_columns(row, 1)?;
                    column_at(row, 0)
                }
            }

            impl FromRow for Option<$ty> {
                fn from_row(row: &Row) -> Result<Self, PgMiddlewareError> {
                    expect_columns(row, 1)?;
                    column_at(row, 0)
                }
            }
        )*
    };
}

impl_from_row_scalar!(
    i16,
    i32,
    i64,
    f32,
    f64,
    bool,
    String,
    Vec<u8>,
    NaiveDateTime,
    JsonValue,
);

macro_rules! impl_from_row_tuple {
    ($len:expr => $($idx:tt $name:ident),+) => {
        impl<$($name: FromSqlOwned),+> FromRow for ($($name,)+) {
            fn from_row(row: &Row) -> Result<Self, PgMiddlewareError> {
                expect_columns(row, $len)?;
                Ok(($(column_at::<$name>(row, $idx)?,)+))
            }
        }
    };
}

impl_from_row_tuple!(1 => 0 A);
impl_from_row_tuple!(2 => 0 A, 1 B);
impl_from_row_tuple!(3 => 0 A, 1 B, 2 C);
impl_from_row_tuple!(4 => 0 A, 1 B, 2 C, 3 D);
impl_from_row_tuple!(5 => 0 A, 1 B, 2 C, 3 D, 4 E);
impl_from_row_tuple!(6 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F);
impl_from_row_tuple!(7 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G);
impl_from_row_tuple!(8 => 0 A, 1 B, 2 C, 3 D, 4 E, 5 F, 6 G, 7 H);

impl FromRow for DbRow {
    fn from_row(row: &Row) -> Result<Self, PgMiddlewareError> {
        let names: Vec<String> = row
            .columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect();
        let mut values = Vec::with_capacity(names.len());
        for idx in 0..row.len() {
            values.push(extract_value(row, idx)?);
        }
        Ok(DbRow::new(Arc::new(names), values))
    }
}

/// Column `idx` as a `RowValues`, chosen by the column's Postgres type.
fn extract_value(row: &Row, idx: usize) -> Result<RowValues, PgMiddlewareError> {
    let type_name = row.columns()[idx].type_().name();

    let value = match type_name {
        "int2" => column_at::<Option<i16>>(row, idx)?.map(|v| RowValues::Int(i64::from(v))),
        "int4" => column_at::<Option<i32>>(row, idx)?.map(|v| RowValues::Int(i64::from(v))),
        "int8" => column_at::<Option<i64>>(row, idx)?.map(RowValues::Int),
        "float4" => column_at::<Option<f32>>(row, idx)?.map(|v| RowValues::Float(f64::from(v))),
        "float8" => column_at::<Option<f64>>(row, idx)?.map(RowValues::Float),
        "bool" => column_at::<Option<bool>>(row, idx)?.map(RowValues::Bool),
        "timestamp" => column_at::<Option<NaiveDateTime>>(row, idx)?.map(RowValues::Timestamp),
        "timestamptz" => column_at::<Option<chrono::DateTime<chrono::Utc>>>(row, idx)?
            .map(|v| RowValues::Timestamp(v.naive_utc())),
        "date" => column_at::<Option<chrono::NaiveDate>>(row, idx)?
            .map(|d| RowValues::Timestamp(d.and_time(chrono::NaiveTime::MIN))),
        "json" | "jsonb" => column_at::<Option<JsonValue>>(row, idx)?.map(RowValues::JSON),
        "bytea" => column_at::<Option<Vec<u8>>>(row, idx)?.map(RowValues::Blob),
        // text, varchar, bpchar, name; anything else must at least decode as text
        _ => column_at::<Option<String>>(row, idx)?.map(RowValues::Text),
    };
    Ok(value.unwrap_or(RowValues::Null))
}
