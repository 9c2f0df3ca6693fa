#![allow(dead_code)]

use std::env;
use std::time::Duration;

use pg_middleware::prelude::*;

/// Pool built from `TESTING_PG_*`; `None` when no test database is configured.
pub fn postgres_pool() -> Option<Pool> {
    postgres_config().map(|cfg| Pool::from_config(&cfg).expect("valid test config"))
}

/// Same database, but a pool of exactly one connection.
pub fn single_connection_pool() -> Option<Pool> {
    let mut cfg = postgres_config()?;
    cfg.pool = Some(deadpool_postgres::PoolConfig::new(1));
    Some(Pool::from_config(&cfg).expect("valid test config"))
}

/// One connection, and checkout fails at once instead of waiting for it.
pub fn no_wait_single_connection_pool() -> Option<Pool> {
    let mut cfg = postgres_config()?;
    let mut pool_cfg = deadpool_postgres::PoolConfig::new(1);
    pool_cfg.timeouts.wait = Some(Duration::ZERO);
    cfg.pool = Some(pool_cfg);
    Some(Pool::from_config(&cfg).expect("valid test config"))
}

/// Kill the server process behind `pid` from another connection.
pub async fn terminate_backend(admin: &Pool, pid: i32) -> Result<(), PgMiddlewareError> {
    let terminated: bool = admin
        .get_raw("SELECT pg_terminate_backend($1)", &[RowValues::Int(i64::from(pid))])
        .await?;
    assert!(terminated, "backend {pid} was not terminated");
    // Give the client time to read the FATAL notice and close.
    tokio::time::sleep(Duration::from_millis(250)).await;
    Ok(())
}

pub fn postgres_config() -> Option<PgConfig> {
    let Ok(host) = env::var("TESTING_PG_HOST") else {
        eprintln!("TESTING_PG_HOST not set; skipping database test");
        return None;
    };
    let mut cfg = PgConfig::new();
    cfg.host = Some(host);
    cfg.port = Some(
        env::var("TESTING_PG_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5432),
    );
    cfg.dbname = Some(env::var("TESTING_PG_DBNAME").unwrap_or_else(|_| "testing".to_string()));
    cfg.user = Some(env::var("TESTING_PG_USER").unwrap_or_else(|_| "testuser".to_string()));
    // Trust auth in CI; allow override when a password is required.
    cfg.password = Some(env::var("TESTING_PG_PASSWORD").unwrap_or_default());
    Some(cfg)
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub async fn reset_table(pool: &Pool, table: &str) -> Result<(), PgMiddlewareError> {
    pool.exec_raw(&format!("DROP TABLE IF EXISTS {table}"), &[])
        .await?;
    pool.exec_raw(
        &format!("CREATE TABLE {table} (id BIGINT PRIMARY KEY, name TEXT NOT NULL)"),
        &[],
    )
    .await?;
    Ok(())
}

pub async fn insert_user(
    q: &impl Queryable,
    table: &str,
    id: i64,
    name: &str,
) -> Result<usize, PgMiddlewareError> {
    q.exec(
        &RawQuery::new(format!("INSERT INTO {table} (id, name) VALUES ($1, $2)"))
            .arg(id)
            .arg(name),
    )
    .await
}

pub async fn user_name(q: &impl Queryable, table: &str, id: i64) -> Result<String, PgMiddlewareError> {
    q.get(&RawQuery::new(format!("SELECT name FROM {table} WHERE id = $1")).arg(id))
        .await
}
