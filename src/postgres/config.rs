use deadpool_postgres::Config as PgConfig;
use tokio_postgres::NoTls;

use crate::error::PgMiddlewareError;

/// Check that `pg_config` names everything a pool needs to connect, then build the pool.
///
/// # Errors
/// Returns `PgMiddlewareError::ConfigError` if a required field is missing or
/// `PgMiddlewareError::ConnectionError` if pool creation fails.
pub fn create_pool(pg_config: &PgConfig) -> Result<deadpool_postgres::Pool, PgMiddlewareError> {
    validate(pg_config)?;

    pg_config
        .create_pool(Some(deadpool_postgres::Runtime::Tokio1), NoTls)
        .map_err(|e| {
            PgMiddlewareError::ConnectionError(format!("Failed to create Postgres pool: {e}"))
        })
}

fn validate(pg_config: &PgConfig) -> Result<(), PgMiddlewareError> {
    if pg_config.url.is_some() {
        return Ok(());
    }
    if pg_config.dbname.is_none() {
        return Err(PgMiddlewareError::ConfigError(
            "dbname is required".to_string(),
        ));
    }
    if pg_config.host.is_none() && pg_config.hosts.as_ref().is_none_or(Vec::is_empty) {
        return Err(PgMiddlewareError::ConfigError(
            "host is required".to_string(),
        ));
    }
    if pg_config.port.is_none() && pg_config.ports.as_ref().is_none_or(Vec::is_empty) {
        return Err(PgMiddlewareError::ConfigError(
            "port is required".to_string(),
        ));
    }
    if pg_config.user.is_none() {
        return Err(PgMiddlewareError::ConfigError(
            "user is required".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PgConfig {
        let mut cfg = PgConfig::new();
        cfg.dbname = Some("testing".to_string());
        cfg.host = Some("localhost".to_string());
        cfg.port = Some(5432);
        cfg.user = Some("testuser".to_string());
        cfg
    }

    #[test]
    fn complete_config_passes() {
        assert!(validate(&complete()).is_ok());
    }

    #[test]
    fn missing_fields_are_named() {
        let mut cfg = complete();
        cfg.dbname = None;
        let err = validate(&cfg).unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: dbname is required");

        let mut cfg = complete();
        cfg.user = None;
        assert!(matches!(validate(&cfg), Err(PgMiddlewareError::ConfigError(m)) if m.contains("user")));
    }

    #[test]
    fn url_skips_field_checks() {
        let mut cfg = PgConfig::new();
        cfg.url = Some("postgres://u:p@localhost:5432/db".to_string());
        assert!(validate(&cfg).is_ok());
    }

    #[tokio::test]
    async fn pool_creation_does_not_connect() {
        // deadpool connects lazily, so an unreachable host still yields a pool.
        let pool = create_pool(&complete()).unwrap();
        assert_eq!(pool.status().size, 0);
    }
}
