use std::time::{Duration, Instant};

use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::migrator::Migrator;

/// Shared handle to the ledger database. SeaORM pools connections internally.
pub type DbPool = DatabaseConnection;

/// Pool sizing and timeouts for [`connect`].
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    /// How long a caller waits for a free connection before failing.
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Opens the ledger pool. SQL statement logging stays off; SeaORM's own
/// spans are filtered through `sea_orm=warn` by default.
pub async fn connect(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(?config, "opening ledger database");

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    let pool = Database::connect(options).await.map_err(|e| {
        error!(error = %e, "could not open ledger database");
        ServiceError::DatabaseError(e)
    })?;

    info!(max_connections = config.max_connections, "ledger database ready");
    Ok(pool)
}

pub async fn connect_with(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    connect(&DbConfig::from(cfg)).await
}

/// Brings the schema up to date. Already-applied migrations are skipped.
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    let started = Instant::now();
    match Migrator::up(pool, None).await {
        Ok(()) => {
            info!(elapsed = ?started.elapsed(), "schema up to date");
            Ok(())
        }
        Err(e) => {
            error!(elapsed = ?started.elapsed(), error = %e, "schema migration failed");
            Err(ServiceError::DatabaseError(e))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_pool() -> DbPool {
        connect(&DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        })
        .await
        .expect("connect")
    }

    #[tokio::test]
    async fn memory_database_answers_pings() {
        let pool = memory_pool().await;
        assert!(pool.ping().await.is_ok());
    }

    #[tokio::test]
    async fn migrations_can_run_twice() {
        let pool = memory_pool().await;
        assert!(run_migrations(&pool).await.is_ok());
        assert!(run_migrations(&pool).await.is_ok());
    }

    #[test]
    fn pool_settings_come_from_app_config() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        cfg.db_max_connections = 3;
        cfg.db_acquire_timeout_secs = 2;
        let db_cfg = DbConfig::from(&cfg);
        assert_eq!(db_cfg.max_connections, 3);
        assert_eq!(db_cfg.acquire_timeout, Duration::from_secs(2));
        assert_eq!(db_cfg.url, "sqlite::memory:");
    }
}
