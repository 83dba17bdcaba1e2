//! Persistence gateway: connection pool, migrations, and every
//! parameterized query/transaction the rest of the workspace needs.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use wms_core::WmsError;

pub mod generation;
pub mod metrics;
pub mod operators;
pub mod tasks;
pub mod zones;

pub const ENV_DB_URL: &str = "WMS_DATABASE_URL";

/// Pool bounds: max 20 connections, 30s idle, 3s connect.
#[derive(Debug, Clone, Copy)]
pub struct PoolLimits {
    pub max_connections: u32,
    pub idle_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            max_connections: 20,
            idle_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(3),
        }
    }
}

pub async fn connect(dsn: &str, limits: PoolLimits) -> Result<PgPool, WmsError> {
    PgPoolOptions::new()
        .max_connections(limits.max_connections)
        .idle_timeout(limits.idle_timeout)
        .acquire_timeout(limits.connect_timeout)
        .connect(dsn)
        .await
        .map_err(|e| WmsError::internal(format!("failed to connect to Postgres: {e}")))
}

pub async fn connect_from_env() -> Result<PgPool, WmsError> {
    let dsn = std::env::var(ENV_DB_URL)
        .map_err(|_| WmsError::internal(format!("missing env var {ENV_DB_URL}")))?;
    connect(&dsn, PoolLimits::default()).await
}

pub async fn migrate(pool: &PgPool) -> Result<(), WmsError> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| WmsError::internal(format!("migration failed: {e}")))
}

/// Fail-fast startup check: refuse to serve traffic against a dead pool.
pub async fn check_connectivity(pool: &PgPool) -> Result<(), WmsError> {
    sqlx::query_scalar::<_, i32>("select 1")
        .fetch_one(pool)
        .await
        .map_err(|e| WmsError::internal(format!("startup connectivity check failed: {e}")))?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_tasks_table: bool,
}

pub async fn status(pool: &PgPool) -> Result<DbStatus, WmsError> {
    let ok = sqlx::query_scalar::<_, i32>("select 1")
        .fetch_one(pool)
        .await
        .map(|v| v == 1)
        .unwrap_or(false);

    let has_tasks_table: bool = sqlx::query_scalar(
        r#"
        select exists (
            select 1 from information_schema.tables
            where table_schema = 'public' and table_name = 'tasks'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    Ok(DbStatus { ok, has_tasks_table })
}
