//! Database connection manager.
//!
//! Owns the PostgreSQL pool for the lifetime of one run. Connecting is a
//! single attempt bounded by the configured timeout; the pool is released
//! with [`Database::close`].

use std::time::{Duration, Instant};

use common::config::AppConfig;
use common::errors::{AppError, AppResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// A connected PostgreSQL pool.
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Opens the pool and verifies one connection can be established.
    pub async fn connect(config: &AppConfig) -> AppResult<Self> {
        let timeout = config.connect_timeout();
        tracing::info!(
            database = %config.database.redacted(),
            max_connections = config.max_connections,
            timeout_secs = config.connect_timeout_secs,
            "Connecting to database"
        );

        let connecting = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(timeout)
            .connect_with(config.database.connect_options());

        let pool = match tokio::time::timeout(timeout, connecting).await {
            Ok(Ok(pool)) => pool,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Database connection failed");
                return Err(AppError::DatabaseConnection(e.to_string()));
            }
            Err(_) => {
                tracing::warn!(timeout_secs = config.connect_timeout_secs, "Database connection timed out");
                return Err(AppError::DatabaseConnection(format!(
                    "timed out after {}s connecting to {}:{}",
                    config.connect_timeout_secs,
                    config.database.host(),
                    config.database.port()
                )));
            }
        };

        tracing::info!(
            host = %config.database.host(),
            database = %config.database.database(),
            "Database pool ready"
        );
        Ok(Self { pool })
    }

    /// Round-trips `SELECT 1` and returns the latency.
    pub async fn ping(&self) -> AppResult<Duration> {
        let start = Instant::now();
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(start.elapsed())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Closes every pooled connection; waits for checked-out connections to return.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
