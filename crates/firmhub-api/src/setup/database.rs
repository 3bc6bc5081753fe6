//! Postgres pool and schema migrations.

use anyhow::{Context, Result};
use firmhub_core::Config;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

const CONNECT_ATTEMPTS: u32 = 5;

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections())
        .acquire_timeout(Duration::from_secs(config.db_timeout_seconds()))
        .idle_timeout(Duration::from_secs(10 * 60))
        .max_lifetime(Duration::from_secs(30 * 60))
        .test_before_acquire(true)
}

/// Connect with a short linear backoff, for databases still starting next to the API.
async fn connect(config: &Config) -> Result<PgPool> {
    let mut attempt = 1;
    loop {
        match pool_options(config).connect(config.database_url()).await {
            Ok(pool) => return Ok(pool),
            Err(e) if attempt < CONNECT_ATTEMPTS => {
                tracing::warn!(attempt, error = %e, "Database not reachable yet, retrying");
                tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                attempt += 1;
            }
            Err(e) => return Err(e).context("Failed to connect to database"),
        }
    }
}

pub async fn setup_database(config: &Config) -> Result<PgPool> {
    let pool = connect(config).await?;
    tracing::info!(
        max_connections = config.db_max_connections(),
        "Database pool ready"
    );

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to apply migrations")?;
    tracing::info!("Migrations up to date");

    Ok(pool)
}
