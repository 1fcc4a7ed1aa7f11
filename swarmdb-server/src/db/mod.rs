use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::config::Config;

/// Connect to the metadata database
pub async fn connect(config: &Config) -> Result<PgPool> {
    swarmdb_orchestrations::store::connect(&config.database_url, config.max_connections)
        .await
        .context("Failed to connect to the metadata database")
}

/// Apply pending schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("../migrations")
        .run(pool)
        .await
        .context("Failed to apply database migrations")?;

    tracing::info!("✓ Database schema up to date");
    Ok(())
}

/// Fail fast when the schema has not been created yet
pub async fn verify_schema(pool: &PgPool) -> Result<()> {
    let result: Option<(bool,)> = sqlx::query_as(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = current_schema()
            AND table_name = 'database_instances'
        )",
    )
    .fetch_optional(pool)
    .await
    .context("Failed to check if schema exists")?;

    match result {
        Some((true,)) => Ok(()),
        _ => anyhow::bail!("SwarmDB tables not found. Please run: swarmdb migrate"),
    }
}
