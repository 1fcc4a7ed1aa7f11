use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::error::{OrchestrationError, Result};

pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
        .map_err(|e| OrchestrationError::Persistence(format!("Failed to connect to database: {}", e)))
}

pub(crate) fn port_from_db(port: i32) -> Result<u16> {
    u16::try_from(port).map_err(|_| OrchestrationError::Persistence(format!("stored port {} is out of range", port)))
}
