use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Error as SqlxError, PgPool};

use super::db::port_from_db;
use super::{ConnectionRepository, PortReservation, PortReservationRequest};
use crate::error::Result;

/// Partial unique index over active `(region, port)` pairs
const PORT_RESERVATION_INDEX: &str = "idx_connections_region_port_active";

pub struct PgConnectionRepository {
    pool: PgPool,
}

impl PgConnectionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConnectionRepository for PgConnectionRepository {
    async fn get_highest_used_port(&self, region: &str) -> Result<Option<u16>> {
        let highest: Option<i32> =
            sqlx::query_scalar("SELECT MAX(port) FROM connections WHERE region = $1 AND active")
                .bind(region)
                .fetch_one(&self.pool)
                .await?;

        highest.map(port_from_db).transpose()
    }

    async fn get_used_ports(&self, region: &str) -> Result<HashSet<u16>> {
        let ports: Vec<i32> = sqlx::query_scalar("SELECT port FROM connections WHERE region = $1 AND active")
            .bind(region)
            .fetch_all(&self.pool)
            .await?;

        ports.into_iter().map(port_from_db).collect()
    }

    async fn reserve_port(&self, request: &PortReservationRequest) -> Result<PortReservation> {
        let result = sqlx::query(
            r#"
            INSERT INTO connections (instance_id, region, port, tls_mode, active)
            VALUES ($1, $2, $3, $4, TRUE)
            ON CONFLICT (instance_id) DO UPDATE
            SET region = EXCLUDED.region,
                port = EXCLUDED.port,
                tls_mode = EXCLUDED.tls_mode,
                active = TRUE,
                updated_at = NOW()
            "#,
        )
        .bind(request.instance_id)
        .bind(&request.region)
        .bind(i32::from(request.port))
        .bind(request.tls_mode)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(PortReservation::Reserved),
            Err(SqlxError::Database(db_err))
                if db_err.code().as_deref() == Some("23505")
                    && db_err.constraint() == Some(PORT_RESERVATION_INDEX) =>
            {
                tracing::warn!(
                    region = %request.region,
                    port = request.port,
                    instance_id = %request.instance_id,
                    "port reservation lost to a concurrent request"
                );
                Ok(PortReservation::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }
}
