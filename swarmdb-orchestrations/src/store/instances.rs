use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use swarmdb_models::{
    Connection, Credentials, DatabaseInstance, InstanceDetails, InstanceSize, InstanceStatus,
};
use uuid::Uuid;

use super::db::port_from_db;
use super::deployments::load_deployment;
use super::InstanceRepository;
use crate::error::Result;

const RELEASE_RESERVATION: &str =
    "UPDATE connections SET active = FALSE, updated_at = NOW() WHERE instance_id = $1 AND active";

pub struct PgInstanceRepository {
    pool: PgPool,
}

impl PgInstanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn instance_from_row(row: &PgRow) -> std::result::Result<DatabaseInstance, sqlx::Error> {
    Ok(DatabaseInstance {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        engine: row.try_get("engine")?,
        engine_version: row.try_get("engine_version")?,
        topology: row.try_get("topology")?,
        size_id: row.try_get("size_id")?,
        region: row.try_get("region")?,
        service_type: row.try_get("service_type")?,
        tls_mode: row.try_get("tls_mode")?,
        stack_name: row.try_get("stack_name")?,
        replica_set_name: row.try_get("replica_set_name")?,
        cluster_id: row.try_get("cluster_id")?,
        status: row.try_get("status")?,
        status_message: row.try_get("status_message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn size_from_row(row: &PgRow) -> std::result::Result<InstanceSize, sqlx::Error> {
    Ok(InstanceSize {
        id: row.try_get("size_id")?,
        name: row.try_get("size_name")?,
        cpu_limit: row.try_get("cpu_limit")?,
        memory_limit_mb: row.try_get("memory_limit_mb")?,
        storage_gb: row.try_get("storage_gb")?,
    })
}

#[async_trait]
impl InstanceRepository for PgInstanceRepository {
    async fn find_with_full_details(&self, instance_id: Uuid) -> Result<Option<InstanceDetails>> {
        let row = sqlx::query(
            r#"
            SELECT i.id, i.owner_id, i.name, i.engine, i.engine_version, i.topology,
                   i.size_id, i.region, i.service_type, i.tls_mode, i.stack_name,
                   i.replica_set_name, i.cluster_id, i.status, i.status_message,
                   i.created_at, i.updated_at,
                   s.name AS size_name, s.cpu_limit, s.memory_limit_mb, s.storage_gb
            FROM database_instances i
            JOIN instance_sizes s ON s.id = i.size_id
            WHERE i.id = $1 AND i.deleted_at IS NULL
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let instance = instance_from_row(&row)?;
        let size = size_from_row(&row)?;
        let deployment = load_deployment(&self.pool, instance_id).await?;

        let connection = sqlx::query(
            r#"
            SELECT instance_id, region, port, hostnames, uri, tls_mode, credentials
            FROM connections
            WHERE instance_id = $1
            "#,
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| -> Result<Connection> {
            let credentials: Option<Json<Credentials>> = row.try_get("credentials")?;
            Ok(Connection {
                instance_id: row.try_get("instance_id")?,
                region: row.try_get("region")?,
                port: port_from_db(row.try_get("port")?)?,
                hostnames: row.try_get("hostnames")?,
                uri: row.try_get("uri")?,
                tls_mode: row.try_get("tls_mode")?,
                credentials: credentials.map(|c| c.0),
            })
        })
        .transpose()?;

        Ok(Some(InstanceDetails { instance, size, deployment, connection }))
    }

    async fn update_status(&self, instance_id: Uuid, status: InstanceStatus, message: Option<&str>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let previous: Option<InstanceStatus> = sqlx::query(
            "SELECT status FROM database_instances WHERE id = $1 FOR UPDATE",
        )
        .bind(instance_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get("status"))
        .transpose()?;

        sqlx::query(
            r#"
            UPDATE database_instances
            SET status = $2,
                status_message = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(instance_id)
        .bind(status)
        .bind(message)
        .execute(&mut *tx)
        .await?;

        // Failed and deleted instances give their port back; only
        // reserve_port may claim it again
        if !status.holds_reservation() {
            sqlx::query(RELEASE_RESERVATION)
                .bind(instance_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        if let Some(previous) = previous.filter(|p| *p != status) {
            tracing::info!(%instance_id, from = %previous, to = %status, "instance status transition");
        }
        Ok(())
    }

    async fn record_placement(&self, instance_id: Uuid, cluster_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE database_instances SET cluster_id = $2, updated_at = NOW() WHERE id = $1")
            .bind(instance_id)
            .bind(cluster_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, instance_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM deployments WHERE instance_id = $1")
            .bind(instance_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            UPDATE database_instances
            SET deleted_at = COALESCE(deleted_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(instance_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_updates_only_release_reservations() {
        assert!(RELEASE_RESERVATION.contains("SET active = FALSE"));
        assert!(!RELEASE_RESERVATION.contains("active = TRUE"));
        assert!(!RELEASE_RESERVATION.contains("$2"));
    }
}
