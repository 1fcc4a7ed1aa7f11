use async_trait::async_trait;
use sqlx::{PgPool, Row};
use swarmdb_models::Cluster;
use uuid::Uuid;

use super::ClusterRepository;
use crate::error::Result;

pub struct PgClusterRepository {
    pool: PgPool,
}

impl PgClusterRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ClusterRepository for PgClusterRepository {
    async fn find_by_id(&self, cluster_id: Uuid) -> Result<Option<Cluster>> {
        let row = sqlx::query(
            r#"
            SELECT id, name, region, service_type, cluster_type, health_status, active,
                   endpoint, tls_ca_pem, tls_cert_pem, tls_key_pem, created_at
            FROM clusters
            WHERE id = $1
            "#,
        )
        .bind(cluster_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Cluster {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            region: row.try_get("region")?,
            service_type: row.try_get("service_type")?,
            cluster_type: row.try_get("cluster_type")?,
            health_status: row.try_get("health_status")?,
            active: row.try_get("active")?,
            endpoint: row.try_get("endpoint")?,
            tls_ca_pem: row.try_get("tls_ca_pem")?,
            tls_cert_pem: row.try_get("tls_cert_pem")?,
            tls_key_pem: row.try_get("tls_key_pem")?,
            created_at: row.try_get("created_at")?,
        }))
    }
}
