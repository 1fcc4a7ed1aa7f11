use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use swarmdb_models::Worker;
use uuid::Uuid;

use super::WorkerRepository;
use crate::error::Result;

const WORKER_COLUMNS: &str = r#"
    w.id, w.cluster_id, w.hostname, w.public_address, w.worker_number,
    w.current_instance_count, w.region, w.service_type, w.active
"#;

/// Active workers on active, not-unhealthy clusters
const ELIGIBLE: &str = r#"
    FROM workers w
    JOIN clusters c ON c.id = w.cluster_id
    WHERE w.region = $1
      AND w.service_type = $2
      AND w.active
      AND c.active
      AND c.health_status <> 'unhealthy'
"#;

pub struct PgWorkerRepository {
    pool: PgPool,
}

impl PgWorkerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn worker_from_row(row: &PgRow) -> std::result::Result<Worker, sqlx::Error> {
    Ok(Worker {
        id: row.try_get("id")?,
        cluster_id: row.try_get("cluster_id")?,
        hostname: row.try_get("hostname")?,
        public_address: row.try_get("public_address")?,
        worker_number: row.try_get("worker_number")?,
        current_instance_count: row.try_get("current_instance_count")?,
        region: row.try_get("region")?,
        service_type: row.try_get("service_type")?,
        active: row.try_get("active")?,
    })
}

#[async_trait]
impl WorkerRepository for PgWorkerRepository {
    async fn find_optimal(&self, region: &str, service_type: &str) -> Result<Option<Worker>> {
        let sql = format!(
            "SELECT {} {} ORDER BY w.current_instance_count ASC, w.priority DESC, w.worker_number ASC LIMIT 1",
            WORKER_COLUMNS, ELIGIBLE
        );
        let row = sqlx::query(&sql)
            .bind(region)
            .bind(service_type)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(worker_from_row).transpose()?)
    }

    async fn find_eligible(&self, region: &str, service_type: &str) -> Result<Vec<Worker>> {
        let sql = format!(
            "SELECT {} {} ORDER BY w.priority DESC, w.current_instance_count ASC, w.worker_number ASC",
            WORKER_COLUMNS, ELIGIBLE
        );
        let rows = sqlx::query(&sql)
            .bind(region)
            .bind(service_type)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(worker_from_row).collect::<std::result::Result<_, _>>()?)
    }

    async fn increment_instance_count(&self, worker_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE workers SET current_instance_count = current_instance_count + 1 WHERE id = $1")
            .bind(worker_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn decrement_instance_count(&self, worker_id: Uuid) -> Result<()> {
        sqlx::query(
            "UPDATE workers SET current_instance_count = GREATEST(current_instance_count - 1, 0) WHERE id = $1",
        )
        .bind(worker_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
