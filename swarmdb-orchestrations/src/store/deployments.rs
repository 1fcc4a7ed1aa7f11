use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use swarmdb_models::{Deployment, StackDefinition};
use uuid::Uuid;

use super::{DeploymentCommit, DeploymentRepository};
use crate::error::Result;

pub struct PgDeploymentRepository {
    pool: PgPool,
}

impl PgDeploymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(super) async fn load_deployment(pool: &PgPool, instance_id: Uuid) -> Result<Option<Deployment>> {
    let row = sqlx::query(
        r#"
        SELECT id, instance_id, cluster_id, stacks, started_at, completed_at
        FROM deployments
        WHERE instance_id = $1
        "#,
    )
    .bind(instance_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let deployment_id: Uuid = row.try_get("id")?;
    let worker_ids: Vec<Uuid> = sqlx::query_scalar(
        "SELECT worker_id FROM deployment_workers WHERE deployment_id = $1 ORDER BY position",
    )
    .bind(deployment_id)
    .fetch_all(pool)
    .await?;

    let stacks: Json<Vec<StackDefinition>> = row.try_get("stacks")?;

    Ok(Some(Deployment {
        id: deployment_id,
        instance_id: row.try_get("instance_id")?,
        cluster_id: row.try_get("cluster_id")?,
        worker_ids,
        stacks: stacks.0,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    }))
}

#[async_trait]
impl DeploymentRepository for PgDeploymentRepository {
    async fn commit(&self, commit: &DeploymentCommit) -> Result<()> {
        let DeploymentCommit { deployment, connection } = commit;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO connections
            (instance_id, region, port, hostnames, uri, tls_mode, credentials, active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE)
            ON CONFLICT (instance_id) DO UPDATE
            SET region = EXCLUDED.region,
                port = EXCLUDED.port,
                hostnames = EXCLUDED.hostnames,
                uri = EXCLUDED.uri,
                tls_mode = EXCLUDED.tls_mode,
                credentials = EXCLUDED.credentials,
                active = TRUE,
                updated_at = NOW()
            "#,
        )
        .bind(connection.instance_id)
        .bind(&connection.region)
        .bind(i32::from(connection.port))
        .bind(&connection.hostnames)
        .bind(&connection.uri)
        .bind(connection.tls_mode)
        .bind(connection.credentials.clone().map(Json))
        .execute(&mut *tx)
        .await?;

        let deployment_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO deployments
            (id, instance_id, cluster_id, stacks, started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (instance_id) DO UPDATE
            SET cluster_id = EXCLUDED.cluster_id,
                stacks = EXCLUDED.stacks,
                started_at = EXCLUDED.started_at,
                completed_at = EXCLUDED.completed_at
            RETURNING id
            "#,
        )
        .bind(deployment.id)
        .bind(deployment.instance_id)
        .bind(deployment.cluster_id)
        .bind(Json(&deployment.stacks))
        .bind(deployment.started_at)
        .bind(deployment.completed_at)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM deployment_workers WHERE deployment_id = $1")
            .bind(deployment_id)
            .execute(&mut *tx)
            .await?;

        for (position, worker_id) in deployment.worker_ids.iter().enumerate() {
            sqlx::query(
                "INSERT INTO deployment_workers (deployment_id, worker_id, position) VALUES ($1, $2, $3)",
            )
            .bind(deployment_id)
            .bind(worker_id)
            .bind(position as i32)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            instance_id = %deployment.instance_id,
            %deployment_id,
            workers = deployment.worker_ids.len(),
            "deployment committed"
        );
        Ok(())
    }
}
