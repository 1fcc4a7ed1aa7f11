use async_trait::async_trait;
use sqlx::{PgPool, Row};
use swarmdb_models::DnsRecord;

use super::DnsRecordRepository;
use crate::error::Result;

pub struct PgDnsRecordRepository {
    pool: PgPool,
}

impl PgDnsRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DnsRecordRepository for PgDnsRecordRepository {
    async fn find_by_stack(&self, stack_name: &str) -> Result<Vec<DnsRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT id, zone_id, stack_name, hostname, record_type, target, status,
                   provider_record_id, created_at
            FROM dns_records
            WHERE stack_name = $1
            ORDER BY hostname
            "#,
        )
        .bind(stack_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> Result<DnsRecord> {
                Ok(DnsRecord {
                    id: row.try_get("id")?,
                    zone_id: row.try_get("zone_id")?,
                    stack_name: row.try_get("stack_name")?,
                    hostname: row.try_get("hostname")?,
                    record_type: row.try_get("record_type")?,
                    target: row.try_get("target")?,
                    status: row.try_get("status")?,
                    provider_record_id: row.try_get("provider_record_id")?,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    async fn save(&self, records: &[DnsRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for record in records {
            sqlx::query(
                r#"
                INSERT INTO dns_records
                (id, zone_id, stack_name, hostname, record_type, target, status, provider_record_id, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (zone_id, hostname) DO UPDATE
                SET stack_name = EXCLUDED.stack_name,
                    record_type = EXCLUDED.record_type,
                    target = EXCLUDED.target,
                    status = EXCLUDED.status,
                    provider_record_id = EXCLUDED.provider_record_id
                "#,
            )
            .bind(record.id)
            .bind(&record.zone_id)
            .bind(&record.stack_name)
            .bind(&record.hostname)
            .bind(&record.record_type)
            .bind(&record.target)
            .bind(record.status)
            .bind(&record.provider_record_id)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_by_stack(&self, stack_name: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM dns_records WHERE stack_name = $1")
            .bind(stack_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
