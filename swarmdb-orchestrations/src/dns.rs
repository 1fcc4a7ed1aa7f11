//! DNS zone lookup and record management

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use swarmdb_models::{DnsZone, Engine};

use crate::error::{OrchestrationError, Result};

/// A record to publish
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecordRequest {
    pub hostname: String,
    pub record_type: String,
    pub target: String,
    pub ttl: u32,
}

impl DnsRecordRequest {
    /// `A` for IP targets, `CNAME` otherwise
    pub fn new(hostname: impl Into<String>, target: impl Into<String>, ttl: u32) -> Self {
        let target = target.into();
        let record_type = if target.parse::<IpAddr>().is_ok() { "A" } else { "CNAME" };
        Self {
            hostname: hostname.into(),
            record_type: record_type.to_string(),
            target,
            ttl,
        }
    }
}

#[async_trait]
pub trait DnsService: Send + Sync {
    async fn find_zone_by_region_and_engine(&self, region: &str, engine: Engine) -> Result<Option<DnsZone>>;

    /// Create records, returning provider record ids in request order
    async fn create_records(&self, zone: &DnsZone, records: &[DnsRecordRequest]) -> Result<Vec<String>>;

    /// Delete every record for each hostname; missing records are not an error
    async fn delete_records(&self, zone: &DnsZone, hostnames: &[String]) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct CloudflareConfig {
    pub api_base: String,
    pub api_token: String,
    pub timeout: Duration,
}

impl Default for CloudflareConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.cloudflare.com/client/v4".to_string(),
            api_token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Zones live in `dns_zones`; records go through the Cloudflare v4 API
pub struct CloudflareDns {
    http: reqwest::Client,
    config: CloudflareConfig,
    pool: PgPool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ApiRecord {
    id: String,
}

impl CloudflareDns {
    pub fn new(config: CloudflareConfig, pool: PgPool) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("swarmdb/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| OrchestrationError::Dns(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config, pool })
    }

    fn records_url(&self, zone: &DnsZone) -> String {
        format!("{}/zones/{}/dns_records", self.config.api_base, zone.zone_id)
    }

    async fn send<T: for<'de> Deserialize<'de>>(&self, request: reqwest::RequestBuilder) -> Result<Option<T>> {
        let response = request
            .bearer_auth(&self.config.api_token)
            .send()
            .await
            .map_err(|e| OrchestrationError::Dns(e.to_string()))?;

        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| OrchestrationError::Dns(format!("unreadable response ({}): {}", status, e)))?;

        if !body.success {
            return Err(OrchestrationError::Dns(describe_errors(status, &body.errors)));
        }
        Ok(body.result)
    }
}

fn describe_errors(status: reqwest::StatusCode, errors: &[ApiMessage]) -> String {
    if errors.is_empty() {
        return format!("request failed with {}", status);
    }
    let messages: Vec<String> = errors
        .iter()
        .map(|e| format!("{} (code {})", e.message, e.code))
        .collect();
    format!("request failed with {}: {}", status, messages.join("; "))
}

#[async_trait]
impl DnsService for CloudflareDns {
    async fn find_zone_by_region_and_engine(&self, region: &str, engine: Engine) -> Result<Option<DnsZone>> {
        let row = sqlx::query("SELECT zone_id, domain, region, engine FROM dns_zones WHERE region = $1 AND engine = $2")
            .bind(region)
            .bind(engine)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(DnsZone {
            zone_id: row.try_get("zone_id")?,
            domain: row.try_get("domain")?,
            region: row.try_get("region")?,
            engine: row.try_get("engine")?,
        }))
    }

    async fn create_records(&self, zone: &DnsZone, records: &[DnsRecordRequest]) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(records.len());

        for record in records {
            let created: Option<ApiRecord> = self
                .send(self.http.post(self.records_url(zone)).json(&record_payload(record)))
                .await?;
            let id = created
                .map(|r| r.id)
                .ok_or_else(|| OrchestrationError::Dns(format!("no record id returned for {}", record.hostname)))?;

            tracing::debug!(zone = %zone.domain, hostname = %record.hostname, record_id = %id, "created DNS record");
            ids.push(id);
        }

        Ok(ids)
    }

    async fn delete_records(&self, zone: &DnsZone, hostnames: &[String]) -> Result<()> {
        for hostname in hostnames {
            let existing: Vec<ApiRecord> = self
                .send(self.http.get(self.records_url(zone)).query(&[("name", hostname.as_str())]))
                .await?
                .unwrap_or_default();

            for record in existing {
                let url = format!("{}/{}", self.records_url(zone), record.id);
                self.send::<serde_json::Value>(self.http.delete(url)).await?;
                tracing::debug!(zone = %zone.domain, %hostname, record_id = %record.id, "deleted DNS record");
            }
        }
        Ok(())
    }
}

fn record_payload(record: &DnsRecordRequest) -> serde_json::Value {
    json!({
        "type": record.record_type,
        "name": record.hostname,
        "content": record.target,
        "ttl": record.ttl,
        "proxied": false,
    })
}
