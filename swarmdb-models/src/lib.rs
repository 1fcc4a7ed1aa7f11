use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a database instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "instance_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Requested,
    Provisioning,
    Deploying,
    Running,
    Failed,
    Deleting,
    Deleted,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Requested => "requested",
            InstanceStatus::Provisioning => "provisioning",
            InstanceStatus::Deploying => "deploying",
            InstanceStatus::Running => "running",
            InstanceStatus::Failed => "failed",
            InstanceStatus::Deleting => "deleting",
            InstanceStatus::Deleted => "deleted",
        }
    }

    /// Whether an instance in this state still owns its port reservation
    pub fn holds_reservation(&self) -> bool {
        !matches!(self, InstanceStatus::Failed | InstanceStatus::Deleted)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deployment topology of a database instance
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "topology", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    Standalone,
    ReplicaSet,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Standalone => "standalone",
            Topology::ReplicaSet => "replica_set",
        }
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database engine
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "database_engine", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    Mongodb,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Mongodb => "mongodb",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "tls_mode", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TlsMode {
    Disabled,
    Required,
}

impl TlsMode {
    pub fn is_enabled(&self) -> bool {
        matches!(self, TlsMode::Required)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "cluster_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    Shared,
    Private,
    CustomerManaged,
}

/// Health status reported by periodic cluster checks
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "health_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(type_name = "dns_record_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DnsRecordStatus {
    Active,
    Failed,
}

/// A swarm manager: the remote control endpoint stacks are deployed through
#[derive(Clone, Serialize, Deserialize)]
pub struct Cluster {
    pub id: Uuid,
    pub name: String,
    pub region: String,
    pub service_type: String,
    pub cluster_type: ClusterType,
    pub health_status: HealthStatus,
    pub active: bool,
    /// Manager TLS endpoint (`host:port`)
    pub endpoint: String,
    pub tls_ca_pem: String,
    pub tls_cert_pem: String,
    pub tls_key_pem: String,
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("region", &self.region)
            .field("service_type", &self.service_type)
            .field("cluster_type", &self.cluster_type)
            .field("health_status", &self.health_status)
            .field("active", &self.active)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// A placement target node within a cluster
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Worker {
    pub id: Uuid,
    pub cluster_id: Uuid,
    /// Swarm node hostname, used in placement constraints
    pub hostname: String,
    /// Address DNS records point at (IP or hostname)
    pub public_address: String,
    pub worker_number: i32,
    pub current_instance_count: i32,
    pub region: String,
    pub service_type: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceSize {
    pub id: Uuid,
    pub name: String,
    pub cpu_limit: f64,
    pub memory_limit_mb: i32,
    pub storage_gb: i32,
}

/// Tenant-owned logical database
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseInstance {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub engine: Engine,
    pub engine_version: String,
    pub topology: Topology,
    pub size_id: Uuid,
    pub region: String,
    pub service_type: String,
    pub tls_mode: TlsMode,
    /// Globally unique; container-stack identity and DNS/secret naming root
    pub stack_name: String,
    pub replica_set_name: Option<String>,
    /// Cluster chosen at placement time, before a deployment exists
    pub cluster_id: Option<Uuid>,
    pub status: InstanceStatus,
    pub status_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A rendered stack definition as deployed
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackDefinition {
    pub stack_name: String,
    pub file_name: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deployment {
    pub id: Uuid,
    pub instance_id: Uuid,
    pub cluster_id: Uuid,
    pub worker_ids: Vec<Uuid>,
    pub stacks: Vec<StackDefinition>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Role credentials for a database instance
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub admin_username: String,
    pub admin_password: String,
    pub monitor_username: String,
    pub monitor_password: String,
    pub backup_username: String,
    pub backup_password: String,
    /// Shared keyfile content for replica-set internal auth
    pub replica_key: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("admin_username", &self.admin_username)
            .field("monitor_username", &self.monitor_username)
            .field("backup_username", &self.backup_username)
            .field("replica_key", &self.replica_key.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Connection {
    pub instance_id: Uuid,
    pub region: String,
    pub port: u16,
    pub hostnames: Vec<String>,
    pub uri: String,
    pub tls_mode: TlsMode,
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnsZone {
    /// Provider-side zone identifier
    pub zone_id: String,
    pub domain: String,
    pub region: String,
    pub engine: Engine,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DnsRecord {
    pub id: Uuid,
    pub zone_id: String,
    pub stack_name: String,
    pub hostname: String,
    pub record_type: String,
    pub target: String,
    pub status: DnsRecordStatus,
    pub provider_record_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Everything the orchestrator loads about an instance before acting on it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceDetails {
    pub instance: DatabaseInstance,
    pub size: InstanceSize,
    pub deployment: Option<Deployment>,
    pub connection: Option<Connection>,
}

impl InstanceDetails {
    /// Cluster that owns the instance's resources, if one was ever chosen
    pub fn owning_cluster_id(&self) -> Option<Uuid> {
        self.deployment
            .as_ref()
            .map(|d| d.cluster_id)
            .or(self.instance.cluster_id)
    }
}
