//! Data-access interfaces the engine depends on, plus their PostgreSQL
//! implementations

use std::collections::HashSet;

use async_trait::async_trait;
use swarmdb_models::{
    Cluster, Connection, Deployment, DnsRecord, InstanceDetails, InstanceStatus, TlsMode, Worker,
};
use uuid::Uuid;

use crate::error::Result;

mod clusters;
mod connections;
mod db;
mod deployments;
mod dns_records;
mod instances;
mod workers;

pub use clusters::PgClusterRepository;
pub use connections::PgConnectionRepository;
pub use db::connect;
pub use deployments::PgDeploymentRepository;
pub use dns_records::PgDnsRecordRepository;
pub use instances::PgInstanceRepository;
pub use workers::PgWorkerRepository;

#[async_trait]
pub trait InstanceRepository: Send + Sync {
    /// Instance with its size, deployment and connection
    async fn find_with_full_details(&self, instance_id: Uuid) -> Result<Option<InstanceDetails>>;

    async fn update_status(&self, instance_id: Uuid, status: InstanceStatus, message: Option<&str>) -> Result<()>;

    /// Remember the cluster chosen for an instance before a deployment exists
    async fn record_placement(&self, instance_id: Uuid, cluster_id: Uuid) -> Result<()>;

    async fn delete(&self, instance_id: Uuid) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortReservationRequest {
    pub instance_id: Uuid,
    pub region: String,
    pub port: u16,
    pub tls_mode: TlsMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortReservation {
    Reserved,
    /// Another active instance already holds `(region, port)`
    Conflict,
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn get_highest_used_port(&self, region: &str) -> Result<Option<u16>>;

    async fn get_used_ports(&self, region: &str) -> Result<HashSet<u16>>;

    /// Upsert the instance's connection row with this port
    async fn reserve_port(&self, request: &PortReservationRequest) -> Result<PortReservation>;
}

/// Everything persisted at the end of a successful provisioning run
#[derive(Debug, Clone, PartialEq)]
pub struct DeploymentCommit {
    pub deployment: Deployment,
    pub connection: Connection,
}

#[async_trait]
pub trait DeploymentRepository: Send + Sync {
    /// Upsert connection, deployment and worker assignment in one transaction
    async fn commit(&self, commit: &DeploymentCommit) -> Result<()>;
}

#[async_trait]
pub trait WorkerRepository: Send + Sync {
    /// Least-loaded eligible worker
    async fn find_optimal(&self, region: &str, service_type: &str) -> Result<Option<Worker>>;

    /// All eligible workers, highest priority first
    async fn find_eligible(&self, region: &str, service_type: &str) -> Result<Vec<Worker>>;

    async fn increment_instance_count(&self, worker_id: Uuid) -> Result<()>;

    async fn decrement_instance_count(&self, worker_id: Uuid) -> Result<()>;
}

#[async_trait]
pub trait ClusterRepository: Send + Sync {
    async fn find_by_id(&self, cluster_id: Uuid) -> Result<Option<Cluster>>;
}

#[async_trait]
pub trait DnsRecordRepository: Send + Sync {
    async fn find_by_stack(&self, stack_name: &str) -> Result<Vec<DnsRecord>>;

    async fn save(&self, records: &[DnsRecord]) -> Result<()>;

    async fn delete_by_stack(&self, stack_name: &str) -> Result<u64>;
}
