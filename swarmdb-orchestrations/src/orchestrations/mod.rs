//! Deployment orchestrator: deploy, delete and verify database instances
//!
//! Each operation runs its steps sequentially against the collaborators in
//! [`OrchestratorDeps`]. A failed deploy marks the instance `failed`, hands
//! the instance to the [`Compensator`] exactly once and returns the original
//! error.

use std::sync::Arc;

use swarmdb_models::{Cluster, InstanceDetails};
use uuid::Uuid;

use crate::certificates::CertificateService;
use crate::cleanup::Compensator;
use crate::command::CommandExecutor;
use crate::config::OrchestratorConfig;
use crate::dns::DnsService;
use crate::error::{OrchestrationError, Result};
use crate::health::HealthMonitor;
use crate::infrastructure::InfrastructureSetup;
use crate::mongo::MongoAdmin;
use crate::ports::{PortAllocator, PortUsageProbe};
use crate::renderer::StackRenderer;
use crate::replica_set::ReplicaSetInitializer;
use crate::store::{
    ClusterRepository, ConnectionRepository, DeploymentRepository, DnsRecordRepository, InstanceRepository,
    WorkerRepository,
};

mod create_instance;
mod delete_instance;
mod dns_publish;
mod initialization;
mod verify_instance;

/// Collaborators assembled once at startup
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub executor: Arc<dyn CommandExecutor>,
    pub instances: Arc<dyn InstanceRepository>,
    pub connections: Arc<dyn ConnectionRepository>,
    pub deployments: Arc<dyn DeploymentRepository>,
    pub workers: Arc<dyn WorkerRepository>,
    pub clusters: Arc<dyn ClusterRepository>,
    pub dns: Arc<dyn DnsService>,
    pub dns_records: Arc<dyn DnsRecordRepository>,
    pub certificates: Arc<dyn CertificateService>,
    pub mongo: Arc<dyn MongoAdmin>,
    pub renderer: Arc<dyn StackRenderer>,
    pub port_probe: Arc<dyn PortUsageProbe>,
    pub compensator: Arc<dyn Compensator>,
}

pub struct DeploymentOrchestrator {
    deps: OrchestratorDeps,
    config: OrchestratorConfig,
    infrastructure: InfrastructureSetup,
    replica_sets: ReplicaSetInitializer,
    health: HealthMonitor,
}

impl DeploymentOrchestrator {
    pub fn new(deps: OrchestratorDeps, config: OrchestratorConfig) -> Self {
        let ports = Arc::new(PortAllocator::new(
            deps.connections.clone(),
            deps.port_probe.clone(),
            config.ports.clone(),
        ));
        let infrastructure = InfrastructureSetup::new(
            deps.workers.clone(),
            deps.clusters.clone(),
            ports,
            config.dns.clone(),
        );
        let replica_sets = ReplicaSetInitializer::new(deps.mongo.clone(), config.replica_set.clone());
        let health = HealthMonitor::new(deps.executor.clone(), config.health.clone());

        Self {
            deps,
            config,
            infrastructure,
            replica_sets,
            health,
        }
    }

    pub fn health(&self) -> &HealthMonitor {
        &self.health
    }

    async fn load(&self, instance_id: Uuid) -> Result<InstanceDetails> {
        self.deps
            .instances
            .find_with_full_details(instance_id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("instance {}", instance_id)))
    }

    /// Cluster owning the instance: its deployment's, else the recorded placement
    async fn owning_cluster(&self, details: &InstanceDetails) -> Result<Option<Cluster>> {
        let Some(cluster_id) = details.owning_cluster_id() else {
            return Ok(None);
        };
        self.deps
            .clusters
            .find_by_id(cluster_id)
            .await?
            .map(Some)
            .ok_or_else(|| OrchestrationError::NotFound(format!("cluster {}", cluster_id)))
    }
}
