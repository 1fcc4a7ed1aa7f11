//! Wires the production collaborators into the orchestrator

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::PgPool;
use swarmdb_models::Cluster;
use swarmdb_orchestrations::certificates::FileCertificateService;
use swarmdb_orchestrations::cleanup::CleanupService;
use swarmdb_orchestrations::command::{CommandExecutor, DockerCliExecutor};
use swarmdb_orchestrations::dns::CloudflareDns;
use swarmdb_orchestrations::mongo::MongoDriver;
use swarmdb_orchestrations::ports::SwarmPortProbe;
use swarmdb_orchestrations::renderer::TeraStackRenderer;
use swarmdb_orchestrations::store::{
    ClusterRepository, PgClusterRepository, PgConnectionRepository, PgDeploymentRepository, PgDnsRecordRepository,
    PgInstanceRepository, PgWorkerRepository,
};
use swarmdb_orchestrations::{DeploymentOrchestrator, OrchestratorDeps};
use uuid::Uuid;

use crate::config::Config;

pub struct Engine {
    pub orchestrator: DeploymentOrchestrator,
    pub cleanup: Arc<CleanupService>,
    clusters: Arc<dyn ClusterRepository>,
}

impl Engine {
    pub fn new(config: &Config, pool: PgPool) -> Result<Self> {
        let executor: Arc<dyn CommandExecutor> = Arc::new(DockerCliExecutor::new(config.orchestrator.command.clone()));
        let instances = Arc::new(PgInstanceRepository::new(pool.clone()));
        let clusters: Arc<dyn ClusterRepository> = Arc::new(PgClusterRepository::new(pool.clone()));

        let cleanup = Arc::new(CleanupService::new(
            executor.clone(),
            instances.clone(),
            clusters.clone(),
            config.orchestrator.cleanup.clone(),
        ));
        let dns = CloudflareDns::new(config.cloudflare.clone(), pool.clone()).context("Failed to create DNS client")?;
        let renderer = TeraStackRenderer::new().context("Failed to load stack templates")?;

        let deps = OrchestratorDeps {
            executor: executor.clone(),
            instances,
            connections: Arc::new(PgConnectionRepository::new(pool.clone())),
            deployments: Arc::new(PgDeploymentRepository::new(pool.clone())),
            workers: Arc::new(PgWorkerRepository::new(pool.clone())),
            clusters: clusters.clone(),
            dns: Arc::new(dns),
            dns_records: Arc::new(PgDnsRecordRepository::new(pool)),
            certificates: Arc::new(FileCertificateService::new(config.cert_dir.clone())),
            mongo: Arc::new(MongoDriver::new(config.orchestrator.mongo.clone())),
            renderer: Arc::new(renderer),
            port_probe: Arc::new(SwarmPortProbe::new(executor)),
            compensator: cleanup.clone(),
        };

        Ok(Self {
            orchestrator: DeploymentOrchestrator::new(deps, config.orchestrator.clone()),
            cleanup,
            clusters,
        })
    }

    pub async fn cluster(&self, cluster_id: Uuid) -> Result<Cluster> {
        self.clusters
            .find_by_id(cluster_id)
            .await?
            .with_context(|| format!("Cluster {} not found", cluster_id))
    }
}
