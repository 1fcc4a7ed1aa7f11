//! Worker and cluster selection, port allocation, hostnames and URIs

use std::sync::Arc;

use swarmdb_models::{Cluster, DatabaseInstance, TlsMode, Topology, Worker};

use crate::config::DnsConfig;
use crate::error::{OrchestrationError, Result};
use crate::names::{member_hostname, standalone_hostname};
use crate::ports::{PortAllocator, PortRequest};
use crate::store::{ClusterRepository, WorkerRepository};

pub const REPLICA_SET_MEMBERS: usize = 3;

/// Where an instance will run and how clients reach it
#[derive(Debug, Clone)]
pub struct Placement {
    pub cluster: Cluster,
    /// Ascending `worker_number`
    pub workers: Vec<Worker>,
    pub primary: Worker,
    pub port: u16,
    /// One per worker, in worker order
    pub hostnames: Vec<String>,
    pub uri: String,
}

impl Placement {
    /// `host:port` for every member, primary-designate first
    pub fn members(&self) -> Vec<String> {
        self.hostnames
            .iter()
            .map(|host| format!("{}:{}", host, self.port))
            .collect()
    }
}

pub struct InfrastructureSetup {
    workers: Arc<dyn WorkerRepository>,
    clusters: Arc<dyn ClusterRepository>,
    ports: Arc<PortAllocator>,
    dns: DnsConfig,
}

impl InfrastructureSetup {
    pub fn new(
        workers: Arc<dyn WorkerRepository>,
        clusters: Arc<dyn ClusterRepository>,
        ports: Arc<PortAllocator>,
        dns: DnsConfig,
    ) -> Self {
        Self {
            workers,
            clusters,
            ports,
            dns,
        }
    }

    pub async fn prepare(&self, instance: &DatabaseInstance) -> Result<Placement> {
        if instance.topology == Topology::ReplicaSet && instance.replica_set_name.is_none() {
            return Err(OrchestrationError::Validation(format!(
                "replica set name is required for instance {}",
                instance.id
            )));
        }

        let (cluster, workers) = self.select_workers(instance).await?;
        let primary = workers[0].clone();

        let port = self
            .ports
            .allocate(PortRequest {
                instance_id: instance.id,
                region: &instance.region,
                tls_mode: instance.tls_mode,
                cluster: &cluster,
                workers: &workers,
            })
            .await?;

        let domain = self.dns.domain_for_region(&instance.region);
        let hostnames: Vec<String> = match instance.topology {
            Topology::Standalone => vec![standalone_hostname(&instance.stack_name, &domain)],
            Topology::ReplicaSet => workers
                .iter()
                .map(|w| member_hostname(&instance.stack_name, w.worker_number, &domain))
                .collect(),
        };
        let uri = connection_uri(instance, &hostnames, port);

        tracing::info!(
            instance_id = %instance.id,
            cluster = %cluster.name,
            primary = %primary.hostname,
            workers = workers.len(),
            port,
            "infrastructure ready"
        );

        Ok(Placement {
            cluster,
            workers,
            primary,
            port,
            hostnames,
            uri,
        })
    }

    async fn select_workers(&self, instance: &DatabaseInstance) -> Result<(Cluster, Vec<Worker>)> {
        let mut workers = match instance.topology {
            Topology::Standalone => {
                let worker = self
                    .workers
                    .find_optimal(&instance.region, &instance.service_type)
                    .await?
                    .ok_or_else(|| {
                        OrchestrationError::Infrastructure(format!(
                            "no eligible worker in region {} for service type {}",
                            instance.region, instance.service_type
                        ))
                    })?;
                vec![worker]
            }
            Topology::ReplicaSet => {
                let eligible = self
                    .workers
                    .find_eligible(&instance.region, &instance.service_type)
                    .await?;
                pick_replica_members(eligible, &instance.region)?
            }
        };

        workers.sort_by_key(|w| w.worker_number);

        let cluster_id = workers[0].cluster_id;
        let cluster = self
            .clusters
            .find_by_id(cluster_id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("cluster {}", cluster_id)))?;

        Ok((cluster, workers))
    }
}

/// First `REPLICA_SET_MEMBERS` workers of the first cluster that has enough,
/// preserving priority order.
fn pick_replica_members(eligible: Vec<Worker>, region: &str) -> Result<Vec<Worker>> {
    if eligible.len() < REPLICA_SET_MEMBERS {
        return Err(OrchestrationError::Infrastructure(format!(
            "replica set needs {} eligible workers in region {}, found {}",
            REPLICA_SET_MEMBERS,
            region,
            eligible.len()
        )));
    }

    let mut clusters: Vec<uuid::Uuid> = Vec::new();
    for worker in &eligible {
        if !clusters.contains(&worker.cluster_id) {
            clusters.push(worker.cluster_id);
        }
    }

    for cluster_id in clusters {
        let members: Vec<Worker> = eligible
            .iter()
            .filter(|w| w.cluster_id == cluster_id)
            .take(REPLICA_SET_MEMBERS)
            .cloned()
            .collect();
        if members.len() == REPLICA_SET_MEMBERS {
            return Ok(members);
        }
    }

    Err(OrchestrationError::Infrastructure(format!(
        "no single cluster in region {} has {} eligible workers",
        region, REPLICA_SET_MEMBERS
    )))
}

pub fn connection_uri(instance: &DatabaseInstance, hostnames: &[String], port: u16) -> String {
    let hosts = hostnames
        .iter()
        .map(|host| format!("{}:{}", host, port))
        .collect::<Vec<_>>()
        .join(",");

    let mut params = Vec::new();
    if instance.topology == Topology::ReplicaSet {
        if let Some(name) = &instance.replica_set_name {
            params.push(format!("replicaSet={}", name));
        }
    }
    params.push("authSource=admin".to_string());
    if instance.tls_mode == TlsMode::Required {
        params.push("tls=true".to_string());
    }

    format!("mongodb://{}/?{}", hosts, params.join("&"))
}
