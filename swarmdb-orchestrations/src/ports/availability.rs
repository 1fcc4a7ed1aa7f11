//! Live port usage on workers, with a short-lived cache

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use swarmdb_models::{Cluster, Worker};
use uuid::Uuid;

use crate::command::{parse_published_ports, CommandExecutor, Filter, SwarmClient};
use crate::error::Result;

/// Reports the host ports currently bound on a worker
#[async_trait]
pub trait PortUsageProbe: Send + Sync {
    async fn bound_ports(&self, cluster: &Cluster, worker: &Worker) -> Result<HashSet<u16>>;
}

/// Derives bound ports from the tasks running on a node and the ports their
/// services publish.
pub struct SwarmPortProbe {
    executor: Arc<dyn CommandExecutor>,
}

impl SwarmPortProbe {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }
}

#[async_trait]
impl PortUsageProbe for SwarmPortProbe {
    async fn bound_ports(&self, cluster: &Cluster, worker: &Worker) -> Result<HashSet<u16>> {
        let client = SwarmClient::new(self.executor.as_ref(), cluster);

        let tasks = client
            .node_tasks(&worker.hostname, vec![Filter::new("desired-state", "running")])
            .await?;

        let mut bound: HashSet<u16> = HashSet::new();
        let mut services: HashSet<&str> = HashSet::new();
        for task in &tasks {
            // Host-mode publications show up on the task itself
            bound.extend(parse_published_ports(&task.ports));
            services.insert(task_service_name(&task.name));
        }

        if !services.is_empty() {
            for service in client.list_services().await? {
                if services.contains(service.name.as_str()) {
                    bound.extend(parse_published_ports(&service.ports));
                }
            }
        }

        tracing::debug!(
            worker = %worker.hostname,
            tasks = tasks.len(),
            ports = bound.len(),
            "probed worker port usage"
        );
        Ok(bound)
    }
}

/// `mdb_mongo1.1` belongs to service `mdb_mongo1`
fn task_service_name(task_name: &str) -> &str {
    match task_name.rsplit_once('.') {
        Some((service, slot)) if slot.chars().all(|c| c.is_ascii_alphanumeric()) => service,
        _ => task_name,
    }
}

struct CachedPorts {
    ports: HashSet<u16>,
    fetched_at: Instant,
}

/// Answers "is this port free on every target worker" from cached probes
pub struct PortAvailabilityChecker {
    probe: Arc<dyn PortUsageProbe>,
    cache: DashMap<(Uuid, Uuid), CachedPorts>,
    ttl: Duration,
}

impl PortAvailabilityChecker {
    pub fn new(probe: Arc<dyn PortUsageProbe>, ttl: Duration) -> Self {
        Self {
            probe,
            cache: DashMap::new(),
            ttl,
        }
    }

    async fn bound_ports(&self, cluster: &Cluster, worker: &Worker) -> Result<HashSet<u16>> {
        let key = (cluster.id, worker.id);
        let cached = self
            .cache
            .get(&key)
            .filter(|entry| entry.fetched_at.elapsed() < self.ttl)
            .map(|entry| entry.ports.clone());
        if let Some(ports) = cached {
            return Ok(ports);
        }

        let ports = self.probe.bound_ports(cluster, worker).await?;
        self.cache.insert(
            key,
            CachedPorts {
                ports: ports.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(ports)
    }

    /// Candidates free on all `workers`, in candidate order
    pub async fn available(&self, cluster: &Cluster, workers: &[Worker], candidates: &[u16]) -> Result<Vec<u16>> {
        let mut busy = HashSet::new();
        for worker in workers {
            busy.extend(self.bound_ports(cluster, worker).await?);
        }

        Ok(candidates.iter().copied().filter(|port| !busy.contains(port)).collect())
    }

    /// Record a fresh reservation so the next request within the TTL skips it
    pub fn mark_reserved(&self, cluster: &Cluster, workers: &[Worker], port: u16) {
        for worker in workers {
            if let Some(mut entry) = self.cache.get_mut(&(cluster.id, worker.id)) {
                entry.ports.insert(port);
            }
        }
    }
}
