//! Idempotent teardown of an instance's stacks and secrets

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swarmdb_models::{Cluster, Topology};
use uuid::Uuid;

use crate::command::{CommandExecutor, Removal, SwarmClient};
use crate::config::CleanupConfig;
use crate::error::{OrchestrationError, Result};
use crate::names::{exporter_stack_name, secret_name, secrets, topology_secret_suffixes};
use crate::store::{ClusterRepository, InstanceRepository};

/// Outcome of one removal; failures are reported, never raised
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepOutcome {
    Removed,
    Absent,
    Failed(String),
}

impl From<Result<Removal>> for StepOutcome {
    fn from(result: Result<Removal>) -> Self {
        match result {
            Ok(Removal::Removed) => StepOutcome::Removed,
            Ok(Removal::Absent) => StepOutcome::Absent,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Stack,
    Secret,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupStep {
    pub kind: ResourceKind,
    pub name: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanupReport {
    pub cluster_id: Uuid,
    pub stack_name: String,
    pub steps: Vec<CleanupStep>,
}

impl CleanupReport {
    pub fn failures(&self) -> impl Iterator<Item = &CleanupStep> {
        self.steps
            .iter()
            .filter(|s| matches!(s.outcome, StepOutcome::Failed(_)))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn removed(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Removed)
            .count()
    }
}

impl fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} removed, {} absent, {} failed",
            self.stack_name,
            self.removed(),
            self.steps.iter().filter(|s| s.outcome == StepOutcome::Absent).count(),
            self.failures().count()
        )
    }
}

/// Rollback hook the orchestrator calls when a run fails
#[async_trait]
pub trait Compensator: Send + Sync {
    /// Remove everything created for `stack_name` on `cluster`
    async fn cleanup_stack(&self, cluster: &Cluster, stack_name: &str, topology: Topology) -> CleanupReport;

    /// Resolve the instance's cluster and clean it up; `None` when there is
    /// nothing to clean
    async fn cleanup_instance(&self, instance_id: Uuid) -> Option<CleanupReport>;
}

pub struct CleanupService {
    executor: Arc<dyn CommandExecutor>,
    instances: Arc<dyn InstanceRepository>,
    clusters: Arc<dyn ClusterRepository>,
    config: CleanupConfig,
}

impl CleanupService {
    pub fn new(
        executor: Arc<dyn CommandExecutor>,
        instances: Arc<dyn InstanceRepository>,
        clusters: Arc<dyn ClusterRepository>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            executor,
            instances,
            clusters,
            config,
        }
    }

    async fn remove_secret(&self, client: &SwarmClient<'_>, name: &str) -> StepOutcome {
        let attempts = self.config.secret_attempts.max(1);
        let mut attempt = 1;
        loop {
            match client.remove_secret(name).await {
                // Services from a just-removed stack may still hold the secret
                Err(OrchestrationError::Execution { message, .. })
                    if message.contains("in use") && attempt < attempts =>
                {
                    tracing::debug!(secret = %name, attempt, "secret still in use, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.config.secret_retry_delay).await;
                }
                result => return result.into(),
            }
        }
    }

    async fn resolve_cluster(&self, instance_id: Uuid) -> Result<Option<(Cluster, String, Topology)>> {
        let Some(details) = self.instances.find_with_full_details(instance_id).await? else {
            return Err(OrchestrationError::NotFound(format!("instance {}", instance_id)));
        };

        let Some(cluster_id) = details.owning_cluster_id() else {
            return Ok(None);
        };

        let cluster = self
            .clusters
            .find_by_id(cluster_id)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("cluster {}", cluster_id)))?;

        Ok(Some((cluster, details.instance.stack_name, details.instance.topology)))
    }
}

#[async_trait]
impl Compensator for CleanupService {
    async fn cleanup_stack(&self, cluster: &Cluster, stack_name: &str, topology: Topology) -> CleanupReport {
        let client = SwarmClient::new(self.executor.as_ref(), cluster);
        let mut steps = Vec::new();

        for stack in [stack_name.to_string(), exporter_stack_name(stack_name)] {
            let outcome = StepOutcome::from(client.remove_stack(&stack).await);
            steps.push(CleanupStep {
                kind: ResourceKind::Stack,
                name: stack,
                outcome,
            });
        }

        let suffixes = topology_secret_suffixes(topology)
            .iter()
            .chain(secrets::COMMON.iter());
        for suffix in suffixes {
            let name = secret_name(stack_name, suffix);
            let outcome = self.remove_secret(&client, &name).await;
            steps.push(CleanupStep {
                kind: ResourceKind::Secret,
                name,
                outcome,
            });
        }

        let report = CleanupReport {
            cluster_id: cluster.id,
            stack_name: stack_name.to_string(),
            steps,
        };

        for step in report.failures() {
            if let StepOutcome::Failed(reason) = &step.outcome {
                tracing::warn!(
                    cluster = %cluster.name,
                    kind = ?step.kind,
                    name = %step.name,
                    %reason,
                    "cleanup step failed"
                );
            }
        }
        tracing::info!(cluster = %cluster.name, summary = %report, "cleanup finished");
        report
    }

    async fn cleanup_instance(&self, instance_id: Uuid) -> Option<CleanupReport> {
        match self.resolve_cluster(instance_id).await {
            Ok(Some((cluster, stack_name, topology))) => {
                Some(self.cleanup_stack(&cluster, &stack_name, topology).await)
            }
            Ok(None) => {
                tracing::info!(%instance_id, "no cluster to clean up");
                None
            }
            Err(e) => {
                tracing::warn!(%instance_id, error = %e, "could not resolve instance for cleanup");
                None
            }
        }
    }
}
