//! Tear down a database instance and forget it

use swarmdb_models::InstanceStatus;
use uuid::Uuid;

use super::{dns_publish, DeploymentOrchestrator};
use crate::error::Result;
use crate::types::DeleteInstanceOutput;

impl DeploymentOrchestrator {
    pub async fn delete_instance(&self, instance_id: Uuid) -> Result<DeleteInstanceOutput> {
        let Some(details) = self.deps.instances.find_with_full_details(instance_id).await? else {
            tracing::info!(%instance_id, "instance not found, nothing to delete");
            return Ok(DeleteInstanceOutput {
                instance_id,
                deleted: false,
                cleanup: None,
            });
        };
        let instance = &details.instance;
        tracing::info!(%instance_id, stack = %instance.stack_name, "deleting instance");

        self.deps
            .instances
            .update_status(instance_id, InstanceStatus::Deleting, Some("Deletion requested"))
            .await?;

        // Step 1: stacks and secrets
        let cleanup = match self.owning_cluster(&details).await? {
            Some(cluster) => {
                let report = self
                    .deps
                    .compensator
                    .cleanup_stack(&cluster, &instance.stack_name, instance.topology)
                    .await;
                if !report.is_clean() {
                    tracing::warn!(%instance_id, summary = %report, "cluster resources not fully removed");
                }
                Some(report)
            }
            None => {
                tracing::info!(%instance_id, "no cluster to clean up");
                None
            }
        };

        // Step 2: DNS
        match dns_publish::withdraw(&self.deps, instance).await {
            Ok(removed) => tracing::info!(%instance_id, removed, "DNS records withdrawn"),
            Err(e) => tracing::warn!(%instance_id, error = %e, "failed to withdraw DNS records"),
        }

        // Step 3: worker load
        if let Some(deployment) = &details.deployment {
            for worker_id in &deployment.worker_ids {
                if let Err(e) = self.deps.workers.decrement_instance_count(*worker_id).await {
                    tracing::warn!(%worker_id, error = %e, "failed to decrement worker load");
                }
            }
        }

        self.deps
            .instances
            .update_status(instance_id, InstanceStatus::Deleted, Some("Deleted"))
            .await?;
        self.deps.instances.delete(instance_id).await?;

        tracing::info!(%instance_id, "instance deleted");
        Ok(DeleteInstanceOutput {
            instance_id,
            deleted: true,
            cleanup,
        })
    }
}
