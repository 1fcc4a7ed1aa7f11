//! Post-deploy verification of a running instance

use swarmdb_models::Topology;
use uuid::Uuid;

use super::DeploymentOrchestrator;
use crate::error::{OrchestrationError, Result};
use crate::names::{database_services, exporter_stack_name, EXPORTER_SERVICE};
use crate::replica_set::ReplicaSetRequest;
use crate::types::VerifyReport;

impl DeploymentOrchestrator {
    /// Wait for every service of the instance, then validate the replica set
    pub async fn verify_instance(&self, instance_id: Uuid) -> Result<VerifyReport> {
        let details = self.load(instance_id).await?;
        let instance = &details.instance;
        let (Some(deployment), Some(connection)) = (&details.deployment, &details.connection) else {
            return Err(OrchestrationError::Validation(format!(
                "instance {} has no deployment to verify",
                instance_id
            )));
        };
        let cluster = self
            .owning_cluster(&details)
            .await?
            .ok_or_else(|| OrchestrationError::NotFound(format!("cluster for instance {}", instance_id)))?;

        let stack = instance.stack_name.as_str();
        let services = database_services(instance.topology, deployment.worker_ids.len());
        let exporter_stack = exporter_stack_name(stack);

        let (database_healthy, exporter_healthy) = futures::join!(
            self.health.wait_for_services(&cluster, stack, &services),
            self.health.wait_for_service(&cluster, &exporter_stack, EXPORTER_SERVICE),
        );

        let (mut replica_set, mut replica_set_error) = (None, None);
        if instance.topology == Topology::ReplicaSet {
            let members = connection
                .hostnames
                .iter()
                .map(|host| format!("{}:{}", host, connection.port))
                .collect();
            let (admin_username, admin_password) = connection
                .credentials
                .as_ref()
                .map(|c| (c.admin_username.clone(), c.admin_password.clone()))
                .unwrap_or_default();
            let request = ReplicaSetRequest {
                name: instance.replica_set_name.clone(),
                members,
                admin_username,
                admin_password,
                tls: connection.tls_mode.is_enabled(),
            };

            match self.replica_sets.validate(&request).await {
                Ok(status) => replica_set = Some(status),
                Err(e) => {
                    tracing::warn!(%instance_id, error = %e, "replica set validation failed");
                    replica_set_error = Some(e.to_string());
                }
            }
        }

        let report = VerifyReport {
            instance_id,
            stack_name: instance.stack_name.clone(),
            database_healthy,
            exporter_healthy,
            replica_set,
            replica_set_error,
        };
        if report.is_healthy() {
            tracing::info!(%instance_id, stack, "instance verified");
        } else {
            tracing::warn!(
                %instance_id,
                stack,
                database_healthy,
                exporter_healthy,
                "instance failed verification"
            );
        }
        Ok(report)
    }
}
