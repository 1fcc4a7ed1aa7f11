//! Deploy a database instance end to end, rolling back on failure

use std::path::Path;
use std::time::Instant;

use chrono::Utc;
use swarmdb_models::{
    Connection, Credentials, DatabaseInstance, Deployment, InstanceDetails, InstanceStatus, StackDefinition,
};
use tempfile::TempDir;
use uuid::Uuid;

use super::{dns_publish, DeploymentOrchestrator};
use crate::command::SwarmClient;
use crate::credentials;
use crate::error::{OrchestrationError, Result};
use crate::infrastructure::Placement;
use crate::names::{database_services, secret_name, secrets};
use crate::renderer::{MemberSpec, StackSpec};
use crate::store::DeploymentCommit;
use crate::types::DeployInstanceOutput;

impl DeploymentOrchestrator {
    /// Provision `instance_id`. On failure the instance is marked `failed`,
    /// compensation runs once, and the original error is returned.
    pub async fn deploy_instance(&self, instance_id: Uuid) -> Result<DeployInstanceOutput> {
        let details = self.load(instance_id).await?;
        tracing::info!(
            %instance_id,
            stack = %details.instance.stack_name,
            topology = %details.instance.topology,
            region = %details.instance.region,
            "deploying instance"
        );

        match self.deploy_instance_impl(&details).await {
            Ok(output) => {
                tracing::info!(
                    %instance_id,
                    uri = %output.uri,
                    seconds = output.deployment_time_seconds,
                    "instance deployed"
                );
                Ok(output)
            }
            Err(e) => {
                tracing::error!(%instance_id, error = %e, "failed to deploy instance");
                self.mark_instance_failed(instance_id, &e).await;

                tracing::info!(%instance_id, "cleaning up partial deployment");
                match self.deps.compensator.cleanup_instance(instance_id).await {
                    Some(report) if !report.is_clean() => {
                        tracing::warn!(%instance_id, summary = %report, "cleanup finished with failures")
                    }
                    Some(report) => tracing::info!(%instance_id, summary = %report, "cleanup complete"),
                    None => {}
                }
                self.withdraw_published_dns(&details.instance).await;

                Err(e)
            }
        }
    }

    /// Best effort; only touches the provider if this stack has records
    async fn withdraw_published_dns(&self, instance: &DatabaseInstance) {
        let instance_id = instance.id;
        match self.deps.dns_records.find_by_stack(&instance.stack_name).await {
            Ok(records) if records.is_empty() => {}
            Ok(_) => match dns_publish::withdraw(&self.deps, instance).await {
                Ok(removed) => tracing::info!(%instance_id, removed, "withdrew DNS records"),
                Err(e) => tracing::warn!(%instance_id, error = %e, "failed to withdraw DNS records"),
            },
            Err(e) => tracing::warn!(%instance_id, error = %e, "failed to look up DNS records"),
        }
    }

    async fn deploy_instance_impl(&self, details: &InstanceDetails) -> Result<DeployInstanceOutput> {
        let started = Instant::now();
        let started_at = Utc::now();
        let instance = &details.instance;

        self.deps
            .instances
            .update_status(instance.id, InstanceStatus::Provisioning, Some("selecting infrastructure"))
            .await?;

        // Step 1: workers, port, hostnames
        let placement = self.infrastructure.prepare(instance).await?;
        self.deps
            .instances
            .record_placement(instance.id, placement.cluster.id)
            .await?;

        let client = SwarmClient::new(self.deps.executor.as_ref(), &placement.cluster);

        // Step 2: TLS material and credentials as swarm secrets
        if instance.tls_mode.is_enabled() {
            self.create_tls_secrets(&client, instance).await?;
        }
        let credentials = credentials::generate(instance.topology);
        self.create_credential_secrets(&client, instance, &placement, &credentials)
            .await?;

        self.deps
            .instances
            .update_status(instance.id, InstanceStatus::Deploying, Some("deploying stacks"))
            .await?;

        // Step 3: database stack, then exporter stack
        let spec = self.stack_spec(details, &placement, &credentials);
        let work_dir = self.work_dir()?;
        let stacks = self.deploy_stacks(&client, &spec, work_dir.path()).await;
        if let Err(e) = work_dir.close() {
            tracing::warn!(error = %e, "failed to remove deploy work directory");
        }
        let stacks = stacks?;

        // Step 4: DNS
        dns_publish::publish(&self.deps, instance, &placement, self.config.dns.ttl).await?;

        // Step 5: replica set and role users
        self.initialize_database(instance, &placement, &credentials)
            .await?;

        // Step 6: persist and go live
        let deployment = Deployment {
            id: Uuid::new_v4(),
            instance_id: instance.id,
            cluster_id: placement.cluster.id,
            worker_ids: placement.workers.iter().map(|w| w.id).collect(),
            stacks,
            started_at,
            completed_at: Some(Utc::now()),
        };
        let connection = Connection {
            instance_id: instance.id,
            region: instance.region.clone(),
            port: placement.port,
            hostnames: placement.hostnames.clone(),
            uri: placement.uri.clone(),
            tls_mode: instance.tls_mode,
            credentials: Some(credentials),
        };
        self.deps
            .deployments
            .commit(&DeploymentCommit { deployment, connection })
            .await?;

        let elapsed = started.elapsed().as_secs();
        self.deps
            .instances
            .update_status(
                instance.id,
                InstanceStatus::Running,
                Some(&format!("Instance ready in {} seconds", elapsed)),
            )
            .await?;

        for worker in &placement.workers {
            if let Err(e) = self.deps.workers.increment_instance_count(worker.id).await {
                tracing::warn!(worker = %worker.hostname, error = %e, "failed to increment worker load");
            }
        }

        Ok(DeployInstanceOutput {
            instance_id: instance.id,
            stack_name: instance.stack_name.clone(),
            cluster_id: placement.cluster.id,
            port: placement.port,
            primary: placement.members().into_iter().next().unwrap_or_default(),
            hostnames: placement.hostnames,
            uri: placement.uri,
            deployment_time_seconds: elapsed,
        })
    }

    async fn create_tls_secrets(&self, client: &SwarmClient<'_>, instance: &DatabaseInstance) -> Result<()> {
        let bundle = self.deps.certificates.bundle_for_region(&instance.region).await?;
        let stack = instance.stack_name.as_str();

        client
            .create_secret(&secret_name(stack, secrets::TLS_CA), &bundle.ca_pem, secret_labels(instance))
            .await?;
        client
            .create_secret(&secret_name(stack, secrets::TLS_PEM), &bundle.server_pem, secret_labels(instance))
            .await?;
        Ok(())
    }

    async fn create_credential_secrets(
        &self,
        client: &SwarmClient<'_>,
        instance: &DatabaseInstance,
        placement: &Placement,
        credentials: &Credentials,
    ) -> Result<()> {
        let stack = instance.stack_name.as_str();
        let monitor_uri = credentials::monitor_uri(credentials, &placement.members(), instance.tls_mode.is_enabled());

        let mut entries: Vec<(&str, &str)> = vec![
            (secrets::ADMIN_PASSWORD, credentials.admin_password.as_str()),
            (secrets::MONITOR_PASSWORD, credentials.monitor_password.as_str()),
            (secrets::BACKUP_PASSWORD, credentials.backup_password.as_str()),
            (secrets::MONITOR_URI, monitor_uri.as_str()),
        ];
        if let Some(key) = &credentials.replica_key {
            entries.push((secrets::REPLICA_KEY, key.as_str()));
        }

        for (suffix, value) in entries {
            client
                .create_secret(&secret_name(stack, suffix), value, secret_labels(instance))
                .await?;
        }
        tracing::debug!(stack, "credential secrets created");
        Ok(())
    }

    fn stack_spec(&self, details: &InstanceDetails, placement: &Placement, credentials: &Credentials) -> StackSpec {
        let instance = &details.instance;
        let services = database_services(instance.topology, placement.workers.len());

        let members = services
            .into_iter()
            .zip(placement.workers.iter().zip(&placement.hostnames))
            .map(|(service, (worker, hostname))| MemberSpec {
                service,
                node_hostname: worker.hostname.clone(),
                advertised_host: hostname.clone(),
            })
            .collect();

        StackSpec {
            stack_name: instance.stack_name.clone(),
            topology: instance.topology,
            engine_version: instance.engine_version.clone(),
            cpu_limit: details.size.cpu_limit,
            memory_limit_mb: details.size.memory_limit_mb,
            storage_gb: details.size.storage_gb,
            port: placement.port,
            tls: instance.tls_mode.is_enabled(),
            replica_set_name: instance.replica_set_name.clone(),
            admin_username: credentials.admin_username.clone(),
            members,
            exporter_image: self.config.mongo.exporter_image.clone(),
        }
    }

    /// Run-scoped directory for rendered compose files
    fn work_dir(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("swarmdb-deploy-");
        let dir = match self.config.command.scratch_dir.as_deref() {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        };
        dir.map_err(|e| OrchestrationError::Infrastructure(format!("failed to create work directory: {}", e)))
    }

    async fn deploy_stacks(
        &self,
        client: &SwarmClient<'_>,
        spec: &StackSpec,
        work_dir: &Path,
    ) -> Result<Vec<StackDefinition>> {
        let database = self.deps.renderer.render_database(spec)?;
        self.deploy_stack(client, &database, work_dir).await?;

        let exporter = self.deps.renderer.render_exporter(spec)?;
        self.deploy_stack(client, &exporter, work_dir).await?;

        Ok(vec![database, exporter])
    }

    async fn deploy_stack(&self, client: &SwarmClient<'_>, stack: &StackDefinition, work_dir: &Path) -> Result<()> {
        let path = work_dir.join(&stack.file_name);
        tokio::fs::write(&path, &stack.content).await.map_err(|e| {
            OrchestrationError::Infrastructure(format!("failed to write {}: {}", path.display(), e))
        })?;

        client.deploy_stack(&stack.stack_name, &path).await?;
        tracing::info!(stack = %stack.stack_name, cluster = %client.cluster().name, "stack deployed");
        Ok(())
    }

    async fn mark_instance_failed(&self, instance_id: Uuid, error: &OrchestrationError) {
        let message = error.to_string();
        if let Err(e) = self
            .deps
            .instances
            .update_status(instance_id, InstanceStatus::Failed, Some(&message))
            .await
        {
            tracing::warn!(%instance_id, error = %e, "failed to mark instance as failed");
        }
    }
}

fn secret_labels(instance: &DatabaseInstance) -> Vec<(String, String)> {
    vec![
        ("io.swarmdb.instance".to_string(), instance.id.to_string()),
        ("io.swarmdb.stack".to_string(), instance.stack_name.clone()),
    ]
}
