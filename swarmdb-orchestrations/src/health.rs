//! Convergence checks for deployed services

use std::sync::Arc;

use futures::future::join_all;
use swarmdb_models::Cluster;

use crate::command::{parse_replicas, CommandExecutor, Filter, SwarmClient, TaskSummary};
use crate::config::HealthConfig;
use crate::error::Result;
use crate::names::qualified_service_name;

/// Verdict of a single health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceHealth {
    Healthy { running_tasks: usize },
    /// The stack has no such service
    Missing { available: Vec<String> },
    NotConverged { current: u32, desired: u32 },
    /// Replica column could not be read (e.g. global mode)
    UnknownReplicas(String),
    NoRunningTasks,
}

impl ServiceHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ServiceHealth::Healthy { .. })
    }
}

pub struct HealthMonitor {
    executor: Arc<dyn CommandExecutor>,
    config: HealthConfig,
}

impl HealthMonitor {
    pub fn new(executor: Arc<dyn CommandExecutor>, config: HealthConfig) -> Self {
        Self { executor, config }
    }

    /// One check of `{stack}_{service}`
    pub async fn check_service(&self, cluster: &Cluster, stack: &str, service: &str) -> Result<ServiceHealth> {
        let client = SwarmClient::new(self.executor.as_ref(), cluster);
        let qualified = qualified_service_name(stack, service);

        let services = client.stack_services(stack).await?;
        let Some(summary) = services.iter().find(|s| s.name == qualified) else {
            return Ok(ServiceHealth::Missing {
                available: services.into_iter().map(|s| s.name).collect(),
            });
        };

        let Some((current, desired)) = parse_replicas(&summary.replicas) else {
            return Ok(ServiceHealth::UnknownReplicas(summary.replicas.clone()));
        };

        if current != desired {
            self.log_diagnostics(&client, stack, &qualified).await;
            return Ok(ServiceHealth::NotConverged { current, desired });
        }

        let running = client
            .service_tasks(&qualified, vec![Filter::new("desired-state", "running")])
            .await?
            .into_iter()
            .filter(TaskSummary::is_running)
            .count();

        if running == 0 {
            return Ok(ServiceHealth::NoRunningTasks);
        }
        Ok(ServiceHealth::Healthy { running_tasks: running })
    }

    /// Poll until healthy; `false` once the attempt budget is spent
    pub async fn wait_for_service(&self, cluster: &Cluster, stack: &str, service: &str) -> bool {
        let attempts = self.config.max_attempts();

        for attempt in 1..=attempts {
            match self.check_service(cluster, stack, service).await {
                Ok(ServiceHealth::Healthy { running_tasks }) => {
                    tracing::info!(stack, service, attempt, running_tasks, "service healthy");
                    return true;
                }
                Ok(ServiceHealth::Missing { available }) => {
                    tracing::info!(stack, service, attempt, ?available, "service not found in stack");
                }
                Ok(verdict) => {
                    tracing::info!(stack, service, attempt, attempts, ?verdict, "service not healthy yet");
                }
                Err(e) => {
                    tracing::warn!(stack, service, attempt, error = %e, "health check failed");
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.check_interval).await;
            }
        }

        tracing::warn!(stack, service, attempts, "service did not become healthy");
        false
    }

    /// All services must become healthy; waits run concurrently
    pub async fn wait_for_services(&self, cluster: &Cluster, stack: &str, services: &[String]) -> bool {
        let results = join_all(
            services
                .iter()
                .map(|service| self.wait_for_service(cluster, stack, service)),
        )
        .await;
        results.into_iter().all(|healthy| healthy)
    }

    /// Context for an unconverged service; never changes the verdict
    async fn log_diagnostics(&self, client: &SwarmClient<'_>, stack: &str, service: &str) {
        match client.service_tasks(service, vec![]).await {
            Ok(tasks) => {
                for task in &tasks {
                    tracing::info!(
                        service,
                        task = %task.name,
                        node = %task.node,
                        desired = %task.desired_state,
                        current = %task.current_state,
                        error = %task.error,
                        "task state"
                    );
                }

                for task in tasks.iter().filter(|t| t.is_failed()).take(3) {
                    match client.service_logs(&task.id, self.config.log_tail).await {
                        Ok(logs) => tracing::info!(service, task = %task.name, %logs, "failed task logs"),
                        Err(e) => tracing::debug!(service, task = %task.name, error = %e, "could not fetch task logs"),
                    }
                }
            }
            Err(e) => tracing::debug!(service, error = %e, "could not list tasks"),
        }

        match client.list_nodes().await {
            Ok(nodes) => {
                let unavailable = nodes.iter().filter(|n| {
                    !n.availability.eq_ignore_ascii_case("active") || !n.status.eq_ignore_ascii_case("ready")
                });
                for node in unavailable {
                    tracing::info!(
                        node = %node.hostname,
                        status = %node.status,
                        availability = %node.availability,
                        "node unavailable for scheduling"
                    );
                }
            }
            Err(e) => tracing::debug!(error = %e, "could not list nodes"),
        }

        match client
            .stack_tasks(stack, vec![Filter::new("desired-state", "running")])
            .await
        {
            Ok(siblings) => {
                let own_prefix = format!("{}.", service);
                for task in siblings.iter().filter(|t| !t.name.starts_with(&own_prefix)) {
                    tracing::info!(stack, task = %task.name, node = %task.node, "sibling placement");
                }
            }
            Err(e) => tracing::debug!(stack, error = %e, "could not list stack tasks"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cluster, FakeExecutor};
    use std::time::Duration;

    const SERVICES: &str = concat!(
        r#"{"ID":"s1","Name":"mdb_mongo","Mode":"replicated","Replicas":"1/1","Image":"mongo:7","Ports":"*:27000->27017/tcp"}"#,
        "\n"
    );
    const RUNNING: &str = concat!(
        r#"{"ID":"t1","Name":"mdb_mongo.1","Node":"worker-1","DesiredState":"Running","CurrentState":"Running 10 seconds ago","Error":"","Ports":""}"#,
        "\n"
    );
    const STARTING: &str = concat!(
        r#"{"ID":"t1","Name":"mdb_mongo.1","Node":"worker-1","DesiredState":"Running","CurrentState":"Starting 1 second ago","Error":"","Ports":""}"#,
        "\n"
    );

    fn monitor(executor: &Arc<FakeExecutor>, attempts: u64) -> HealthMonitor {
        HealthMonitor::new(
            executor.clone(),
            HealthConfig {
                timeout: Duration::from_millis(attempts),
                check_interval: Duration::from_millis(1),
                log_tail: 20,
            },
        )
    }

    #[tokio::test]
    async fn test_converged_with_running_task_is_healthy() {
        let executor = Arc::new(FakeExecutor::new());
        executor.respond("stack services mdb", SERVICES);
        executor.respond("service ps --no-trunc mdb_mongo", RUNNING);

        let verdict = monitor(&executor, 1).check_service(&cluster(), "mdb", "mongo").await.unwrap();
        assert_eq!(verdict, ServiceHealth::Healthy { running_tasks: 1 });
    }

    #[tokio::test]
    async fn test_converged_without_running_task_is_unhealthy() {
        let executor = Arc::new(FakeExecutor::new());
        executor.respond("stack services mdb", SERVICES);
        executor.respond("service ps --no-trunc mdb_mongo", STARTING);

        let verdict = monitor(&executor, 1).check_service(&cluster(), "mdb", "mongo").await.unwrap();
        assert_eq!(verdict, ServiceHealth::NoRunningTasks);
    }

    #[tokio::test]
    async fn test_missing_service_lists_available() {
        let executor = Arc::new(FakeExecutor::new());
        executor.respond("stack services mdb", SERVICES);

        let verdict = monitor(&executor, 1).check_service(&cluster(), "mdb", "exporter").await.unwrap();
        assert_eq!(
            verdict,
            ServiceHealth::Missing {
                available: vec!["mdb_mongo".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_replica_mismatch_gathers_diagnostics_but_stays_unhealthy() {
        let executor = Arc::new(FakeExecutor::new());
        executor.respond(
            "stack services mdb",
            r#"{"ID":"s1","Name":"mdb_mongo","Mode":"replicated","Replicas":"0/1","Image":"mongo:7","Ports":""}"#,
        );
        executor.respond(
            "service ps --no-trunc mdb_mongo",
            r#"{"ID":"t9","Name":"mdb_mongo.1","Node":"worker-1","DesiredState":"Running","CurrentState":"Rejected 3 seconds ago","Error":"no suitable node","Ports":""}"#,
        );

        let verdict = monitor(&executor, 1).check_service(&cluster(), "mdb", "mongo").await.unwrap();
        assert_eq!(verdict, ServiceHealth::NotConverged { current: 0, desired: 1 });

        let issued = executor.issued();
        assert!(issued.iter().any(|c| c.starts_with("service logs --no-trunc --timestamps --tail 20 t9")));
        assert!(issued.iter().any(|c| c.starts_with("node ls")));
        assert!(issued.iter().any(|c| c.starts_with("stack ps --no-trunc mdb")));
    }

    #[tokio::test]
    async fn test_diagnostic_failures_do_not_change_verdict() {
        let executor = Arc::new(FakeExecutor::new());
        executor.respond(
            "stack services mdb",
            r#"{"ID":"s1","Name":"mdb_mongo","Mode":"replicated","Replicas":"1/3","Image":"mongo:7","Ports":""}"#,
        );
        executor.fail_on("service ps", "daemon unavailable");
        executor.fail_on("node ls", "daemon unavailable");
        executor.fail_on("stack ps", "daemon unavailable");

        let verdict = monitor(&executor, 1).check_service(&cluster(), "mdb", "mongo").await.unwrap();
        assert_eq!(verdict, ServiceHealth::NotConverged { current: 1, desired: 3 });
    }

    #[tokio::test]
    async fn test_wait_returns_false_after_budget() {
        let executor = Arc::new(FakeExecutor::new());
        executor.respond("stack services mdb", "");

        assert!(!monitor(&executor, 3).wait_for_service(&cluster(), "mdb", "mongo").await);
        assert_eq!(executor.count("stack services mdb"), 3);
    }

    #[tokio::test]
    async fn test_wait_recovers_after_transient_error() {
        let executor = Arc::new(FakeExecutor::new());
        executor.fail_once("stack services mdb", "connection reset");
        executor.respond("stack services mdb", SERVICES);
        executor.respond("service ps --no-trunc mdb_mongo", RUNNING);

        assert!(monitor(&executor, 5).wait_for_service(&cluster(), "mdb", "mongo").await);
    }

    #[tokio::test]
    async fn test_all_services_must_be_healthy() {
        let executor = Arc::new(FakeExecutor::new());
        executor.respond("stack services mdb", SERVICES);
        executor.respond("service ps --no-trunc mdb_mongo", RUNNING);
        let services = vec!["mongo".to_string(), "exporter".to_string()];

        assert!(!monitor(&executor, 2).wait_for_services(&cluster(), "mdb", &services).await);
        assert!(
            monitor(&executor, 2)
                .wait_for_services(&cluster(), "mdb", &services[..1])
                .await
        );
    }
}
