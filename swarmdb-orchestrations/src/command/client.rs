//! Typed facade over the command layer for one cluster

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use swarmdb_models::Cluster;

use super::builder::{Filter, SwarmCommand};
use super::executor::CommandExecutor;
use super::output::CommandOutput;
use crate::error::{OrchestrationError, Result};

/// Result of an idempotent removal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    Absent,
}

/// One line of `service ls` / `stack services`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceSummary {
    #[serde(rename = "ID", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mode: String,
    /// `current/desired`, possibly followed by a qualifier
    #[serde(default)]
    pub replicas: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub ports: String,
}

/// One line of `service ps` / `node ps` / `stack ps`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TaskSummary {
    #[serde(rename = "ID", default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub node: String,
    #[serde(default)]
    pub desired_state: String,
    /// e.g. `Running 5 minutes ago`
    #[serde(default)]
    pub current_state: String,
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub ports: String,
}

impl TaskSummary {
    pub fn is_running(&self) -> bool {
        self.desired_state.eq_ignore_ascii_case("running") && self.current_state.starts_with("Running")
    }

    pub fn is_failed(&self) -> bool {
        self.current_state.starts_with("Failed")
            || self.current_state.starts_with("Rejected")
            || !self.error.is_empty()
    }
}

/// One line of `node ls`
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct NodeSummary {
    #[serde(rename = "ID", default)]
    pub id: String,
    pub hostname: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub availability: String,
    #[serde(default)]
    pub manager_status: String,
}

pub struct SwarmClient<'a> {
    executor: &'a dyn CommandExecutor,
    cluster: &'a Cluster,
}

impl<'a> SwarmClient<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, cluster: &'a Cluster) -> Self {
        Self { executor, cluster }
    }

    pub fn cluster(&self) -> &Cluster {
        self.cluster
    }

    pub async fn run(&self, command: SwarmCommand) -> Result<CommandOutput> {
        self.executor.execute(self.cluster, &command.build()).await
    }

    async fn list<T: DeserializeOwned>(&self, command: SwarmCommand) -> Result<Vec<T>> {
        let built = command.build();
        let values = self.executor.execute(self.cluster, &built).await?.into_array();
        values
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|e| OrchestrationError::output_parse(&built, e))
            })
            .collect()
    }

    pub async fn deploy_stack(&self, stack: &str, compose_file: &Path) -> Result<()> {
        self.run(SwarmCommand::StackDeploy {
            stack: stack.to_string(),
            compose_file: compose_file.to_path_buf(),
            prune: true,
        })
        .await?;
        Ok(())
    }

    pub async fn remove_stack(&self, stack: &str) -> Result<Removal> {
        match self.run(SwarmCommand::StackRemove { stack: stack.to_string() }).await {
            Ok(output) => {
                // Older engines exit 0 and only print a notice
                if output.into_text().contains("Nothing found in stack") {
                    Ok(Removal::Absent)
                } else {
                    Ok(Removal::Removed)
                }
            }
            Err(e) if e.is_not_found() => Ok(Removal::Absent),
            Err(e) => Err(e),
        }
    }

    pub async fn stack_services(&self, stack: &str) -> Result<Vec<ServiceSummary>> {
        self.list(SwarmCommand::StackServices { stack: stack.to_string() }).await
    }

    pub async fn stack_tasks(&self, stack: &str, filters: Vec<Filter>) -> Result<Vec<TaskSummary>> {
        self.list(SwarmCommand::StackPs { stack: stack.to_string(), filters }).await
    }

    pub async fn list_services(&self) -> Result<Vec<ServiceSummary>> {
        self.list(SwarmCommand::ServiceList { filters: vec![] }).await
    }

    pub async fn inspect_service(&self, service: &str) -> Result<Value> {
        Ok(self
            .run(SwarmCommand::ServiceInspect { service: service.to_string() })
            .await?
            .into_object())
    }

    pub async fn service_tasks(&self, service: &str, filters: Vec<Filter>) -> Result<Vec<TaskSummary>> {
        self.list(SwarmCommand::ServicePs { service: service.to_string(), filters }).await
    }

    pub async fn service_logs(&self, target: &str, tail: u32) -> Result<String> {
        Ok(self
            .run(SwarmCommand::ServiceLogs { target: target.to_string(), tail })
            .await?
            .into_text())
    }

    pub async fn list_nodes(&self) -> Result<Vec<NodeSummary>> {
        self.list(SwarmCommand::NodeList).await
    }

    pub async fn node_tasks(&self, node: &str, filters: Vec<Filter>) -> Result<Vec<TaskSummary>> {
        self.list(SwarmCommand::NodePs { node: node.to_string(), filters }).await
    }

    /// Creates a secret, replacing a stale one left by an earlier run
    pub async fn create_secret(&self, name: &str, data: &str, labels: Vec<(String, String)>) -> Result<()> {
        let command = SwarmCommand::SecretCreate {
            name: name.to_string(),
            data: data.to_string(),
            labels,
        };

        match self.run(command.clone()).await {
            Ok(_) => Ok(()),
            Err(OrchestrationError::Execution { message, .. }) if message.contains("already exists") => {
                tracing::info!(secret = %name, "replacing existing secret");
                self.remove_secret(name).await?;
                self.run(command).await.map(|_| ())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn remove_secret(&self, name: &str) -> Result<Removal> {
        match self.run(SwarmCommand::SecretRemove { name: name.to_string() }).await {
            Ok(_) => Ok(Removal::Removed),
            Err(e) if e.is_not_found() => Ok(Removal::Absent),
            Err(e) => Err(e),
        }
    }
}

/// Parse a `current/desired` replica string such as `2/3 (max 1 per node)`
pub fn parse_replicas(replicas: &str) -> Option<(u32, u32)> {
    let head = replicas.split_whitespace().next()?;
    let (current, desired) = head.split_once('/')?;
    Some((current.parse().ok()?, desired.parse().ok()?))
}

/// Published ports out of a `service ls` Ports column, e.g. `*:27017->27017/tcp`
pub fn parse_published_ports(ports: &str) -> Vec<u16> {
    ports
        .split(',')
        .filter_map(|entry| {
            let (published, _) = entry.trim().split_once("->")?;
            let port = published.rsplit(':').next()?;
            // Ranges look like `*:27000-27002`
            match port.split_once('-') {
                Some((start, end)) => {
                    let (start, end) = (start.parse::<u16>().ok()?, end.parse::<u16>().ok()?);
                    Some((start..=end).collect::<Vec<_>>())
                }
                None => port.parse::<u16>().ok().map(|p| vec![p]),
            }
        })
        .flatten()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{cluster, FakeExecutor};

    #[test]
    fn test_parse_replicas() {
        assert_eq!(parse_replicas("1/1"), Some((1, 1)));
        assert_eq!(parse_replicas("0/3 (max 1 per node)"), Some((0, 3)));
        assert_eq!(parse_replicas("global"), None);
        assert_eq!(parse_replicas(""), None);
    }

    #[test]
    fn test_parse_published_ports() {
        assert_eq!(parse_published_ports("*:27017->27017/tcp"), vec![27017]);
        assert_eq!(
            parse_published_ports("*:27001->27017/tcp, *:9216->9216/tcp"),
            vec![27001, 9216]
        );
        assert_eq!(parse_published_ports("*:27000-27002->27000-27002/tcp"), vec![27000, 27001, 27002]);
        assert!(parse_published_ports("").is_empty());
    }

    #[test]
    fn test_task_running_requires_both_states() {
        let mut task = TaskSummary {
            id: "t1".to_string(),
            name: "mdb_mongo.1".to_string(),
            node: "worker-1".to_string(),
            desired_state: "Running".to_string(),
            current_state: "Running 3 minutes ago".to_string(),
            error: String::new(),
            ports: String::new(),
        };
        assert!(task.is_running());

        task.current_state = "Pending 2 seconds ago".to_string();
        assert!(!task.is_running());

        task.current_state = "Running 3 minutes ago".to_string();
        task.desired_state = "Shutdown".to_string();
        assert!(!task.is_running());
    }

    #[tokio::test]
    async fn test_remove_missing_secret_is_absent() {
        let executor = FakeExecutor::new();
        executor.fail_on("secret rm mdb_admin_password", "Error: No such secret: mdb_admin_password");
        let cluster = cluster();
        let client = SwarmClient::new(&executor, &cluster);

        let outcome = client.remove_secret("mdb_admin_password").await.unwrap();
        assert_eq!(outcome, Removal::Absent);
    }

    #[tokio::test]
    async fn test_remove_empty_stack_is_absent() {
        let executor = FakeExecutor::new();
        executor.respond("stack rm mdb", "Nothing found in stack: mdb\n");
        let cluster = cluster();
        let client = SwarmClient::new(&executor, &cluster);

        assert_eq!(client.remove_stack("mdb").await.unwrap(), Removal::Absent);
    }

    #[tokio::test]
    async fn test_create_secret_replaces_stale_secret() {
        let executor = FakeExecutor::new();
        executor.fail_once("secret create", "Error response from daemon: rpc error: name conflicts with an existing object: secret mdb_tls_ca already exists");
        let cluster = cluster();
        let client = SwarmClient::new(&executor, &cluster);

        client.create_secret("mdb_tls_ca", "pem", vec![]).await.unwrap();
        let issued = executor.issued();
        assert_eq!(
            issued,
            vec![
                "secret create mdb_tls_ca -".to_string(),
                "secret rm mdb_tls_ca".to_string(),
                "secret create mdb_tls_ca -".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_other_removal_errors_propagate() {
        let executor = FakeExecutor::new();
        executor.fail_on("stack rm mdb", "error during connect: connection refused");
        let cluster = cluster();
        let client = SwarmClient::new(&executor, &cluster);

        assert!(client.remove_stack("mdb").await.is_err());
    }
}
