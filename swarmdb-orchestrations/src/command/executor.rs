//! Executes built commands against a cluster's TLS endpoint

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use swarmdb_models::Cluster;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::builder::BuiltCommand;
use super::output::{parse_output, CommandOutput};
use crate::config::CommandConfig;
use crate::error::{OrchestrationError, Result};

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, cluster: &Cluster, command: &BuiltCommand) -> Result<CommandOutput>;
}

/// Runs the docker CLI with per-command client certificates
pub struct DockerCliExecutor {
    config: CommandConfig,
}

impl DockerCliExecutor {
    pub fn new(config: CommandConfig) -> Self {
        Self { config }
    }

    async fn run(&self, cluster: &Cluster, command: &BuiltCommand) -> Result<String> {
        let material = TlsMaterial::write(cluster, self.config.scratch_dir.as_deref())
            .await
            .map_err(|e| OrchestrationError::execution(command, format!("failed to stage TLS material: {}", e)))?;

        let result = self.spawn(cluster, command, material.path()).await;

        // Removed on every exit path, before the result is handed back
        material.close();
        result
    }

    async fn spawn(&self, cluster: &Cluster, command: &BuiltCommand, cert_dir: &Path) -> Result<String> {
        let mut process = Command::new(&self.config.binary);
        process
            .args(&command.args)
            .env("DOCKER_HOST", docker_host(&cluster.endpoint))
            .env("DOCKER_TLS_VERIFY", "1")
            .env("DOCKER_CERT_PATH", cert_dir)
            .stdin(if command.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = process
            .spawn()
            .map_err(|e| OrchestrationError::execution(command, format!("failed to start process: {}", e)))?;

        if let (Some(payload), Some(mut stdin)) = (&command.stdin, child.stdin.take()) {
            stdin
                .write_all(payload.as_bytes())
                .await
                .map_err(|e| OrchestrationError::execution(command, format!("failed to write stdin: {}", e)))?;
            drop(stdin);
        }

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                OrchestrationError::execution(command, format!("timed out after {:?}", self.config.timeout))
            })?
            .map_err(|e| OrchestrationError::execution(command, e))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let detail = if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() };
            return Err(OrchestrationError::execution(command, format!("{} ({})", detail, output.status)));
        }

        Ok(stdout)
    }
}

#[async_trait]
impl CommandExecutor for DockerCliExecutor {
    async fn execute(&self, cluster: &Cluster, command: &BuiltCommand) -> Result<CommandOutput> {
        tracing::debug!(cluster = %cluster.name, command = %command, "executing cluster command");

        let stdout = match self.run(cluster, command).await {
            Ok(stdout) => stdout,
            Err(e) => {
                tracing::debug!(cluster = %cluster.name, error = %e, "cluster command failed");
                return Err(e);
            }
        };

        parse_output(command, &stdout)
    }
}

fn docker_host(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("tcp://{}", endpoint)
    }
}

/// Client certificate files for one command, in a private temp directory
struct TlsMaterial {
    dir: TempDir,
}

impl TlsMaterial {
    async fn write(cluster: &Cluster, parent: Option<&Path>) -> std::io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("swarmdb-tls-");
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };

        tokio::fs::write(dir.path().join("ca.pem"), &cluster.tls_ca_pem).await?;
        tokio::fs::write(dir.path().join("cert.pem"), &cluster.tls_cert_pem).await?;

        let key_path = dir.path().join("key.pem");
        tokio::fs::write(&key_path, &cluster.tls_key_pem).await?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&key_path, std::fs::Permissions::from_mode(0o600)).await?;
        }

        Ok(Self { dir })
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to remove TLS material");
        }
    }
}
