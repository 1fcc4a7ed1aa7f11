//! Tunables for the orchestration engine
//!
//! Defaults match production behaviour; the server overrides them from the
//! environment and tests shrink the delays.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub ports: PortAllocationConfig,
    pub replica_set: ReplicaSetConfig,
    pub health: HealthConfig,
    pub command: CommandConfig,
    pub dns: DnsConfig,
    pub mongo: MongoConfig,
    pub cleanup: CleanupConfig,
}

#[derive(Debug, Clone)]
pub struct PortAllocationConfig {
    /// First port handed out in a region
    pub range_start: u16,
    /// Last port (inclusive) that may be handed out
    pub range_end: u16,
    pub batch_size: usize,
    pub max_batches: u32,
    /// Pause between exhausted batches
    pub batch_delay: Duration,
    /// How long a worker's bound-port snapshot stays valid
    pub cache_ttl: Duration,
}

impl Default for PortAllocationConfig {
    fn default() -> Self {
        Self {
            range_start: 27000,
            range_end: 28999,
            batch_size: 10,
            max_batches: 20,
            batch_delay: Duration::from_millis(500),
            cache_ttl: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReplicaSetConfig {
    /// Fixed pause before the readiness probe starts (0 disables it)
    pub settle_delay: Duration,
    /// Upper bound for the readiness probe loop
    pub settle_timeout: Duration,
    pub settle_interval: Duration,
    pub initiate_attempts: u32,
    pub initiate_retry_delay: Duration,
    pub election_timeout: Duration,
    pub election_interval: Duration,
    pub validate_timeout: Duration,
    pub validate_interval: Duration,
    pub primary_priority: i32,
    pub secondary_priority: i32,
}

impl Default for ReplicaSetConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            settle_timeout: Duration::from_secs(120),
            settle_interval: Duration::from_secs(3),
            initiate_attempts: 5,
            initiate_retry_delay: Duration::from_secs(5),
            election_timeout: Duration::from_secs(60),
            election_interval: Duration::from_secs(2),
            validate_timeout: Duration::from_secs(30),
            validate_interval: Duration::from_secs(2),
            primary_priority: 2,
            secondary_priority: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HealthConfig {
    pub timeout: Duration,
    pub check_interval: Duration,
    /// Lines of logs fetched from failed tasks for diagnostics
    pub log_tail: u32,
}

impl HealthConfig {
    /// Number of checks a single-service wait performs
    pub fn max_attempts(&self) -> u32 {
        let attempts = self
            .timeout
            .as_nanos()
            .checked_div(self.check_interval.as_nanos())
            .unwrap_or(1);
        attempts.clamp(1, u32::MAX as u128) as u32
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            check_interval: Duration::from_secs(10),
            log_tail: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CommandConfig {
    /// Container CLI binary
    pub binary: PathBuf,
    pub timeout: Duration,
    /// Parent directory for per-command TLS material; system temp dir if unset
    pub scratch_dir: Option<PathBuf>,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("docker"),
            timeout: Duration::from_secs(120),
            scratch_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DnsConfig {
    /// Base domain; hostnames live under `{region}.{base_domain}`
    pub base_domain: String,
    pub ttl: u32,
}

impl DnsConfig {
    pub fn domain_for_region(&self, region: &str) -> String {
        format!("{}.{}", region, self.base_domain).to_lowercase()
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            base_domain: "db.swarmdb.io".to_string(),
            ttl: 300,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// CA bundle used to verify instance certificates when TLS is required
    pub ca_file: Option<PathBuf>,
    /// Accept self-signed instance certificates (development clusters)
    pub allow_invalid_certificates: bool,
    pub server_selection_timeout: Duration,
    /// Image tags for rendered stacks
    pub exporter_image: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            ca_file: None,
            allow_invalid_certificates: false,
            server_selection_timeout: Duration::from_secs(10),
            exporter_image: "percona/mongodb_exporter:0.40".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Secrets stay "in use" until the stack's tasks are gone
    pub secret_attempts: u32,
    pub secret_retry_delay: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            secret_attempts: 3,
            secret_retry_delay: Duration::from_secs(2),
        }
    }
}
