//! Naming conventions for swarm resources
//!
//! Every cluster-side resource of an instance is derived from its stack name,
//! so creation and cleanup compute the same names independently.

use swarmdb_models::Topology;

/// Docker rejects secret names longer than this
pub const MAX_SECRET_NAME_LEN: usize = 64;

/// Secret suffixes every deployment creates
pub mod secrets {
    pub const ADMIN_PASSWORD: &str = "admin_password";
    pub const MONITOR_PASSWORD: &str = "monitor_password";
    pub const BACKUP_PASSWORD: &str = "backup_password";
    pub const MONITOR_URI: &str = "monitor_uri";
    pub const TLS_CA: &str = "tls_ca";
    pub const TLS_PEM: &str = "tls_pem";

    /// Replica-set internal authentication keyfile
    pub const REPLICA_KEY: &str = "replica_key";

    pub const COMMON: &[&str] = &[
        ADMIN_PASSWORD,
        MONITOR_PASSWORD,
        BACKUP_PASSWORD,
        MONITOR_URI,
        TLS_CA,
        TLS_PEM,
    ];
}

/// Secret suffixes that only exist for a given topology
pub fn topology_secret_suffixes(topology: Topology) -> &'static [&'static str] {
    match topology {
        Topology::ReplicaSet => &[secrets::REPLICA_KEY],
        Topology::Standalone => &[],
    }
}

/// Build `{stack}_{suffix}`, shortening only the stack portion so the result
/// fits in [`MAX_SECRET_NAME_LEN`] bytes. The cut lands on a char boundary.
pub fn secret_name(stack_name: &str, suffix: &str) -> String {
    let budget = MAX_SECRET_NAME_LEN.saturating_sub(suffix.len() + 1);
    let mut cut = budget.min(stack_name.len());
    while !stack_name.is_char_boundary(cut) {
        cut -= 1;
    }
    let stack_part = &stack_name[..cut];
    format!("{}_{}", stack_part, suffix)
}

pub fn exporter_stack_name(stack_name: &str) -> String {
    format!("{}-exporter", stack_name)
}

/// Name of the service within a stack (`{stack}_{service}`)
pub fn qualified_service_name(stack_name: &str, service: &str) -> String {
    format!("{}_{}", stack_name, service)
}

pub const STANDALONE_SERVICE: &str = "mongo";
pub const EXPORTER_SERVICE: &str = "exporter";

/// Database service names for a stack with `members` workers, in member order
pub fn database_services(topology: Topology, members: usize) -> Vec<String> {
    match topology {
        Topology::Standalone => vec![STANDALONE_SERVICE.to_string()],
        Topology::ReplicaSet => (1..=members).map(|i| format!("mongo{}", i)).collect(),
    }
}

pub fn standalone_hostname(stack_name: &str, domain: &str) -> String {
    format!("{}.{}", stack_name, domain).to_lowercase()
}

pub fn member_hostname(stack_name: &str, worker_number: i32, domain: &str) -> String {
    format!("{}-{}.{}", stack_name, worker_number, domain).to_lowercase()
}
