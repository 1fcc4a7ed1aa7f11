//! Results returned by the orchestrator's operations

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cleanup::CleanupReport;
use crate::replica_set::ReplicaSetStatus;

// ============================================================================
// Deploy
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeployInstanceOutput {
    pub instance_id: Uuid,
    pub stack_name: String,
    pub cluster_id: Uuid,
    pub port: u16,
    /// One per member, primary-designate first
    pub hostnames: Vec<String>,
    /// Client connection string (no credentials)
    pub uri: String,
    /// `host:port` of the primary-designate
    pub primary: String,
    /// Time taken to deploy (seconds)
    pub deployment_time_seconds: u64,
}

// ============================================================================
// Delete
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeleteInstanceOutput {
    pub instance_id: Uuid,
    /// Whether instance was deleted (false if it didn't exist)
    pub deleted: bool,
    /// `None` when no cluster was ever chosen for the instance
    pub cleanup: Option<CleanupReport>,
}

// ============================================================================
// Verify
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifyReport {
    pub instance_id: Uuid,
    pub stack_name: String,
    /// Every database service converged with a running task
    pub database_healthy: bool,
    pub exporter_healthy: bool,
    /// Replica-set view, only for replica-set instances
    pub replica_set: Option<ReplicaSetStatus>,
    /// Why the replica set could not be validated
    pub replica_set_error: Option<String>,
}

impl VerifyReport {
    pub fn is_healthy(&self) -> bool {
        self.database_healthy
            && self.exporter_healthy
            && self.replica_set_error.is_none()
            && self.replica_set.as_ref().map_or(true, ReplicaSetStatus::is_healthy)
    }
}
