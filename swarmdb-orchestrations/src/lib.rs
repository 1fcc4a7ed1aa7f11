//! SwarmDB Orchestrations - deployment engine for MongoDB on Docker Swarm
//!
//! This crate drives the lifecycle of database instances on swarm clusters:
//! placement and port allocation, secrets and stacks, DNS, replica-set
//! bootstrap, health verification and idempotent cleanup.
//!
//! # Usage
//!
//! ```rust,no_run
//! use swarmdb_orchestrations::{DeploymentOrchestrator, OrchestratorDeps};
//! use swarmdb_orchestrations::config::OrchestratorConfig;
//!
//! # async fn example(deps: OrchestratorDeps, instance_id: uuid::Uuid) -> anyhow::Result<()> {
//! let orchestrator = DeploymentOrchestrator::new(deps, OrchestratorConfig::default());
//! let output = orchestrator.deploy_instance(instance_id).await?;
//! println!("{}", output.uri);
//! # Ok(())
//! # }
//! ```

// Engine
pub mod cleanup;
pub mod config;
pub mod error;
pub mod health;
pub mod infrastructure;
pub mod names;
pub mod ports;
pub mod replica_set;
pub mod types;

// Collaborators
pub mod certificates;
pub mod command;
pub mod credentials;
pub mod dns;
pub mod mongo;
pub mod renderer;
pub mod store;

mod orchestrations;

#[cfg(test)]
mod test_support;

// Re-export key types for convenience
pub use error::{OrchestrationError, Result};
pub use orchestrations::{DeploymentOrchestrator, OrchestratorDeps};
pub use types::*;
