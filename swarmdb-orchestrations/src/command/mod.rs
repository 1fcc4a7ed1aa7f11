//! Cluster command layer: a pure builder, an executor, and a typed client

pub mod builder;
pub mod client;
pub mod executor;
pub mod output;

pub use builder::{BuiltCommand, Filter, NodeAvailability, OutputFormat, ServiceCreateSpec, SwarmCommand};
pub use client::{
    parse_published_ports, parse_replicas, NodeSummary, Removal, ServiceSummary, SwarmClient, TaskSummary,
};
pub use executor::{CommandExecutor, DockerCliExecutor};
pub use output::CommandOutput;
