use clap::{Parser, Subcommand};
use uuid::Uuid;

/// SwarmDB - MongoDB as a Service on Docker Swarm
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Deploy a requested database instance
    Deploy {
        /// Instance ID
        instance_id: Uuid,

        /// Run post-deploy verification once the instance is running
        #[arg(long)]
        verify: bool,

        /// Output format
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Delete a database instance and everything it owns
    Delete {
        /// Instance ID
        instance_id: Uuid,
    },

    /// Verify a running instance's services and replica set
    Verify {
        /// Instance ID
        instance_id: Uuid,

        /// Output format
        #[arg(short, long, default_value = "table")]
        output: String,
    },

    /// Remove a stack, its exporter and its secrets from a cluster
    Cleanup {
        /// Cluster ID
        #[arg(long)]
        cluster: Uuid,

        /// Stack name (e.g. "mdb-orders")
        #[arg(long)]
        stack: String,

        /// Also remove replica-set secrets
        #[arg(long)]
        replica_set: bool,
    },

    /// Wait for services of a stack to become healthy
    Health {
        /// Cluster ID
        #[arg(long)]
        cluster: Uuid,

        /// Stack name
        #[arg(long)]
        stack: String,

        /// Service names within the stack (e.g. "mongo1")
        #[arg(long = "service", required = true)]
        services: Vec<String>,
    },

    /// Apply database migrations
    Migrate,
}
