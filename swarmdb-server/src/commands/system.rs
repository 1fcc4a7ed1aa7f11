use anyhow::Result;
use swarmdb_models::Topology;
use swarmdb_orchestrations::cleanup::{Compensator, StepOutcome};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::engine::Engine;

async fn engine(config: &Config) -> Result<Engine> {
    let pool = db::connect(config).await?;
    Engine::new(config, pool)
}

pub async fn run_cleanup(cluster_id: Uuid, stack: String, replica_set: bool) -> Result<()> {
    let config = Config::load()?;
    let engine = engine(&config).await?;
    let cluster = engine.cluster(cluster_id).await?;

    let topology = if replica_set {
        Topology::ReplicaSet
    } else {
        Topology::Standalone
    };
    let report = engine.cleanup.cleanup_stack(&cluster, &stack, topology).await;

    println!("Cleanup of {} on {}", stack, cluster.name);
    println!("{}", "-".repeat(60));
    for step in &report.steps {
        let outcome = match &step.outcome {
            StepOutcome::Removed => "removed".to_string(),
            StepOutcome::Absent => "absent".to_string(),
            StepOutcome::Failed(reason) => format!("FAILED: {}", reason),
        };
        println!("  {:<8} {:<50} {}", format!("{:?}", step.kind).to_lowercase(), step.name, outcome);
    }
    println!();
    println!("{}", report);

    if !report.is_clean() {
        anyhow::bail!("Cleanup of {} finished with failures", stack);
    }
    Ok(())
}

pub async fn run_health(cluster_id: Uuid, stack: String, services: Vec<String>) -> Result<()> {
    let config = Config::load()?;
    let engine = engine(&config).await?;
    let cluster = engine.cluster(cluster_id).await?;

    println!("Waiting for {} service(s) in {}...", services.len(), stack);
    let healthy = engine
        .orchestrator
        .health()
        .wait_for_services(&cluster, &stack, &services)
        .await;

    if !healthy {
        anyhow::bail!("Services of {} did not become healthy", stack);
    }
    println!("✓ All services healthy");
    Ok(())
}

pub async fn run_migrate() -> Result<()> {
    let config = Config::load()?;
    let pool = db::connect(&config).await?;
    db::run_migrations(&pool).await?;
    println!("✓ Migrations applied");
    Ok(())
}
