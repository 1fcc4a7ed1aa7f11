use anyhow::{Context, Result};
use swarmdb_orchestrations::types::{DeployInstanceOutput, VerifyReport};
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::engine::Engine;

async fn engine() -> Result<Engine> {
    let config = Config::load()?;
    let pool = db::connect(&config).await?;
    db::verify_schema(&pool).await?;
    Engine::new(&config, pool)
}

pub async fn run_deploy(instance_id: Uuid, verify: bool, output: String) -> Result<()> {
    let engine = engine().await?;

    println!("Deploying instance {}...", instance_id);
    let result = engine
        .orchestrator
        .deploy_instance(instance_id)
        .await
        .with_context(|| format!("Failed to deploy instance {}", instance_id))?;

    if output == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_deployment(&result);
    }

    if verify {
        let report = engine.orchestrator.verify_instance(instance_id).await?;
        print_report(&report, &output)?;
        if !report.is_healthy() {
            anyhow::bail!("Instance {} deployed but failed verification", instance_id);
        }
    }

    Ok(())
}

pub async fn run_delete(instance_id: Uuid) -> Result<()> {
    let engine = engine().await?;

    let result = engine
        .orchestrator
        .delete_instance(instance_id)
        .await
        .with_context(|| format!("Failed to delete instance {}", instance_id))?;

    if !result.deleted {
        println!("Instance {} not found, nothing to delete", instance_id);
        return Ok(());
    }

    println!("✓ Instance {} deleted", instance_id);
    match &result.cleanup {
        Some(report) => {
            println!("  Cleanup: {}", report);
            for step in report.failures() {
                println!("  ! {:?} {}: {:?}", step.kind, step.name, step.outcome);
            }
        }
        None => println!("  Cleanup: no cluster resources"),
    }
    Ok(())
}

pub async fn run_verify(instance_id: Uuid, output: String) -> Result<()> {
    let engine = engine().await?;

    let report = engine.orchestrator.verify_instance(instance_id).await?;
    print_report(&report, &output)?;

    if !report.is_healthy() {
        anyhow::bail!("Instance {} is not healthy", instance_id);
    }
    Ok(())
}

fn print_deployment(result: &DeployInstanceOutput) {
    println!();
    println!("✓ Instance deployed in {} seconds", result.deployment_time_seconds);
    println!("{}", "=".repeat(60));
    println!("  Stack:              {}", result.stack_name);
    println!("  Cluster:            {}", result.cluster_id);
    println!("  Port:               {}", result.port);
    println!("  Primary:            {}", result.primary);
    for hostname in &result.hostnames {
        println!("  Host:               {}", hostname);
    }
    println!("  Connection String:  {}", result.uri);
}

fn print_report(report: &VerifyReport, output: &str) -> Result<()> {
    if output == "json" {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    let mark = |ok: bool| if ok { "healthy" } else { "UNHEALTHY" };
    println!();
    println!("Verification: {}", report.stack_name);
    println!("{}", "=".repeat(60));
    println!("  Database services:  {}", mark(report.database_healthy));
    println!("  Exporter:           {}", mark(report.exporter_healthy));
    if let Some(status) = &report.replica_set {
        println!("  Replica set:        {}", status.set_name);
        println!("  Primary:            {}", status.primary.as_deref().unwrap_or("-"));
        for member in &status.members {
            println!("    {:<45} {:<10} {}", member.name, member.state, mark(member.healthy));
        }
    }
    if let Some(error) = &report.replica_set_error {
        println!("  Replica set:        {}", error);
    }
    Ok(())
}
