use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod commands;
mod config;
mod db;
mod engine;

use cli::{Args, Command};

/// Initialize tracing with dual output:
/// 1. Console output (stderr) - progress of the running command
/// 2. File output (~/.swarmdb/swarmdb.log) - full debug trail
///
/// The returned guard must live until exit or buffered file logs are lost.
fn initialize_tracing() -> Result<WorkerGuard> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::{EnvFilter, Layer};

    let file_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "info,\
         swarmdb=debug,\
         swarmdb_orchestrations=debug,\
         sqlx::query=warn"
            .into()
    });
    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn,swarmdb=info,swarmdb_orchestrations=info".into());

    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let log_dir = PathBuf::from(home).join(".swarmdb");
    std::fs::create_dir_all(&log_dir).ok();

    let file_appender = tracing_appender::rolling::never(&log_dir, "swarmdb.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_filter(file_filter);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let _guard = initialize_tracing()?;

    match args.command {
        Command::Deploy { instance_id, verify, output } => {
            commands::instance::run_deploy(instance_id, verify, output).await
        }
        Command::Delete { instance_id } => commands::instance::run_delete(instance_id).await,
        Command::Verify { instance_id, output } => commands::instance::run_verify(instance_id, output).await,
        Command::Cleanup { cluster, stack, replica_set } => {
            commands::system::run_cleanup(cluster, stack, replica_set).await
        }
        Command::Health { cluster, stack, services } => {
            commands::system::run_health(cluster, stack, services).await
        }
        Command::Migrate => commands::system::run_migrate().await,
    }
}
