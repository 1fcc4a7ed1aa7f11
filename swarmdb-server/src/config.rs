use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use swarmdb_orchestrations::config::OrchestratorConfig;
use swarmdb_orchestrations::dns::CloudflareConfig;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Root of the per-region TLS bundles
    pub cert_dir: PathBuf,
    pub cloudflare: CloudflareConfig,
    pub orchestrator: OrchestratorConfig,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the environment in production)
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut orchestrator = OrchestratorConfig::default();

        let ports = &mut orchestrator.ports;
        ports.range_start = parse_or(&lookup, "SWARMDB_PORT_RANGE_START", ports.range_start)?;
        ports.range_end = parse_or(&lookup, "SWARMDB_PORT_RANGE_END", ports.range_end)?;
        if ports.range_start > ports.range_end {
            anyhow::bail!(
                "SWARMDB_PORT_RANGE_START ({}) must not exceed SWARMDB_PORT_RANGE_END ({})",
                ports.range_start,
                ports.range_end
            );
        }

        let health = &mut orchestrator.health;
        health.timeout = secs_or(&lookup, "SWARMDB_HEALTH_TIMEOUT_SECS", health.timeout)?;
        health.check_interval = secs_or(&lookup, "SWARMDB_HEALTH_INTERVAL_SECS", health.check_interval)?;

        let replica_set = &mut orchestrator.replica_set;
        replica_set.settle_delay = secs_or(&lookup, "SWARMDB_REPLICA_SETTLE_DELAY_SECS", replica_set.settle_delay)?;
        replica_set.settle_timeout =
            secs_or(&lookup, "SWARMDB_REPLICA_SETTLE_TIMEOUT_SECS", replica_set.settle_timeout)?;

        let command = &mut orchestrator.command;
        if let Some(binary) = lookup("SWARMDB_DOCKER_BINARY") {
            command.binary = PathBuf::from(binary);
        }
        command.timeout = secs_or(&lookup, "SWARMDB_COMMAND_TIMEOUT_SECS", command.timeout)?;
        command.scratch_dir = lookup("SWARMDB_SCRATCH_DIR").map(PathBuf::from);

        let dns = &mut orchestrator.dns;
        if let Some(domain) = lookup("SWARMDB_BASE_DOMAIN") {
            dns.base_domain = domain;
        }
        dns.ttl = parse_or(&lookup, "SWARMDB_DNS_TTL", dns.ttl)?;

        let mongo = &mut orchestrator.mongo;
        mongo.ca_file = lookup("SWARMDB_MONGO_CA_FILE").map(PathBuf::from);
        mongo.allow_invalid_certificates =
            parse_or(&lookup, "SWARMDB_MONGO_ALLOW_INVALID_CERTIFICATES", mongo.allow_invalid_certificates)?;
        if let Some(image) = lookup("SWARMDB_EXPORTER_IMAGE") {
            mongo.exporter_image = image;
        }

        let mut cloudflare = CloudflareConfig::default();
        if let Some(base) = lookup("SWARMDB_CLOUDFLARE_API_BASE") {
            cloudflare.api_base = base;
        }
        cloudflare.api_token = lookup("SWARMDB_CLOUDFLARE_API_TOKEN").unwrap_or_default();

        Ok(Self {
            database_url: lookup("DATABASE_URL").context("DATABASE_URL must be set")?,
            max_connections: parse_or(&lookup, "SWARMDB_DB_MAX_CONNECTIONS", 5)?,
            cert_dir: lookup("SWARMDB_CERT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("/etc/swarmdb/certs")),
            cloudflare,
            orchestrator,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

fn secs_or<F>(lookup: &F, key: &str, default: Duration) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    parse_or(lookup, key, default.as_secs()).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/swarmdb")])).unwrap();

        assert_eq!(config.max_connections, 5);
        assert_eq!(config.orchestrator.ports.range_start, 27000);
        assert_eq!(config.orchestrator.health.timeout, Duration::from_secs(300));
        assert_eq!(config.orchestrator.dns.base_domain, "db.swarmdb.io");
        assert!(config.orchestrator.command.scratch_dir.is_none());
    }

    #[test]
    fn test_overrides_are_parsed() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/swarmdb"),
            ("SWARMDB_PORT_RANGE_START", "30000"),
            ("SWARMDB_PORT_RANGE_END", "30100"),
            ("SWARMDB_HEALTH_TIMEOUT_SECS", "60"),
            ("SWARMDB_BASE_DOMAIN", "db.example.com"),
            ("SWARMDB_MONGO_ALLOW_INVALID_CERTIFICATES", "true"),
        ]))
        .unwrap();

        assert_eq!(config.orchestrator.ports.range_start, 30000);
        assert_eq!(config.orchestrator.ports.range_end, 30100);
        assert_eq!(config.orchestrator.health.timeout, Duration::from_secs(60));
        assert_eq!(config.orchestrator.dns.domain_for_region("us-east-1"), "us-east-1.db.example.com");
        assert!(config.orchestrator.mongo.allow_invalid_certificates);
    }

    #[test]
    fn test_missing_database_url_is_an_error() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
    }

    #[test]
    fn test_invalid_number_names_the_variable() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/swarmdb"),
            ("SWARMDB_DNS_TTL", "five minutes"),
        ]))
        .err()
        .unwrap();
        assert!(err.to_string().contains("SWARMDB_DNS_TTL"));
    }

    #[test]
    fn test_inverted_port_range_is_rejected() {
        let result = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/swarmdb"),
            ("SWARMDB_PORT_RANGE_START", "29000"),
            ("SWARMDB_PORT_RANGE_END", "28000"),
        ]));
        assert!(result.is_err());
    }
}
