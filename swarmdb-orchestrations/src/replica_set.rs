//! Replica set bootstrap: configure, initiate, await election, validate

use std::sync::Arc;
use std::time::Duration;

use mongodb::bson::{doc, Bson, Document};
use serde::{Deserialize, Serialize};

use crate::config::ReplicaSetConfig;
use crate::error::{OrchestrationError, Result};
use crate::mongo::{get_number, has_code, wait_until_ready, MongoAdmin, MongoTarget, ALREADY_INITIALIZED};

const STATE_PRIMARY: i64 = 1;
const STATE_SECONDARY: i64 = 2;

/// What the initializer needs to know about a set
#[derive(Debug, Clone)]
pub struct ReplicaSetRequest {
    pub name: Option<String>,
    /// `host:port` per member, primary-designate first
    pub members: Vec<String>,
    pub admin_username: String,
    pub admin_password: String,
    pub tls: bool,
}

impl ReplicaSetRequest {
    fn primary_target(&self) -> MongoTarget {
        MongoTarget::direct(
            self.members.first().cloned().unwrap_or_default(),
            &self.admin_username,
            &self.admin_password,
            self.tls,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initiation {
    Initiated,
    AlreadyInitialized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberStatus {
    pub name: String,
    pub state: String,
    pub healthy: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicaSetStatus {
    pub set_name: String,
    pub primary: Option<String>,
    pub members: Vec<MemberStatus>,
}

impl ReplicaSetStatus {
    pub fn is_healthy(&self) -> bool {
        self.primary.is_some() && !self.members.is_empty() && self.members.iter().all(|m| m.healthy)
    }
}

pub struct ReplicaSetInitializer {
    mongo: Arc<dyn MongoAdmin>,
    config: ReplicaSetConfig,
}

impl ReplicaSetInitializer {
    pub fn new(mongo: Arc<dyn MongoAdmin>, config: ReplicaSetConfig) -> Self {
        Self { mongo, config }
    }

    /// Full bootstrap of a freshly deployed set
    pub async fn initialize(&self, request: &ReplicaSetRequest) -> Result<ReplicaSetStatus> {
        let name = validate(request)?;
        let config = build_config(name, &request.members, &self.config);
        tracing::info!(replica_set = name, members = request.members.len(), "initializing replica set");

        self.settle(request).await?;
        self.initiate(request, config).await?;
        let status = self.await_election(request).await?;

        tracing::info!(
            replica_set = name,
            primary = status.primary.as_deref().unwrap_or("-"),
            "replica set initialized"
        );
        Ok(status)
    }

    /// Optional fixed pause, then ping the primary-designate until it answers
    pub async fn settle(&self, request: &ReplicaSetRequest) -> Result<()> {
        if !self.config.settle_delay.is_zero() {
            tracing::debug!(delay = ?self.config.settle_delay, "waiting before readiness probe");
            tokio::time::sleep(self.config.settle_delay).await;
        }

        wait_until_ready(
            self.mongo.as_ref(),
            &request.primary_target(),
            self.config.settle_timeout,
            self.config.settle_interval,
        )
        .await
    }

    pub async fn initiate(&self, request: &ReplicaSetRequest, config: Document) -> Result<Initiation> {
        let target = request.primary_target();
        let attempts = self.config.initiate_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self
                .mongo
                .run_command(&target, doc! { "replSetInitiate": config.clone() })
                .await
            {
                Ok(_) => {
                    tracing::info!(attempt, "replSetInitiate accepted");
                    return Ok(Initiation::Initiated);
                }
                Err(e) if is_already_initialized(&e) => {
                    tracing::info!("replica set already initialized, continuing");
                    return Ok(Initiation::AlreadyInitialized);
                }
                Err(e) => {
                    tracing::warn!(attempt, attempts, error = %e, "replSetInitiate failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        tokio::time::sleep(self.config.initiate_retry_delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            OrchestrationError::Database {
                code: None,
                message: "replSetInitiate was never attempted".to_string(),
            }
        }))
    }

    /// Wait until the primary-designate reports PRIMARY or SECONDARY
    pub async fn await_election(&self, request: &ReplicaSetRequest) -> Result<ReplicaSetStatus> {
        let target = request.primary_target();
        self.poll_status(
            &target,
            self.config.election_timeout,
            self.config.election_interval,
            "election",
            |doc, _| matches!(get_number(doc, "myState"), Some(STATE_PRIMARY) | Some(STATE_SECONDARY)),
        )
        .await
    }

    /// Post-deploy check: a primary exists and every member is healthy
    pub async fn validate(&self, request: &ReplicaSetRequest) -> Result<ReplicaSetStatus> {
        validate(request)?;
        let target = request.primary_target();
        self.poll_status(
            &target,
            self.config.validate_timeout,
            self.config.validate_interval,
            "validation",
            |_, status| status.is_healthy(),
        )
        .await
    }

    async fn poll_status<F>(
        &self,
        target: &MongoTarget,
        timeout: Duration,
        interval: Duration,
        phase: &str,
        done: F,
    ) -> Result<ReplicaSetStatus>
    where
        F: Fn(&Document, &ReplicaSetStatus) -> bool + Send + Sync,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut last_seen: String;

        loop {
            match self.mongo.run_command(target, doc! { "replSetGetStatus": 1 }).await {
                Ok(doc) => {
                    let status = parse_status(&doc);
                    if done(&doc, &status) {
                        return Ok(status);
                    }
                    last_seen = format!(
                        "myState={:?}, primary={:?}",
                        get_number(&doc, "myState"),
                        status.primary
                    );
                    tracing::debug!(phase, state = %last_seen, "replica set not ready");
                }
                Err(e) => {
                    tracing::debug!(phase, error = %e, "replSetGetStatus failed");
                    last_seen = e.to_string();
                }
            }

            if tokio::time::Instant::now() + interval > deadline {
                return Err(OrchestrationError::Timeout(format!(
                    "replica set {} on {} did not complete within {:?} ({})",
                    phase,
                    target.describe(),
                    timeout,
                    last_seen
                )));
            }
            tokio::time::sleep(interval).await;
        }
    }
}

fn validate(request: &ReplicaSetRequest) -> Result<&str> {
    let name = request
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| OrchestrationError::Validation("replica set name is required".to_string()))?;

    if request.members.is_empty() {
        return Err(OrchestrationError::Validation(format!(
            "replica set {} has no members",
            name
        )));
    }
    Ok(name)
}

/// `replSetInitiate` document; the first member is favoured in elections
pub fn build_config(name: &str, members: &[String], config: &ReplicaSetConfig) -> Document {
    let members: Vec<Bson> = members
        .iter()
        .enumerate()
        .map(|(i, host)| {
            let id = i as i32;
            let priority = if i == 0 { config.primary_priority } else { config.secondary_priority };
            Bson::Document(doc! { "_id": id, "host": host.as_str(), "priority": priority })
        })
        .collect();

    doc! { "_id": name, "members": members }
}

fn is_already_initialized(err: &OrchestrationError) -> bool {
    has_code(err, ALREADY_INITIALIZED)
        || matches!(err, OrchestrationError::Database { message, .. } if message.contains("already initialized"))
}

fn parse_status(doc: &Document) -> ReplicaSetStatus {
    let members: Vec<MemberStatus> = doc
        .get_array("members")
        .map(|members| {
            members
                .iter()
                .filter_map(Bson::as_document)
                .map(|m| MemberStatus {
                    name: m.get_str("name").unwrap_or_default().to_string(),
                    state: m.get_str("stateStr").unwrap_or_default().to_string(),
                    healthy: get_number(m, "health") == Some(1),
                })
                .collect()
        })
        .unwrap_or_default();

    let primary = members
        .iter()
        .find(|m| m.state == "PRIMARY")
        .map(|m| m.name.clone());

    ReplicaSetStatus {
        set_name: doc.get_str("set").unwrap_or_default().to_string(),
        primary,
        members,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeMongo;

    fn config() -> ReplicaSetConfig {
        ReplicaSetConfig {
            settle_timeout: Duration::from_millis(200),
            settle_interval: Duration::from_millis(1),
            initiate_retry_delay: Duration::from_millis(1),
            election_timeout: Duration::from_millis(200),
            election_interval: Duration::from_millis(1),
            validate_timeout: Duration::from_millis(200),
            validate_interval: Duration::from_millis(1),
            ..ReplicaSetConfig::default()
        }
    }

    fn request() -> ReplicaSetRequest {
        ReplicaSetRequest {
            name: Some("rs-orders".to_string()),
            members: vec![
                "mdb-1.example.com:27000".to_string(),
                "mdb-2.example.com:27000".to_string(),
                "mdb-3.example.com:27000".to_string(),
            ],
            admin_username: "admin".to_string(),
            admin_password: "pw".to_string(),
            tls: false,
        }
    }

    fn status(my_state: i32, states: &[&str]) -> Document {
        let members: Vec<Bson> = states
            .iter()
            .enumerate()
            .map(|(i, state)| {
                Bson::Document(doc! {
                    "name": format!("mdb-{}.example.com:27000", i + 1),
                    "stateStr": *state,
                    "health": 1.0,
                })
            })
            .collect();
        doc! { "set": "rs-orders", "myState": my_state, "members": members, "ok": 1.0 }
    }

    #[test]
    fn test_first_member_gets_higher_priority() {
        let config = build_config("rs-orders", &request().members, &ReplicaSetConfig::default());
        assert_eq!(config.get_str("_id").unwrap(), "rs-orders");

        let members = config.get_array("members").unwrap();
        let priorities: Vec<i32> = members
            .iter()
            .map(|m| m.as_document().unwrap().get_i32("priority").unwrap())
            .collect();
        assert_eq!(priorities, vec![2, 1, 1]);
        let first = members[0].as_document().unwrap();
        assert_eq!(first.get_str("host").unwrap(), "mdb-1.example.com:27000");
        assert_eq!(first.get_i32("_id").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_name_is_validation_error() {
        let mongo = Arc::new(FakeMongo::new());
        let initializer = ReplicaSetInitializer::new(mongo.clone(), config());
        let mut request = request();
        request.name = None;

        let err = initializer.initialize(&request).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Validation(_)));
        assert_eq!(mongo.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_already_initialized_is_success_without_retry() {
        let mongo = Arc::new(FakeMongo::new());
        mongo.fail_next(
            "replSetInitiate",
            OrchestrationError::Database { code: Some(23), message: "already initialized".to_string() },
        );
        mongo.respond("replSetGetStatus", status(1, &["PRIMARY", "SECONDARY", "SECONDARY"]));
        let initializer = ReplicaSetInitializer::new(mongo.clone(), config());

        let status = initializer.initialize(&request()).await.unwrap();
        assert_eq!(status.primary.as_deref(), Some("mdb-1.example.com:27000"));
        assert_eq!(mongo.count("replSetInitiate"), 1);
    }

    #[tokio::test]
    async fn test_initiate_twice_is_idempotent() {
        let mongo = Arc::new(FakeMongo::new());
        let initializer = ReplicaSetInitializer::new(mongo.clone(), config());
        let config = build_config("rs-orders", &request().members, &ReplicaSetConfig::default());

        let first = initializer.initiate(&request(), config.clone()).await.unwrap();
        mongo.always_fail_code("replSetInitiate", 23, "already initialized");
        let second = initializer.initiate(&request(), config).await.unwrap();

        assert_eq!(first, Initiation::Initiated);
        assert_eq!(second, Initiation::AlreadyInitialized);
    }

    #[tokio::test]
    async fn test_initiate_retries_transient_failures() {
        let mongo = Arc::new(FakeMongo::new());
        mongo.fail_next("replSetInitiate", OrchestrationError::Database { code: None, message: "connection reset".to_string() });
        mongo.fail_next("replSetInitiate", OrchestrationError::Database { code: None, message: "connection reset".to_string() });
        let initializer = ReplicaSetInitializer::new(mongo.clone(), config());
        let config = build_config("rs-orders", &request().members, &ReplicaSetConfig::default());

        assert_eq!(initializer.initiate(&request(), config).await.unwrap(), Initiation::Initiated);
        assert_eq!(mongo.count("replSetInitiate"), 3);
    }

    #[tokio::test]
    async fn test_initiate_gives_up_after_attempts() {
        let mongo = Arc::new(FakeMongo::new());
        mongo.always_fail("replSetInitiate", "node is not reachable");
        let initializer = ReplicaSetInitializer::new(mongo.clone(), config());
        let config = build_config("rs-orders", &request().members, &ReplicaSetConfig::default());

        let err = initializer.initiate(&request(), config).await.unwrap_err();
        assert!(err.to_string().contains("node is not reachable"));
        assert_eq!(mongo.count("replSetInitiate"), 5);
    }

    #[tokio::test]
    async fn test_election_waits_for_primary_or_secondary() {
        let mongo = Arc::new(FakeMongo::new());
        mongo.respond_next("replSetGetStatus", status(0, &["STARTUP", "STARTUP", "STARTUP"]));
        mongo.respond_next("replSetGetStatus", status(5, &["STARTUP2", "STARTUP2", "STARTUP2"]));
        mongo.respond("replSetGetStatus", status(2, &["SECONDARY", "PRIMARY", "SECONDARY"]));
        let initializer = ReplicaSetInitializer::new(mongo.clone(), config());

        let status = initializer.await_election(&request()).await.unwrap();
        assert_eq!(status.primary.as_deref(), Some("mdb-2.example.com:27000"));
        assert_eq!(mongo.count("replSetGetStatus"), 3);
    }

    #[tokio::test]
    async fn test_election_timeout() {
        let mongo = Arc::new(FakeMongo::new());
        mongo.respond("replSetGetStatus", status(0, &["STARTUP"]));
        let initializer = ReplicaSetInitializer::new(mongo, config());

        let err = initializer.await_election(&request()).await.unwrap_err();
        assert!(matches!(err, OrchestrationError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_validate_requires_healthy_members() {
        let mongo = Arc::new(FakeMongo::new());
        let mut unhealthy = status(1, &["PRIMARY", "SECONDARY", "SECONDARY"]);
        if let Ok(members) = unhealthy.get_array_mut("members") {
            if let Some(Bson::Document(member)) = members.get_mut(2) {
                member.insert("health", 0.0);
            }
        }
        mongo.respond_next("replSetGetStatus", unhealthy);
        mongo.respond("replSetGetStatus", status(1, &["PRIMARY", "SECONDARY", "SECONDARY"]));
        let initializer = ReplicaSetInitializer::new(mongo.clone(), config());

        let status = initializer.validate(&request()).await.unwrap();
        assert!(status.is_healthy());
        assert_eq!(status.set_name, "rs-orders");
        assert_eq!(status.members.len(), 3);
        assert_eq!(mongo.count("replSetGetStatus"), 2);
    }
}
