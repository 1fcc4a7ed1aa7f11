//! Admin command seam for MongoDB deployments

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, Credential, ServerAddress, Tls, TlsOptions};
use mongodb::Client;

use crate::config::MongoConfig;
use crate::error::{OrchestrationError, Result};

/// "already initialized"
pub const ALREADY_INITIALIZED: i32 = 23;
/// "User ... already exists"
pub const USER_ALREADY_EXISTS: i32 = 51003;

/// Connection target for an admin command
#[derive(Clone, PartialEq)]
pub struct MongoTarget {
    /// `host:port` entries
    pub hosts: Vec<String>,
    /// Connect as a replica-set client (routes writes to the primary);
    /// `None` means a direct connection to the first host
    pub replica_set: Option<String>,
    pub username: String,
    pub password: String,
    pub tls: bool,
}

impl MongoTarget {
    pub fn direct(host: impl Into<String>, username: &str, password: &str, tls: bool) -> Self {
        Self {
            hosts: vec![host.into()],
            replica_set: None,
            username: username.to_string(),
            password: password.to_string(),
            tls,
        }
    }

    pub fn replica_set(hosts: Vec<String>, name: &str, username: &str, password: &str, tls: bool) -> Self {
        Self {
            hosts,
            replica_set: Some(name.to_string()),
            username: username.to_string(),
            password: password.to_string(),
            tls,
        }
    }

    pub fn describe(&self) -> String {
        match &self.replica_set {
            Some(name) => format!("{}/{}", name, self.hosts.join(",")),
            None => self.hosts.join(","),
        }
    }
}

impl std::fmt::Debug for MongoTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoTarget")
            .field("hosts", &self.hosts)
            .field("replica_set", &self.replica_set)
            .field("username", &self.username)
            .field("tls", &self.tls)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait MongoAdmin: Send + Sync {
    /// Run a command against the `admin` database
    async fn run_command(&self, target: &MongoTarget, command: Document) -> Result<Document>;
}

pub struct MongoDriver {
    config: MongoConfig,
}

impl MongoDriver {
    pub fn new(config: MongoConfig) -> Self {
        Self { config }
    }

    fn client_options(&self, target: &MongoTarget) -> Result<ClientOptions> {
        let hosts = target
            .hosts
            .iter()
            .map(|host| ServerAddress::parse(host).map_err(database_error))
            .collect::<Result<Vec<_>>>()?;

        let mut credential = Credential::default();
        credential.username = Some(target.username.clone());
        credential.password = Some(target.password.clone());
        credential.source = Some("admin".to_string());

        let mut options = ClientOptions::default();
        options.hosts = hosts;
        options.credential = Some(credential);
        options.app_name = Some("swarmdb".to_string());
        options.server_selection_timeout = Some(self.config.server_selection_timeout);
        options.connect_timeout = Some(Duration::from_secs(5));
        match &target.replica_set {
            Some(name) => options.repl_set_name = Some(name.clone()),
            None => options.direct_connection = Some(true),
        }

        if target.tls {
            let mut tls = TlsOptions::default();
            tls.ca_file_path = self.config.ca_file.clone();
            tls.allow_invalid_certificates = Some(self.config.allow_invalid_certificates);
            options.tls = Some(Tls::Enabled(tls));
        }

        Ok(options)
    }
}

#[async_trait]
impl MongoAdmin for MongoDriver {
    async fn run_command(&self, target: &MongoTarget, command: Document) -> Result<Document> {
        let name = command_name(&command);
        tracing::debug!(hosts = %target.describe(), command = %name, "running admin command");

        let client = Client::with_options(self.client_options(target)?).map_err(database_error)?;
        let result = client.database("admin").run_command(command).await.map_err(database_error);
        client.shutdown().await;
        result
    }
}

fn database_error(err: mongodb::error::Error) -> OrchestrationError {
    match err.kind.as_ref() {
        ErrorKind::Command(command) => OrchestrationError::Database {
            code: Some(command.code),
            message: command.message.clone(),
        },
        _ => OrchestrationError::Database {
            code: None,
            message: err.to_string(),
        },
    }
}

pub fn command_name(command: &Document) -> String {
    command.keys().next().cloned().unwrap_or_default()
}

/// Whether `err` is the server reporting `code`
pub fn has_code(err: &OrchestrationError, code: i32) -> bool {
    matches!(err, OrchestrationError::Database { code: Some(c), .. } if *c == code)
}

/// Poll `ping` until the target answers or `timeout` elapses
pub async fn wait_until_ready(
    mongo: &dyn MongoAdmin,
    target: &MongoTarget,
    timeout: Duration,
    interval: Duration,
) -> Result<()> {
    let deadline = tokio::time::Instant::now() + timeout;
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match mongo.run_command(target, doc! { "ping": 1 }).await {
            Ok(_) => {
                tracing::debug!(hosts = %target.describe(), attempt, "database is accepting commands");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(hosts = %target.describe(), attempt, error = %e, "database not ready yet");
                if tokio::time::Instant::now() + interval > deadline {
                    return Err(OrchestrationError::Timeout(format!(
                        "{} did not answer ping within {:?}: {}",
                        target.describe(),
                        timeout,
                        e
                    )));
                }
            }
        }
        tokio::time::sleep(interval).await;
    }
}

/// Numeric field that the server may encode as int32, int64 or double
pub fn get_number(doc: &Document, key: &str) -> Option<i64> {
    match doc.get(key)? {
        Bson::Int32(v) => Some(i64::from(*v)),
        Bson::Int64(v) => Some(*v),
        Bson::Double(v) => Some(*v as i64),
        _ => None,
    }
}
