//! Role credentials for new instances

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::distributions::Alphanumeric;
use rand::{Rng, RngCore};
use swarmdb_models::{Credentials, Topology};

pub const ADMIN_USERNAME: &str = "admin";
pub const MONITOR_USERNAME: &str = "monitor";
pub const BACKUP_USERNAME: &str = "backup";

const PASSWORD_LEN: usize = 32;
/// 96 random bytes encode to 128 base64 characters, inside the keyfile limits
const REPLICA_KEY_BYTES: usize = 96;

pub fn generate_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(PASSWORD_LEN)
        .map(char::from)
        .collect()
}

pub fn generate_replica_key() -> String {
    let mut bytes = [0u8; REPLICA_KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STANDARD.encode(bytes)
}

pub fn generate(topology: Topology) -> Credentials {
    Credentials {
        admin_username: ADMIN_USERNAME.to_string(),
        admin_password: generate_password(),
        monitor_username: MONITOR_USERNAME.to_string(),
        monitor_password: generate_password(),
        backup_username: BACKUP_USERNAME.to_string(),
        backup_password: generate_password(),
        replica_key: match topology {
            Topology::ReplicaSet => Some(generate_replica_key()),
            Topology::Standalone => None,
        },
    }
}

/// Connection string the metrics exporter uses, scoped to the monitor role
pub fn monitor_uri(credentials: &Credentials, members: &[String], tls: bool) -> String {
    let mut uri = format!(
        "mongodb://{}:{}@{}/admin?authSource=admin",
        credentials.monitor_username,
        credentials.monitor_password,
        members.join(",")
    );
    if members.len() == 1 {
        uri.push_str("&directConnection=true");
    }
    if tls {
        // Exporter containers mount the instance CA under this path
        uri.push_str("&tls=true&tlsCAFile=/run/secrets/tls_ca");
    }
    uri
}
