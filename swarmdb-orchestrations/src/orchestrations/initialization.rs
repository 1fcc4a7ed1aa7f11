//! Database-level setup after the stack is up: replica set, then role users

use mongodb::bson::{doc, Bson, Document};
use swarmdb_models::{Credentials, DatabaseInstance, Topology};

use super::DeploymentOrchestrator;
use crate::error::Result;
use crate::infrastructure::Placement;
use crate::mongo::{has_code, wait_until_ready, MongoAdmin, MongoTarget, USER_ALREADY_EXISTS};
use crate::replica_set::ReplicaSetRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UserOutcome {
    Created,
    Updated,
}

/// `(role, db)` pairs
const MONITOR_ROLES: &[(&str, &str)] = &[("clusterMonitor", "admin"), ("read", "local")];
const BACKUP_ROLES: &[(&str, &str)] = &[("backup", "admin"), ("clusterMonitor", "admin")];

fn roles(pairs: &[(&str, &str)]) -> Vec<Bson> {
    pairs
        .iter()
        .map(|(role, db)| Bson::Document(doc! { "role": *role, "db": *db }))
        .collect()
}

/// Create the user, or reset its password and roles if it already exists
pub(crate) async fn ensure_user(
    mongo: &dyn MongoAdmin,
    target: &MongoTarget,
    username: &str,
    password: &str,
    user_roles: &[(&str, &str)],
) -> Result<UserOutcome> {
    let create: Document = doc! { "createUser": username, "pwd": password, "roles": roles(user_roles) };

    match mongo.run_command(target, create).await {
        Ok(_) => {
            tracing::info!(user = username, "created database user");
            Ok(UserOutcome::Created)
        }
        Err(e) if has_code(&e, USER_ALREADY_EXISTS) => {
            let update = doc! { "updateUser": username, "pwd": password, "roles": roles(user_roles) };
            mongo.run_command(target, update).await?;
            tracing::info!(user = username, "updated existing database user");
            Ok(UserOutcome::Updated)
        }
        Err(e) => Err(e),
    }
}

impl DeploymentOrchestrator {
    pub(super) async fn initialize_database(
        &self,
        instance: &DatabaseInstance,
        placement: &Placement,
        credentials: &Credentials,
    ) -> Result<()> {
        let tls = instance.tls_mode.is_enabled();
        let members = placement.members();
        let admin = credentials.admin_username.as_str();
        let admin_password = credentials.admin_password.as_str();
        let settle = &self.config.replica_set;

        let target = match instance.topology {
            Topology::Standalone => {
                let target = MongoTarget::direct(members[0].clone(), admin, admin_password, tls);
                wait_until_ready(self.deps.mongo.as_ref(), &target, settle.settle_timeout, settle.settle_interval)
                    .await?;
                target
            }
            Topology::ReplicaSet => {
                let request = ReplicaSetRequest {
                    name: instance.replica_set_name.clone(),
                    members: members.clone(),
                    admin_username: admin.to_string(),
                    admin_password: admin_password.to_string(),
                    tls,
                };
                let status = self.replica_sets.initialize(&request).await?;
                MongoTarget::replica_set(members, &status.set_name, admin, admin_password, tls)
            }
        };

        ensure_user(
            self.deps.mongo.as_ref(),
            &target,
            &credentials.monitor_username,
            &credentials.monitor_password,
            MONITOR_ROLES,
        )
        .await?;
        ensure_user(
            self.deps.mongo.as_ref(),
            &target,
            &credentials.backup_username,
            &credentials.backup_password,
            BACKUP_ROLES,
        )
        .await?;

        tracing::info!(instance_id = %instance.id, hosts = %target.describe(), "database initialized");
        Ok(())
    }
}
