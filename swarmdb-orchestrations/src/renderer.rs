//! Compose files for database and exporter stacks

use serde::Serialize;
use swarmdb_models::{StackDefinition, Topology};
use tera::{Context as TeraContext, Tera};

use crate::error::Result;
use crate::names::{exporter_stack_name, secret_name, secrets};

const STANDALONE: &str = "mongo-standalone.yaml";
const REPLICA_SET: &str = "mongo-replicaset.yaml";
const EXPORTER: &str = "mongo-exporter.yaml";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberSpec {
    /// Service name inside the stack (`mongo`, `mongo1`, ...)
    pub service: String,
    /// Swarm node the member is pinned to
    pub node_hostname: String,
    /// Public DNS name of the member
    pub advertised_host: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackSpec {
    pub stack_name: String,
    pub topology: Topology,
    pub engine_version: String,
    pub cpu_limit: f64,
    pub memory_limit_mb: i32,
    pub storage_gb: i32,
    pub port: u16,
    pub tls: bool,
    pub replica_set_name: Option<String>,
    pub admin_username: String,
    /// In member order; the first is the primary-designate
    pub members: Vec<MemberSpec>,
    pub exporter_image: String,
}

/// Pure spec-to-file rendering
pub trait StackRenderer: Send + Sync {
    fn render_database(&self, spec: &StackSpec) -> Result<StackDefinition>;

    fn render_exporter(&self, spec: &StackSpec) -> Result<StackDefinition>;
}

pub struct TeraStackRenderer {
    tera: Tera,
}

impl TeraStackRenderer {
    pub fn new() -> Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_template(STANDALONE, include_str!("templates/mongo-standalone.yaml"))?;
        tera.add_raw_template(REPLICA_SET, include_str!("templates/mongo-replicaset.yaml"))?;
        tera.add_raw_template(EXPORTER, include_str!("templates/mongo-exporter.yaml"))?;
        Ok(Self { tera })
    }

    fn context(spec: &StackSpec) -> TeraContext {
        let stack = spec.stack_name.as_str();
        let secret_names = serde_json::json!({
            "admin_password": secret_name(stack, secrets::ADMIN_PASSWORD),
            "monitor_uri": secret_name(stack, secrets::MONITOR_URI),
            "tls_ca": secret_name(stack, secrets::TLS_CA),
            "tls_pem": secret_name(stack, secrets::TLS_PEM),
            "replica_key": secret_name(stack, secrets::REPLICA_KEY),
        });

        let mut ctx = TeraContext::new();
        ctx.insert("stack_name", stack);
        ctx.insert("image", &format!("mongo:{}", spec.engine_version));
        ctx.insert("port", &spec.port);
        ctx.insert("cpus", &spec.cpu_limit);
        ctx.insert("memory_mb", &spec.memory_limit_mb);
        ctx.insert("storage_gb", &spec.storage_gb);
        ctx.insert("tls", &spec.tls);
        ctx.insert("replica_set_name", &spec.replica_set_name.as_deref().unwrap_or(""));
        ctx.insert("admin_username", &spec.admin_username);
        ctx.insert("members", &spec.members);
        ctx.insert("exporter_image", &spec.exporter_image);
        ctx.insert("secrets", &secret_names);
        ctx
    }
}

impl StackRenderer for TeraStackRenderer {
    fn render_database(&self, spec: &StackSpec) -> Result<StackDefinition> {
        let template = match spec.topology {
            Topology::Standalone => STANDALONE,
            Topology::ReplicaSet => REPLICA_SET,
        };
        let content = self.tera.render(template, &Self::context(spec))?;

        Ok(StackDefinition {
            stack_name: spec.stack_name.clone(),
            file_name: format!("{}.yaml", spec.stack_name),
            content,
        })
    }

    fn render_exporter(&self, spec: &StackSpec) -> Result<StackDefinition> {
        let content = self.tera.render(EXPORTER, &Self::context(spec))?;
        let stack_name = exporter_stack_name(&spec.stack_name);

        Ok(StackDefinition {
            file_name: format!("{}.yaml", stack_name),
            stack_name,
            content,
        })
    }
}
