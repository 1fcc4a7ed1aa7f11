//! Pure mapping from cluster operations to CLI argument vectors
//!
//! Nothing here performs I/O. Each [`SwarmCommand`] builds into a
//! [`BuiltCommand`] carrying the arguments, the output contract the executor
//! must parse against, and an optional stdin payload for secret material.

use std::fmt;
use std::path::PathBuf;

/// Shape of the output a command is expected to print
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Raw,
    JsonObject,
    JsonArray,
}

/// A command ready to hand to an executor
#[derive(Clone, PartialEq)]
pub struct BuiltCommand {
    pub args: Vec<String>,
    pub output: OutputFormat,
    /// Written to the process's stdin, never to its argument list
    pub stdin: Option<String>,
}

impl fmt::Display for BuiltCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "docker {}", self.args.join(" "))
    }
}

impl fmt::Debug for BuiltCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltCommand")
            .field("args", &self.args)
            .field("output", &self.output)
            .field("stdin", &self.stdin.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// `--filter key=value`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub key: String,
    pub value: String,
}

impl Filter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAvailability {
    Active,
    Pause,
    Drain,
}

impl NodeAvailability {
    fn as_str(&self) -> &'static str {
        match self {
            NodeAvailability::Active => "active",
            NodeAvailability::Pause => "pause",
            NodeAvailability::Drain => "drain",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceCreateSpec {
    pub name: String,
    pub image: String,
    pub replicas: Option<u32>,
    pub constraints: Vec<String>,
    pub env: Vec<(String, String)>,
    pub secrets: Vec<String>,
    pub networks: Vec<String>,
    /// `(published, target)` pairs published in host mode
    pub host_ports: Vec<(u16, u16)>,
    pub labels: Vec<(String, String)>,
    pub command: Vec<String>,
}

/// Cluster operations the engine knows how to issue
#[derive(Debug, Clone, PartialEq)]
pub enum SwarmCommand {
    StackDeploy { stack: String, compose_file: PathBuf, prune: bool },
    StackRemove { stack: String },
    StackList,
    StackServices { stack: String },
    StackPs { stack: String, filters: Vec<Filter> },

    ServiceList { filters: Vec<Filter> },
    ServiceInspect { service: String },
    ServicePs { service: String, filters: Vec<Filter> },
    ServiceUpdate { service: String, image: Option<String>, force: bool },
    ServiceScale { service: String, replicas: u32 },
    ServiceLogs { target: String, tail: u32 },
    ServiceCreate(ServiceCreateSpec),
    ServiceRemove { service: String },

    SecretCreate { name: String, data: String, labels: Vec<(String, String)> },
    SecretList { filters: Vec<Filter> },
    SecretRemove { name: String },

    VolumeList { filters: Vec<Filter> },
    VolumeRemove { name: String, force: bool },

    NetworkList { filters: Vec<Filter> },
    NetworkCreate { name: String, driver: String, attachable: bool },
    NetworkRemove { name: String },

    ContainerList { filters: Vec<Filter> },

    ImageList,
    ImagePull { image: String },

    NodeList,
    NodeInspect { node: String },
    NodePs { node: String, filters: Vec<Filter> },
    NodeUpdateAvailability { node: String, availability: NodeAvailability },
}

const JSON_LINES: &str = "{{json .}}";

impl SwarmCommand {
    pub fn build(&self) -> BuiltCommand {
        use OutputFormat::*;

        match self {
            SwarmCommand::StackDeploy { stack, compose_file, prune } => {
                let mut args = args(&["stack", "deploy", "--with-registry-auth", "--compose-file"]);
                args.push(compose_file.display().to_string());
                if *prune {
                    args.push("--prune".to_string());
                }
                args.push(stack.clone());
                raw(args)
            }
            SwarmCommand::StackRemove { stack } => raw(with(&["stack", "rm"], [stack])),
            SwarmCommand::StackList => list(args(&["stack", "ls"]), &[]),
            SwarmCommand::StackServices { stack } => list(with(&["stack", "services"], [stack]), &[]),
            SwarmCommand::StackPs { stack, filters } => {
                list(with(&["stack", "ps", "--no-trunc"], [stack]), filters)
            }

            SwarmCommand::ServiceList { filters } => list(args(&["service", "ls"]), filters),
            SwarmCommand::ServiceInspect { service } => BuiltCommand {
                args: with(&["service", "inspect"], [service]),
                output: JsonObject,
                stdin: None,
            },
            SwarmCommand::ServicePs { service, filters } => {
                list(with(&["service", "ps", "--no-trunc"], [service]), filters)
            }
            SwarmCommand::ServiceUpdate { service, image, force } => {
                let mut args = args(&["service", "update", "--detach"]);
                if let Some(image) = image {
                    args.push("--image".to_string());
                    args.push(image.clone());
                }
                if *force {
                    args.push("--force".to_string());
                }
                args.push(service.clone());
                raw(args)
            }
            SwarmCommand::ServiceScale { service, replicas } => raw(args(&[
                "service",
                "scale",
                "--detach",
                format!("{}={}", service, replicas).as_str(),
            ])),
            SwarmCommand::ServiceLogs { target, tail } => {
                let tail = tail.to_string();
                raw(with(&["service", "logs", "--no-trunc", "--timestamps", "--tail", tail.as_str()], [target]))
            }
            SwarmCommand::ServiceCreate(spec) => raw(service_create_args(spec)),
            SwarmCommand::ServiceRemove { service } => raw(with(&["service", "rm"], [service])),

            SwarmCommand::SecretCreate { name, data, labels } => {
                let mut args = args(&["secret", "create"]);
                for (key, value) in labels {
                    args.push("--label".to_string());
                    args.push(format!("{}={}", key, value));
                }
                args.push(name.clone());
                // "-" reads the secret from stdin
                args.push("-".to_string());
                BuiltCommand { args, output: Raw, stdin: Some(data.clone()) }
            }
            SwarmCommand::SecretList { filters } => list(args(&["secret", "ls"]), filters),
            SwarmCommand::SecretRemove { name } => raw(with(&["secret", "rm"], [name])),

            SwarmCommand::VolumeList { filters } => list(args(&["volume", "ls"]), filters),
            SwarmCommand::VolumeRemove { name, force } => {
                let mut args = args(&["volume", "rm"]);
                if *force {
                    args.push("--force".to_string());
                }
                args.push(name.clone());
                raw(args)
            }

            SwarmCommand::NetworkList { filters } => list(args(&["network", "ls"]), filters),
            SwarmCommand::NetworkCreate { name, driver, attachable } => {
                let mut args = args(&["network", "create", "--driver", driver.as_str()]);
                if *attachable {
                    args.push("--attachable".to_string());
                }
                args.push(name.clone());
                raw(args)
            }
            SwarmCommand::NetworkRemove { name } => raw(with(&["network", "rm"], [name])),

            SwarmCommand::ContainerList { filters } => list(args(&["container", "ls", "--all"]), filters),

            SwarmCommand::ImageList => list(args(&["image", "ls"]), &[]),
            SwarmCommand::ImagePull { image } => raw(with(&["image", "pull", "--quiet"], [image])),

            SwarmCommand::NodeList => list(args(&["node", "ls"]), &[]),
            SwarmCommand::NodeInspect { node } => BuiltCommand {
                args: with(&["node", "inspect"], [node]),
                output: JsonObject,
                stdin: None,
            },
            SwarmCommand::NodePs { node, filters } => {
                list(with(&["node", "ps", "--no-trunc"], [node]), filters)
            }
            SwarmCommand::NodeUpdateAvailability { node, availability } => raw(with(
                &["node", "update", "--availability", availability.as_str()],
                [node],
            )),
        }
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

fn with<'a>(parts: &[&str], tail: impl IntoIterator<Item = &'a String>) -> Vec<String> {
    let mut args = args(parts);
    args.extend(tail.into_iter().cloned());
    args
}

fn raw(args: Vec<String>) -> BuiltCommand {
    BuiltCommand { args, output: OutputFormat::Raw, stdin: None }
}

/// List commands print one JSON document per line
fn list(mut args: Vec<String>, filters: &[Filter]) -> BuiltCommand {
    for filter in filters {
        args.push("--filter".to_string());
        args.push(format!("{}={}", filter.key, filter.value));
    }
    args.push("--format".to_string());
    args.push(JSON_LINES.to_string());
    BuiltCommand { args, output: OutputFormat::JsonArray, stdin: None }
}

fn service_create_args(spec: &ServiceCreateSpec) -> Vec<String> {
    let mut args = args(&["service", "create", "--detach", "--name", spec.name.as_str()]);
    if let Some(replicas) = spec.replicas {
        args.push("--replicas".to_string());
        args.push(replicas.to_string());
    }
    for constraint in &spec.constraints {
        args.push("--constraint".to_string());
        args.push(constraint.clone());
    }
    for (key, value) in &spec.env {
        args.push("--env".to_string());
        args.push(format!("{}={}", key, value));
    }
    for secret in &spec.secrets {
        args.push("--secret".to_string());
        args.push(secret.clone());
    }
    for network in &spec.networks {
        args.push("--network".to_string());
        args.push(network.clone());
    }
    for (published, target) in &spec.host_ports {
        args.push("--publish".to_string());
        args.push(format!("mode=host,published={},target={}", published, target));
    }
    for (key, value) in &spec.labels {
        args.push("--label".to_string());
        args.push(format!("{}={}", key, value));
    }
    args.push(spec.image.clone());
    args.extend(spec.command.iter().cloned());
    args
}
