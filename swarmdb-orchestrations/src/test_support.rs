//! Fixtures and in-memory fakes for every collaborator trait

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{doc, Document};
use swarmdb_models::{
    Cluster, ClusterType, DatabaseInstance, DnsRecord, DnsZone, Engine, HealthStatus,
    InstanceDetails, InstanceSize, InstanceStatus, TlsMode, Topology, Worker,
};
use uuid::Uuid;

use crate::certificates::{CertificateService, TlsBundle};
use crate::cleanup::{CleanupReport, Compensator};
use crate::command::builder::BuiltCommand;
use crate::command::output::parse_output;
use crate::command::{CommandExecutor, CommandOutput};
use crate::dns::{DnsRecordRequest, DnsService};
use crate::error::{OrchestrationError, Result};
use crate::mongo::{command_name, MongoAdmin, MongoTarget};
use crate::ports::PortUsageProbe;
use crate::store::{
    ClusterRepository, ConnectionRepository, DeploymentCommit, DeploymentRepository, DnsRecordRepository,
    InstanceRepository, PortReservation, PortReservationRequest, WorkerRepository,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn cluster() -> Cluster {
    Cluster {
        id: Uuid::new_v4(),
        name: "swarm-use1".to_string(),
        region: "us-east-1".to_string(),
        service_type: "database".to_string(),
        cluster_type: ClusterType::Shared,
        health_status: HealthStatus::Healthy,
        active: true,
        endpoint: "10.0.0.5:2376".to_string(),
        tls_ca_pem: "CA".to_string(),
        tls_cert_pem: "CERT".to_string(),
        tls_key_pem: "KEY".to_string(),
        created_at: Utc::now(),
    }
}

pub fn worker(cluster: &Cluster, number: i32) -> Worker {
    Worker {
        id: Uuid::new_v4(),
        cluster_id: cluster.id,
        hostname: format!("worker-{}", number),
        public_address: format!("10.0.1.{}", number),
        worker_number: number,
        current_instance_count: 0,
        region: cluster.region.clone(),
        service_type: cluster.service_type.clone(),
        active: true,
    }
}

pub fn instance(topology: Topology) -> DatabaseInstance {
    DatabaseInstance {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        name: "orders".to_string(),
        engine: Engine::Mongodb,
        engine_version: "7.0".to_string(),
        topology,
        size_id: Uuid::new_v4(),
        region: "us-east-1".to_string(),
        service_type: "database".to_string(),
        tls_mode: TlsMode::Required,
        stack_name: "mdb-orders".to_string(),
        replica_set_name: Some("rs-orders".to_string()),
        cluster_id: None,
        status: InstanceStatus::Requested,
        status_message: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn details(instance: DatabaseInstance) -> InstanceDetails {
    InstanceDetails {
        size: InstanceSize {
            id: instance.size_id,
            name: "small".to_string(),
            cpu_limit: 0.5,
            memory_limit_mb: 1024,
            storage_gb: 10,
        },
        instance,
        deployment: None,
        connection: None,
    }
}

// ---------------------------------------------------------------------------
// Command executor
// ---------------------------------------------------------------------------

enum Reply {
    Stdout(String),
    Fail(String),
}

struct Rule {
    prefix: String,
    reply: Reply,
    once: bool,
}

#[derive(Default)]
struct ExecutorState {
    rules: Vec<Rule>,
    issued: Vec<String>,
}

/// Matches commands by argument prefix (without the `docker` binary).
/// One-shot rules win over persistent ones; among persistent rules the
/// longest prefix wins. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct FakeExecutor {
    state: Mutex<ExecutorState>,
}

impl FakeExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, prefix: &str, reply: Reply, once: bool) {
        self.state.lock().unwrap().rules.push(Rule {
            prefix: prefix.to_string(),
            reply,
            once,
        });
    }

    pub fn respond(&self, prefix: &str, stdout: &str) {
        self.push(prefix, Reply::Stdout(stdout.to_string()), false);
    }

    pub fn fail_on(&self, prefix: &str, message: &str) {
        self.push(prefix, Reply::Fail(message.to_string()), false);
    }

    pub fn fail_once(&self, prefix: &str, message: &str) {
        self.push(prefix, Reply::Fail(message.to_string()), true);
    }

    pub fn issued(&self) -> Vec<String> {
        self.state.lock().unwrap().issued.clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.issued().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl CommandExecutor for FakeExecutor {
    async fn execute(&self, _cluster: &Cluster, command: &BuiltCommand) -> Result<CommandOutput> {
        let line = command.args.join(" ");
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.issued.push(line.clone());

            let once = state
                .rules
                .iter()
                .position(|r| r.once && line.starts_with(&r.prefix));
            match once {
                Some(index) => Some(state.rules.remove(index).reply),
                None => state
                    .rules
                    .iter()
                    .filter(|r| !r.once && line.starts_with(&r.prefix))
                    .max_by_key(|r| r.prefix.len())
                    .map(|r| match &r.reply {
                        Reply::Stdout(s) => Reply::Stdout(s.clone()),
                        Reply::Fail(m) => Reply::Fail(m.clone()),
                    }),
            }
        };

        match reply {
            Some(Reply::Fail(message)) => Err(OrchestrationError::execution(command, message)),
            Some(Reply::Stdout(stdout)) => parse_output(command, &stdout),
            None => parse_output(command, ""),
        }
    }
}

// ---------------------------------------------------------------------------
// Repositories
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StoreState {
    clusters: HashMap<Uuid, Cluster>,
    workers: Vec<Worker>,
    instances: HashMap<Uuid, InstanceDetails>,
    reservations: HashMap<(String, u16), Uuid>,
    released: HashMap<Uuid, (String, u16)>,
    conflicts: HashSet<u16>,
    reservation_attempts: usize,
    port_queries: usize,
    statuses: Vec<(Uuid, InstanceStatus, Option<String>)>,
    placements: Vec<(Uuid, Uuid)>,
    commits: Vec<DeploymentCommit>,
    dns_records: Vec<DnsRecord>,
    increments: Vec<Uuid>,
    decrements: Vec<Uuid>,
    deleted: Vec<Uuid>,
}

/// One in-memory store behind every repository trait
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<StoreState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a port as held by some other active instance
    pub fn occupy(&self, region: &str, port: u16) {
        self.state
            .lock()
            .unwrap()
            .reservations
            .insert((region.to_string(), port), Uuid::new_v4());
    }

    pub fn reservation(&self, region: &str, port: u16) -> Option<Uuid> {
        self.state
            .lock()
            .unwrap()
            .reservations
            .get(&(region.to_string(), port))
            .copied()
    }

    /// Inactive connection row left behind by a failed or deleted instance
    pub fn released(&self, instance_id: Uuid) -> Option<(String, u16)> {
        self.state.lock().unwrap().released.get(&instance_id).cloned()
    }

    pub fn reservation_attempts(&self) -> usize {
        self.state.lock().unwrap().reservation_attempts
    }

    /// Every reservation of `port` loses the race
    pub fn conflict_on(&self, port: u16) {
        self.state.lock().unwrap().conflicts.insert(port);
    }

    pub fn port_queries(&self) -> usize {
        self.state.lock().unwrap().port_queries
    }

    pub fn add_cluster(&self, cluster: Cluster) {
        self.state.lock().unwrap().clusters.insert(cluster.id, cluster);
    }

    pub fn add_worker(&self, worker: Worker) {
        self.state.lock().unwrap().workers.push(worker);
    }

    pub fn add_instance(&self, details: InstanceDetails) {
        self.state
            .lock()
            .unwrap()
            .instances
            .insert(details.instance.id, details);
    }

    pub fn instance(&self, instance_id: Uuid) -> Option<InstanceDetails> {
        self.state.lock().unwrap().instances.get(&instance_id).cloned()
    }

    pub fn statuses(&self, instance_id: Uuid) -> Vec<InstanceStatus> {
        self.state
            .lock()
            .unwrap()
            .statuses
            .iter()
            .filter(|(id, _, _)| *id == instance_id)
            .map(|(_, status, _)| *status)
            .collect()
    }

    pub fn last_message(&self, instance_id: Uuid) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .statuses
            .iter()
            .rev()
            .find(|(id, _, _)| *id == instance_id)
            .and_then(|(_, _, message)| message.clone())
    }

    pub fn placements(&self) -> Vec<(Uuid, Uuid)> {
        self.state.lock().unwrap().placements.clone()
    }

    pub fn commits(&self) -> Vec<DeploymentCommit> {
        self.state.lock().unwrap().commits.clone()
    }

    pub fn dns_records(&self) -> Vec<DnsRecord> {
        self.state.lock().unwrap().dns_records.clone()
    }

    pub fn increments(&self) -> Vec<Uuid> {
        self.state.lock().unwrap().increments.clone()
    }

    pub fn decrements(&self) -> Vec<Uuid> {
        self.state.lock().unwrap().decrements.clone()
    }

    pub fn deleted(&self) -> Vec<Uuid> {
        self.state.lock().unwrap().deleted.clone()
    }
}

fn eligible(worker: &Worker, region: &str, service_type: &str) -> bool {
    worker.active && worker.region == region && worker.service_type == service_type
}

#[async_trait]
impl InstanceRepository for FakeStore {
    async fn find_with_full_details(&self, instance_id: Uuid) -> Result<Option<InstanceDetails>> {
        Ok(self.instance(instance_id))
    }

    async fn update_status(&self, instance_id: Uuid, status: InstanceStatus, message: Option<&str>) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .statuses
            .push((instance_id, status, message.map(str::to_string)));
        if let Some(details) = state.instances.get_mut(&instance_id) {
            details.instance.status = status;
            details.instance.status_message = message.map(str::to_string);
        }
        // Status changes only release; reserve_port is the one way back in
        if !status.holds_reservation() {
            let held: Vec<(String, u16)> = state
                .reservations
                .iter()
                .filter(|(_, holder)| **holder == instance_id)
                .map(|(key, _)| key.clone())
                .collect();
            for key in held {
                state.reservations.remove(&key);
                state.released.insert(instance_id, key);
            }
        }
        Ok(())
    }

    async fn record_placement(&self, instance_id: Uuid, cluster_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.placements.push((instance_id, cluster_id));
        if let Some(details) = state.instances.get_mut(&instance_id) {
            details.instance.cluster_id = Some(cluster_id);
        }
        Ok(())
    }

    async fn delete(&self, instance_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.instances.remove(&instance_id);
        state.deleted.push(instance_id);
        Ok(())
    }
}

#[async_trait]
impl ConnectionRepository for FakeStore {
    async fn get_highest_used_port(&self, region: &str) -> Result<Option<u16>> {
        let mut state = self.state.lock().unwrap();
        state.port_queries += 1;
        Ok(state
            .reservations
            .keys()
            .filter(|(r, _)| r == region)
            .map(|(_, port)| *port)
            .max())
    }

    async fn get_used_ports(&self, region: &str) -> Result<HashSet<u16>> {
        let mut state = self.state.lock().unwrap();
        state.port_queries += 1;
        Ok(state
            .reservations
            .keys()
            .filter(|(r, _)| r == region)
            .map(|(_, port)| *port)
            .collect())
    }

    async fn reserve_port(&self, request: &PortReservationRequest) -> Result<PortReservation> {
        let mut state = self.state.lock().unwrap();
        state.reservation_attempts += 1;

        if state.conflicts.contains(&request.port) {
            return Ok(PortReservation::Conflict);
        }
        let key = (request.region.clone(), request.port);
        if let Some(holder) = state.reservations.get(&key) {
            if *holder != request.instance_id {
                return Ok(PortReservation::Conflict);
            }
        }

        state.reservations.retain(|_, holder| *holder != request.instance_id);
        state.released.remove(&request.instance_id);
        state.reservations.insert(key, request.instance_id);
        Ok(PortReservation::Reserved)
    }
}

#[async_trait]
impl DeploymentRepository for FakeStore {
    async fn commit(&self, commit: &DeploymentCommit) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.commits.push(commit.clone());
        if let Some(details) = state.instances.get_mut(&commit.deployment.instance_id) {
            details.deployment = Some(commit.deployment.clone());
            details.connection = Some(commit.connection.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl WorkerRepository for FakeStore {
    async fn find_optimal(&self, region: &str, service_type: &str) -> Result<Option<Worker>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .workers
            .iter()
            .filter(|w| eligible(w, region, service_type))
            .min_by_key(|w| (w.current_instance_count, w.worker_number))
            .cloned())
    }

    async fn find_eligible(&self, region: &str, service_type: &str) -> Result<Vec<Worker>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .workers
            .iter()
            .filter(|w| eligible(w, region, service_type))
            .cloned()
            .collect())
    }

    async fn increment_instance_count(&self, worker_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.increments.push(worker_id);
        if let Some(worker) = state.workers.iter_mut().find(|w| w.id == worker_id) {
            worker.current_instance_count += 1;
        }
        Ok(())
    }

    async fn decrement_instance_count(&self, worker_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.decrements.push(worker_id);
        if let Some(worker) = state.workers.iter_mut().find(|w| w.id == worker_id) {
            worker.current_instance_count = (worker.current_instance_count - 1).max(0);
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterRepository for FakeStore {
    async fn find_by_id(&self, cluster_id: Uuid) -> Result<Option<Cluster>> {
        Ok(self.state.lock().unwrap().clusters.get(&cluster_id).cloned())
    }
}

#[async_trait]
impl DnsRecordRepository for FakeStore {
    async fn find_by_stack(&self, stack_name: &str) -> Result<Vec<DnsRecord>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .dns_records
            .iter()
            .filter(|r| r.stack_name == stack_name)
            .cloned()
            .collect())
    }

    async fn save(&self, records: &[DnsRecord]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        for record in records {
            state
                .dns_records
                .retain(|r| !(r.zone_id == record.zone_id && r.hostname == record.hostname));
            state.dns_records.push(record.clone());
        }
        Ok(())
    }

    async fn delete_by_stack(&self, stack_name: &str) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.dns_records.len();
        state.dns_records.retain(|r| r.stack_name != stack_name);
        Ok((before - state.dns_records.len()) as u64)
    }
}

// ---------------------------------------------------------------------------
// Port probe
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakePortProbe {
    bound: Mutex<HashMap<Uuid, HashSet<u16>>>,
    calls: AtomicUsize,
}

impl FakePortProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&self, worker: &Worker, ports: &[u16]) {
        self.bound
            .lock()
            .unwrap()
            .entry(worker.id)
            .or_default()
            .extend(ports.iter().copied());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PortUsageProbe for FakePortProbe {
    async fn bound_ports(&self, _cluster: &Cluster, worker: &Worker) -> Result<HashSet<u16>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .bound
            .lock()
            .unwrap()
            .get(&worker.id)
            .cloned()
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Database driver
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MongoState {
    queued: HashMap<String, VecDeque<Result<Document>>>,
    failures: HashMap<String, (Option<i32>, String)>,
    responses: HashMap<String, Document>,
    calls: Vec<(String, Document)>,
}

/// Replies by command name: queued replies first, then persistent failures,
/// then persistent responses, then `{ ok: 1 }`
#[derive(Default)]
pub struct FakeMongo {
    state: Mutex<MongoState>,
}

impl FakeMongo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, command: &str, reply: Document) {
        self.state
            .lock()
            .unwrap()
            .responses
            .insert(command.to_string(), reply);
    }

    pub fn respond_next(&self, command: &str, reply: Document) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(command.to_string())
            .or_default()
            .push_back(Ok(reply));
    }

    pub fn fail_next(&self, command: &str, error: OrchestrationError) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(command.to_string())
            .or_default()
            .push_back(Err(error));
    }

    pub fn always_fail(&self, command: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(command.to_string(), (None, message.to_string()));
    }

    pub fn always_fail_code(&self, command: &str, code: i32, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(command.to_string(), (Some(code), message.to_string()));
    }

    pub fn count(&self, command: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(name, _)| name == command)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Documents sent for `command`, in call order
    pub fn sent(&self, command: &str) -> Vec<Document> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|(name, _)| name == command)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

#[async_trait]
impl MongoAdmin for FakeMongo {
    async fn run_command(&self, _target: &MongoTarget, command: Document) -> Result<Document> {
        let name = command_name(&command);
        let mut state = self.state.lock().unwrap();
        state.calls.push((name.clone(), command));

        if let Some(reply) = state.queued.get_mut(&name).and_then(VecDeque::pop_front) {
            return reply;
        }
        if let Some((code, message)) = state.failures.get(&name) {
            return Err(OrchestrationError::Database {
                code: *code,
                message: message.clone(),
            });
        }
        Ok(state
            .responses
            .get(&name)
            .cloned()
            .unwrap_or_else(|| doc! { "ok": 1 }))
    }
}

// ---------------------------------------------------------------------------
// DNS, certificates, compensation
// ---------------------------------------------------------------------------

#[derive(Default)]
struct DnsState {
    zone: Option<DnsZone>,
    create_error: Option<String>,
    delete_error: Option<String>,
    created: Vec<DnsRecordRequest>,
    deleted: Vec<String>,
    calls: usize,
}

pub struct FakeDns {
    state: Mutex<DnsState>,
}

impl FakeDns {
    /// Serves a zone for `us-east-1`
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DnsState {
                zone: Some(DnsZone {
                    zone_id: "zone-use1".to_string(),
                    domain: "us-east-1.db.example.com".to_string(),
                    region: "us-east-1".to_string(),
                    engine: Engine::Mongodb,
                }),
                ..DnsState::default()
            }),
        }
    }

    pub fn without_zone() -> Self {
        Self {
            state: Mutex::new(DnsState::default()),
        }
    }

    pub fn fail_creates(&self, message: &str) {
        self.state.lock().unwrap().create_error = Some(message.to_string());
    }

    pub fn fail_deletes(&self, message: &str) {
        self.state.lock().unwrap().delete_error = Some(message.to_string());
    }

    pub fn created(&self) -> Vec<DnsRecordRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }
}

#[async_trait]
impl DnsService for FakeDns {
    async fn find_zone_by_region_and_engine(&self, region: &str, engine: Engine) -> Result<Option<DnsZone>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        Ok(state
            .zone
            .clone()
            .filter(|z| z.region == region && z.engine == engine))
    }

    async fn create_records(&self, _zone: &DnsZone, records: &[DnsRecordRequest]) -> Result<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if let Some(message) = &state.create_error {
            return Err(OrchestrationError::Dns(message.clone()));
        }
        let start = state.created.len();
        state.created.extend(records.iter().cloned());
        Ok((start..start + records.len()).map(|i| format!("rec-{}", i)).collect())
    }

    async fn delete_records(&self, _zone: &DnsZone, hostnames: &[String]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        if let Some(message) = &state.delete_error {
            return Err(OrchestrationError::Dns(message.clone()));
        }
        state.deleted.extend(hostnames.iter().cloned());
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCertificates {
    error: Mutex<Option<String>>,
    calls: AtomicUsize,
}

impl FakeCertificates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, message: &str) {
        *self.error.lock().unwrap() = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CertificateService for FakeCertificates {
    async fn bundle_for_region(&self, region: &str) -> Result<TlsBundle> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.error.lock().unwrap().clone() {
            return Err(OrchestrationError::Infrastructure(message));
        }
        Ok(TlsBundle {
            ca_pem: format!("CA for {}", region),
            server_pem: "CERT\nPRIVATE KEY".to_string(),
        })
    }
}

/// Records compensation calls, optionally delegating to a real compensator
#[derive(Default)]
pub struct CountingCompensator {
    inner: Option<Arc<dyn Compensator>>,
    instance_calls: Mutex<Vec<Uuid>>,
    stack_calls: Mutex<Vec<String>>,
}

impl CountingCompensator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wrapping(inner: Arc<dyn Compensator>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::default()
        }
    }

    pub fn instance_calls(&self) -> Vec<Uuid> {
        self.instance_calls.lock().unwrap().clone()
    }

    pub fn stack_calls(&self) -> Vec<String> {
        self.stack_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Compensator for CountingCompensator {
    async fn cleanup_stack(&self, cluster: &Cluster, stack_name: &str, topology: Topology) -> CleanupReport {
        self.stack_calls.lock().unwrap().push(stack_name.to_string());
        match &self.inner {
            Some(inner) => inner.cleanup_stack(cluster, stack_name, topology).await,
            None => CleanupReport {
                cluster_id: cluster.id,
                stack_name: stack_name.to_string(),
                steps: Vec::new(),
            },
        }
    }

    async fn cleanup_instance(&self, instance_id: Uuid) -> Option<CleanupReport> {
        self.instance_calls.lock().unwrap().push(instance_id);
        match &self.inner {
            Some(inner) => inner.cleanup_instance(instance_id).await,
            None => None,
        }
    }
}
