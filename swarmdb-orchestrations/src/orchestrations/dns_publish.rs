//! Publish and withdraw the per-worker DNS records of an instance

use chrono::Utc;
use swarmdb_models::{DatabaseInstance, DnsRecord, DnsRecordStatus, DnsZone};
use uuid::Uuid;

use super::OrchestratorDeps;
use crate::dns::DnsRecordRequest;
use crate::error::{OrchestrationError, Result};
use crate::infrastructure::Placement;

async fn zone_for(deps: &OrchestratorDeps, instance: &DatabaseInstance) -> Result<Option<DnsZone>> {
    deps.dns
        .find_zone_by_region_and_engine(&instance.region, instance.engine)
        .await
}

/// One record per hostname, pointing at the worker that serves it
fn record_requests(placement: &Placement, ttl: u32) -> Vec<DnsRecordRequest> {
    placement
        .hostnames
        .iter()
        .zip(&placement.workers)
        .map(|(hostname, worker)| DnsRecordRequest::new(hostname.clone(), worker.public_address.clone(), ttl))
        .collect()
}

fn audit_records(
    zone: &DnsZone,
    stack_name: &str,
    requests: &[DnsRecordRequest],
    status: DnsRecordStatus,
    provider_ids: Option<Vec<String>>,
) -> Vec<DnsRecord> {
    let mut ids = provider_ids.unwrap_or_default().into_iter();
    requests
        .iter()
        .map(|request| DnsRecord {
            id: Uuid::new_v4(),
            zone_id: zone.zone_id.clone(),
            stack_name: stack_name.to_string(),
            hostname: request.hostname.clone(),
            record_type: request.record_type.clone(),
            target: request.target.clone(),
            status,
            provider_record_id: ids.next(),
            created_at: Utc::now(),
        })
        .collect()
}

/// Replace every record of the stack with the placement's hostnames
pub(super) async fn publish(
    deps: &OrchestratorDeps,
    instance: &DatabaseInstance,
    placement: &Placement,
    ttl: u32,
) -> Result<Vec<DnsRecord>> {
    let stack = instance.stack_name.as_str();
    let zone = zone_for(deps, instance).await?.ok_or_else(|| {
        OrchestrationError::Dns(format!(
            "no DNS zone for region {} and engine {}",
            instance.region, instance.engine
        ))
    })?;
    let requests = record_requests(placement, ttl);

    // Records from an earlier run of the same stack go first
    let mut stale: Vec<String> = match deps.dns_records.find_by_stack(stack).await {
        Ok(records) => records.into_iter().map(|r| r.hostname).collect(),
        Err(e) => {
            tracing::warn!(stack, error = %e, "could not load existing DNS records");
            Vec::new()
        }
    };
    for request in &requests {
        if !stale.contains(&request.hostname) {
            stale.push(request.hostname.clone());
        }
    }
    if let Err(e) = deps.dns.delete_records(&zone, &stale).await {
        tracing::warn!(stack, error = %e, "failed to delete existing DNS records, continuing");
    }
    if let Err(e) = deps.dns_records.delete_by_stack(stack).await {
        tracing::warn!(stack, error = %e, "failed to clear DNS audit records, continuing");
    }

    match deps.dns.create_records(&zone, &requests).await {
        Ok(ids) => {
            let records = audit_records(&zone, stack, &requests, DnsRecordStatus::Active, Some(ids));
            deps.dns_records.save(&records).await?;
            tracing::info!(stack, zone = %zone.domain, records = records.len(), "published DNS records");
            Ok(records)
        }
        Err(e) => {
            let records = audit_records(&zone, stack, &requests, DnsRecordStatus::Failed, None);
            if let Err(save_err) = deps.dns_records.save(&records).await {
                tracing::warn!(stack, error = %save_err, "failed to record DNS failure");
            }
            Err(e)
        }
    }
}

/// Remove the stack's records from the provider and the audit table
pub(super) async fn withdraw(deps: &OrchestratorDeps, instance: &DatabaseInstance) -> Result<usize> {
    let stack = instance.stack_name.as_str();
    let Some(zone) = zone_for(deps, instance).await? else {
        tracing::info!(stack, region = %instance.region, "no DNS zone, nothing to withdraw");
        return Ok(0);
    };

    let hostnames: Vec<String> = deps
        .dns_records
        .find_by_stack(stack)
        .await?
        .into_iter()
        .map(|r| r.hostname)
        .collect();

    if !hostnames.is_empty() {
        deps.dns.delete_records(&zone, &hostnames).await?;
    }
    deps.dns_records.delete_by_stack(stack).await?;
    Ok(hostnames.len())
}
