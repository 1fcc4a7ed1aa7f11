//! Candidate port batches for a region

use std::collections::HashSet;

use crate::config::PortAllocationConfig;
use crate::error::{OrchestrationError, Result};
use crate::store::ConnectionRepository;

/// Next batch of candidate ports for `region`.
///
/// The first batch (`after == None`) starts just above the highest reserved
/// port; once the top of the range is reached it wraps back to reuse ports
/// released by failed or deleted instances. Later batches start above `after`.
pub async fn next_candidates(
    connections: &dyn ConnectionRepository,
    region: &str,
    after: Option<u16>,
    config: &PortAllocationConfig,
) -> Result<Vec<u16>> {
    let used = connections.get_used_ports(region).await?;
    let highest = connections.get_highest_used_port(region).await?;

    let batch = candidate_batch(&used, highest, after, config);
    if batch.is_empty() {
        return Err(OrchestrationError::Infrastructure(format!(
            "port range {}-{} exhausted in region {}",
            config.range_start, config.range_end, region
        )));
    }

    tracing::debug!(
        region,
        first = batch[0],
        last = batch[batch.len() - 1],
        "generated candidate ports"
    );
    Ok(batch)
}

pub(crate) fn candidate_batch(
    used: &HashSet<u16>,
    highest: Option<u16>,
    after: Option<u16>,
    config: &PortAllocationConfig,
) -> Vec<u16> {
    let floor = match after {
        Some(after) => u32::from(after) + 1,
        None => highest.map(|h| u32::from(h) + 1).unwrap_or(0),
    }
    .max(u32::from(config.range_start));

    let batch = scan(used, floor, config);
    if batch.is_empty() && after.is_none() {
        return scan(used, u32::from(config.range_start), config);
    }
    batch
}

fn scan(used: &HashSet<u16>, floor: u32, config: &PortAllocationConfig) -> Vec<u16> {
    (floor..=u32::from(config.range_end))
        .filter_map(|port| u16::try_from(port).ok())
        .filter(|port| !used.contains(port))
        .take(config.batch_size)
        .collect()
}
