//! Batch allocation loop: candidates, live probe, persisted reservation

use std::sync::Arc;

use swarmdb_models::{Cluster, TlsMode, Worker};
use uuid::Uuid;

use super::availability::{PortAvailabilityChecker, PortUsageProbe};
use super::candidates::next_candidates;
use crate::config::PortAllocationConfig;
use crate::error::{OrchestrationError, Result};
use crate::store::{ConnectionRepository, PortReservation, PortReservationRequest};

#[derive(Debug, Clone, Copy)]
pub struct PortRequest<'a> {
    pub instance_id: Uuid,
    pub region: &'a str,
    pub tls_mode: TlsMode,
    pub cluster: &'a Cluster,
    /// Every worker that will bind the port
    pub workers: &'a [Worker],
}

pub struct PortAllocator {
    connections: Arc<dyn ConnectionRepository>,
    checker: PortAvailabilityChecker,
    config: PortAllocationConfig,
}

impl PortAllocator {
    pub fn new(
        connections: Arc<dyn ConnectionRepository>,
        probe: Arc<dyn PortUsageProbe>,
        config: PortAllocationConfig,
    ) -> Self {
        let checker = PortAvailabilityChecker::new(probe, config.cache_ttl);
        Self {
            connections,
            checker,
            config,
        }
    }

    /// Find a port free on all target workers and reserve it for the instance
    pub async fn allocate(&self, request: PortRequest<'_>) -> Result<u16> {
        let mut after: Option<u16> = None;

        for batch in 1..=self.config.max_batches {
            let candidates =
                next_candidates(self.connections.as_ref(), request.region, after, &self.config).await?;
            let available = self
                .checker
                .available(request.cluster, request.workers, &candidates)
                .await?;

            for port in available {
                let reservation = self
                    .connections
                    .reserve_port(&PortReservationRequest {
                        instance_id: request.instance_id,
                        region: request.region.to_string(),
                        port,
                        tls_mode: request.tls_mode,
                    })
                    .await?;

                match reservation {
                    PortReservation::Reserved => {
                        self.checker.mark_reserved(request.cluster, request.workers, port);
                        tracing::info!(
                            instance_id = %request.instance_id,
                            region = request.region,
                            port,
                            batch,
                            "reserved port"
                        );
                        return Ok(port);
                    }
                    PortReservation::Conflict => continue,
                }
            }

            after = candidates.last().copied();
            tracing::debug!(
                region = request.region,
                batch,
                last_candidate = ?after,
                "no free port in batch, advancing"
            );

            if batch < self.config.max_batches && !self.config.batch_delay.is_zero() {
                tokio::time::sleep(self.config.batch_delay).await;
            }
        }

        Err(OrchestrationError::Infrastructure(format!(
            "no available ports in region {} after {} batches",
            request.region, self.config.max_batches
        )))
    }
}
