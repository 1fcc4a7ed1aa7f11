//! Contention-safe host port allocation per region

mod allocator;
mod availability;
mod candidates;

pub use allocator::{PortAllocator, PortRequest};
pub use availability::{PortAvailabilityChecker, PortUsageProbe, SwarmPortProbe};
pub use candidates::next_candidates;
