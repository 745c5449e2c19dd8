// ABOUTME: Fleet module - owns the agent runners and their shared infrastructure.
// ABOUTME: Start/stop lifecycle, health monitoring with recovery policy, and fleet-wide snapshots.

mod coordinator;

pub use coordinator::{FleetCoordinator, FleetStatus};
