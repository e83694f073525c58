//! nixfleet-core: Fleet update orchestration
//!
//! Drives each node through probe, apply, reboot check and optional reboot,
//! fans the work out across the fleet and collects one outcome per node.
//! Also holds the sequential maintenance helpers around it: node discovery,
//! flake and package updates, and dependency checks.

pub mod config;
pub mod deps;
pub mod discovery;
pub mod error;
pub mod event;
pub mod flake;
pub mod orchestrator;
pub mod probe;
pub mod reboot;
pub mod report;
pub mod state;
pub mod updater;

#[cfg(test)]
mod test_support;

pub use config::{FleetConfig, UpdaterConfig};
pub use deps::check_dependencies;
pub use discovery::{discover_nodes, parse_flake_show};
pub use error::{CoreError, DiscoveryError, NodeError};
pub use event::FleetEvent;
pub use flake::{PackageReport, update_flake, update_package, update_packages};
pub use orchestrator::FleetOrchestrator;
pub use probe::NodeProber;
pub use reboot::{RebootCheck, RebootOracle};
pub use report::{FleetReport, FleetSummary, NodeFailure, NodeOutcome};
pub use state::NodeState;
pub use updater::{NodeUpdater, NodeUpdaterArgs};
