//! Runtime configuration for node and fleet updates

use std::time::Duration;

/// Flake reference used when none is configured
pub const DEFAULT_FLAKE: &str = ".";

/// Connect timeout handed to `ssh` when probing a node
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for updating a single node
#[derive(Debug, Clone)]
pub struct UpdaterConfig {
    /// Flake holding the `nixosConfigurations`, e.g. `.` or `github:me/configs`
    pub flake: String,
    /// Connect timeout for the liveness probe
    pub connect_timeout: Duration,
    /// Schedule a reboot when the node needs one
    pub reboot: bool,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            flake: DEFAULT_FLAKE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reboot: false,
        }
    }
}

/// Settings for a fleet-wide run
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Flake holding the `nixosConfigurations`
    pub flake: String,
    /// Connect timeout for the liveness probe
    pub connect_timeout: Duration,
    /// Upper bound on concurrently updating nodes, `0` for one worker per node
    pub max_parallel: usize,
    /// Capacity of the progress event channel
    pub event_channel_capacity: usize,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            flake: DEFAULT_FLAKE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            max_parallel: 0,
            event_channel_capacity: 1024,
        }
    }
}

impl FleetConfig {
    /// Per-node settings for one run
    #[must_use]
    pub fn updater(&self, reboot: bool) -> UpdaterConfig {
        UpdaterConfig {
            flake: self.flake.clone(),
            connect_timeout: self.connect_timeout,
            reboot,
        }
    }
}
