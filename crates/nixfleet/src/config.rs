//! Configuration loading and types

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use nixfleet_core::FleetConfig;
use nixfleet_core::flake::DEFAULT_PACKAGE_MARKER;

/// Top-level configuration read from `nixfleet.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Fleet update settings
    #[serde(default)]
    pub fleet: FleetSection,
    /// Local package settings
    #[serde(default)]
    pub packages: PackagesSection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            fleet: FleetSection::default(),
            packages: PackagesSection::default(),
        }
    }
}

/// `[fleet]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetSection {
    /// Flake holding the `nixosConfigurations`
    #[serde(default = "default_flake")]
    pub flake: String,
    /// `ssh` connect timeout for the liveness probe
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Upper bound on concurrently updating nodes, `0` for no bound
    #[serde(default)]
    pub max_parallel: usize,
    /// Reboot nodes that need it without passing `--reboot`
    #[serde(default)]
    pub reboot: bool,
}

impl Default for FleetSection {
    fn default() -> Self {
        Self {
            flake: default_flake(),
            connect_timeout_secs: default_connect_timeout_secs(),
            max_parallel: 0,
            reboot: false,
        }
    }
}

/// `[packages]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagesSection {
    /// Directory containing local package definitions
    #[serde(default = "default_pkg_dir")]
    pub pkg_dir: PathBuf,
    /// Text that marks a definition as updatable by `nix-update`
    #[serde(default = "default_marker")]
    pub marker: String,
}

impl Default for PackagesSection {
    fn default() -> Self {
        Self {
            pkg_dir: default_pkg_dir(),
            marker: default_marker(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_flake() -> String {
    ".".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_pkg_dir() -> PathBuf {
    PathBuf::from("pkgs/")
}

fn default_marker() -> String {
    DEFAULT_PACKAGE_MARKER.to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Find a config file in the usual places
    ///
    /// `NIXFLEET_CONFIG` wins even if the file does not exist, so a typo there
    /// surfaces as a load error instead of silently falling back.
    pub fn locate() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("NIXFLEET_CONFIG") {
            return Some(PathBuf::from(path));
        }

        let mut paths = vec![
            PathBuf::from("nixfleet.toml"),
            PathBuf::from("/etc/nixfleet/nixfleet.toml"),
        ];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("nixfleet/nixfleet.toml"));
        }

        paths.into_iter().find(|p| p.exists())
    }

    /// Runtime fleet settings
    pub fn fleet_config(&self) -> FleetConfig {
        FleetConfig {
            flake: self.fleet.flake.clone(),
            connect_timeout: Duration::from_secs(self.fleet.connect_timeout_secs),
            max_parallel: self.fleet.max_parallel,
            ..FleetConfig::default()
        }
    }

    /// Directory to run `nix flake update` in
    ///
    /// Remote flake references have no local lock file; those fall back to the
    /// working directory.
    pub fn flake_dir(&self) -> &Path {
        let flake = self.fleet.flake.as_str();
        if flake.contains(':') {
            Path::new(".")
        } else {
            Path::new(flake)
        }
    }
}
