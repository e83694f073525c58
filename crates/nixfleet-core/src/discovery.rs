//! Node discovery from the flake's `nixosConfigurations`

use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, instrument};

use nixfleet_exec::{CommandRunner, CommandSpec};

use crate::error::DiscoveryError;

#[derive(Debug, Deserialize)]
struct FlakeShow {
    #[serde(rename = "nixosConfigurations", default)]
    nixos_configurations: BTreeMap<String, serde_json::Value>,
}

/// Node names from `nix flake show --json` output, sorted
///
/// # Errors
/// Returns `DiscoveryError::Parse` if the output is not a JSON object
pub fn parse_flake_show(json: &[u8]) -> Result<Vec<String>, DiscoveryError> {
    let show: FlakeShow = serde_json::from_slice(json)?;
    Ok(show.nixos_configurations.into_keys().collect())
}

/// Enumerate every node defined by `flake`
///
/// # Errors
/// Returns `DiscoveryError` if `nix flake show` fails or prints something
/// that is not a flake description
#[instrument(skip(runner))]
pub async fn discover_nodes(
    runner: &dyn CommandRunner,
    flake: &str,
) -> Result<Vec<String>, DiscoveryError> {
    let spec = CommandSpec::new("nix").args(["flake", "show", "--json", flake]);
    let command = spec.to_string();

    let result = runner.run(spec).await;
    if let Some(error) = result.error {
        return Err(DiscoveryError::CommandFailed { command, error });
    }

    let nodes = parse_flake_show(&result.stdout)?;
    for node in &nodes {
        debug!(node = %node, "found node");
    }
    Ok(nodes)
}
