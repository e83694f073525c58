//! Flake input and local package maintenance
//!
//! Plain sequential helpers run before a fleet update.

use std::path::Path;

use serde::Serialize;
use tracing::{debug, error, info, instrument};

use nixfleet_exec::{CommandResult, CommandRunner, CommandSpec};

use crate::error::CoreError;

/// Marker that identifies packages `nix-update` knows how to bump
pub const DEFAULT_PACKAGE_MARKER: &str = "fetchFromGitHub";

/// Names of packages updated and failed by [`update_packages`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageReport {
    pub updated: Vec<String>,
    pub failed: Vec<String>,
}

/// Run `nix flake update` in `flake_dir`
///
/// A failure is logged and handed back; it never aborts the caller.
#[instrument(skip(runner))]
pub async fn update_flake(runner: &dyn CommandRunner, flake_dir: &Path) -> CommandResult {
    info!("updating flake.lock");

    let spec = CommandSpec::new("nix")
        .args(["flake", "update"])
        .with_current_dir(flake_dir);
    let result = runner.run(spec).await;

    if let Some(e) = &result.error {
        error!(error = %e, "error running `nix flake update`");
    }
    debug!(stdout = %result.stdout_lossy(), stderr = %result.stderr_lossy(), "nix flake update output");

    result
}

/// Run `nix-update <name>` inside `pkg_dir`
#[instrument(skip(runner))]
pub async fn update_package(runner: &dyn CommandRunner, name: &str, pkg_dir: &Path) -> CommandResult {
    info!(package = %name, "updating package");

    let spec = CommandSpec::new("nix-update")
        .arg(name)
        .with_current_dir(pkg_dir);
    let result = runner.run(spec).await;

    if let Some(e) = &result.error {
        error!(package = %name, error = %e, "error updating package");
    }

    result
}

/// Package names from `grep -l` output: the directory of each matching file
fn packages_from_matches(output: &str) -> Vec<String> {
    let mut packages: Vec<String> = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let name = match Path::new(line).parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_string_lossy().into_owned(),
            _ => ".".to_string(),
        };
        if !packages.contains(&name) {
            packages.push(name);
        }
    }

    packages
}

/// Update every package under `pkg_dir` whose definition mentions `marker`
///
/// Packages are updated one at a time. Individual failures are collected in
/// the report.
///
/// # Errors
/// Returns `CoreError::PackageScan` if the directory scan itself fails
#[instrument(skip(runner))]
pub async fn update_packages(
    runner: &dyn CommandRunner,
    pkg_dir: &Path,
    marker: &str,
) -> Result<PackageReport, CoreError> {
    debug!("updating local packages");

    let scan = CommandSpec::new("grep")
        .args(["-lr", marker])
        .with_current_dir(pkg_dir);
    let command = scan.to_string();
    let result = runner.run(scan).await;
    let mut report = PackageReport::default();

    // grep exits 1 when nothing matches
    if result.status == Some(1) {
        info!(marker, "no packages to update");
        return Ok(report);
    }
    let result = result
        .into_result()
        .map_err(|error| CoreError::PackageScan { command, error })?;

    for name in packages_from_matches(&result.stdout_lossy()) {
        if update_package(runner, &name, pkg_dir).await.success() {
            report.updated.push(name);
        } else {
            report.failed.push(name);
        }
    }

    Ok(report)
}
