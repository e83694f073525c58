//! Core error types for nixfleet-core

use serde::Serialize;
use thiserror::Error;

use nixfleet_exec::ExecError;

/// Errors that abort an invocation before or outside the per-node fan-out
#[derive(Error, Debug)]
pub enum CoreError {
    /// Node enumeration failed
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    /// Required executables are not on `PATH`
    #[error("missing dependencies: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),

    /// Scanning the package directory failed
    #[error("package scan `{command}` failed: {error}")]
    PackageScan {
        /// Command that was run
        command: String,
        /// Underlying error
        error: ExecError,
    },

    /// Nothing to orchestrate
    #[error("no nodes to update")]
    NoNodes,
}

/// Errors while enumerating nodes from the flake
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// `nix flake show` did not succeed
    #[error("`{command}` failed: {error}")]
    CommandFailed {
        /// Command that was run
        command: String,
        /// Underlying error
        error: ExecError,
    },

    /// Output was not the expected JSON
    #[error("failed to parse flake description: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Why a single node ended up `Failed`
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum NodeError {
    /// A command for this node did not succeed
    #[error(transparent)]
    Command(#[from] ExecError),

    /// The worker for this node panicked
    #[error("worker panicked: {0}")]
    WorkerPanicked(String),

    /// The name would be parsed as an option by `ssh` or `nixos-rebuild`
    #[error("invalid node name {0:?}: must not start with '-'")]
    InvalidName(String),
}
