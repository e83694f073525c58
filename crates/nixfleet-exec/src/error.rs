//! Error types for nixfleet-exec

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while running a command
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ExecError {
    /// Process could not be spawned (missing binary, bad working directory, ...)
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error while collecting output
    #[error("I/O error: {0}")]
    IoError(String),

    /// Process ran and exited non-zero
    #[error("command exited with status {status}: {stderr}")]
    CommandFailed {
        /// Exit status code
        status: i32,
        /// Stderr output
        stderr: String,
    },

    /// Process was killed by a signal and has no exit code
    #[error("command terminated by signal: {stderr}")]
    Terminated {
        /// Stderr output collected before termination
        stderr: String,
    },
}

impl ExecError {
    /// Exit status, if the process exited normally
    #[must_use]
    pub fn status(&self) -> Option<i32> {
        match self {
            ExecError::CommandFailed { status, .. } => Some(*status),
            _ => None,
        }
    }
}
