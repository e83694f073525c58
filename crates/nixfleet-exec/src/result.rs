//! Result types for command execution

use std::time::Duration;

use serde::Serialize;

use crate::error::ExecError;

/// Result of a single command execution
///
/// Failure is carried as data: a spawn error or non-zero exit shows up in
/// `error`, never as an `Err` from the runner.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    /// Exit status code, `None` if the process never ran or was killed
    pub status: Option<i32>,
    /// Captured stdout bytes
    pub stdout: Vec<u8>,
    /// Captured stderr bytes
    pub stderr: Vec<u8>,
    /// Time taken to execute
    pub duration: Duration,
    /// Set when the command did not succeed
    pub error: Option<ExecError>,
}

impl CommandResult {
    /// Result for a process that exited with `status`
    #[must_use]
    pub fn exited(status: i32, stdout: Vec<u8>, stderr: Vec<u8>, duration: Duration) -> Self {
        let error = (status != 0).then(|| ExecError::CommandFailed {
            status,
            stderr: String::from_utf8_lossy(&stderr).trim().to_string(),
        });

        Self {
            status: Some(status),
            stdout,
            stderr,
            duration,
            error,
        }
    }

    /// Result for a process that could not be run at all, or was killed
    #[must_use]
    pub fn failed(error: ExecError, duration: Duration) -> Self {
        Self {
            status: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            duration,
            error: Some(error),
        }
    }

    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none() && self.status == Some(0)
    }

    /// Stdout decoded lossily as UTF-8
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Stderr decoded lossily as UTF-8
    #[must_use]
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    /// Convert into a `Result` for callers that want `?`
    ///
    /// # Errors
    /// Returns the carried `ExecError` when the command did not succeed
    pub fn into_result(self) -> Result<Self, ExecError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self),
        }
    }
}
