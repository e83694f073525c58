//! Process execution using `tokio::process`

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::error::ExecError;
use crate::result::CommandResult;
use crate::spec::CommandSpec;
use crate::traits::CommandRunner;

/// Runs commands as child processes of this one
///
/// Remote commands are run the same way: their argv already starts with
/// the remote-access client.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Create a new process runner
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[instrument(skip(self, spec), fields(command = %spec), level = "debug")]
    async fn execute(&self, spec: &CommandSpec) -> CommandResult {
        let start = Instant::now();
        let argv = spec.argv();

        debug!(argv = ?argv, "running command");

        let mut command = Command::new(&argv[0]);
        command
            .args(&argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(dir) = spec.current_dir() {
            command.current_dir(dir);
        }
        for (key, value) in spec.env() {
            command.env(key, value);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                debug!(error = %e, "spawn failed");
                return CommandResult::failed(ExecError::SpawnError(e.to_string()), start.elapsed());
            }
        };

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => {
                return CommandResult::failed(ExecError::IoError(e.to_string()), start.elapsed());
            }
        };

        let duration = start.elapsed();

        let Some(status) = output.status.code() else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            debug!(duration = ?duration, "command terminated by signal");
            return CommandResult {
                status: None,
                stdout: output.stdout,
                stderr: output.stderr,
                duration,
                error: Some(ExecError::Terminated { stderr }),
            };
        };

        debug!(status, duration = ?duration, "command completed");
        if status != 0 {
            debug!(
                stdout = %String::from_utf8_lossy(&output.stdout),
                stderr = %String::from_utf8_lossy(&output.stderr),
                "command failed"
            );
        }

        CommandResult::exited(status, output.stdout, output.stderr, duration)
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, spec: CommandSpec) -> CommandResult {
        self.execute(&spec).await
    }

    fn runner_type(&self) -> &'static str {
        "process"
    }
}
