//! Node liveness probe

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use nixfleet_exec::{CommandRunner, CommandSpec};

/// Token echoed by the remote shell
pub const PROBE_TOKEN: &str = "ping";

/// Checks whether a node answers over `ssh` within a bounded time
#[derive(Clone)]
pub struct NodeProber {
    runner: Arc<dyn CommandRunner>,
    connect_timeout: Duration,
}

impl NodeProber {
    pub fn new(runner: Arc<dyn CommandRunner>, connect_timeout: Duration) -> Self {
        Self {
            runner,
            connect_timeout,
        }
    }

    /// Remote echo used as the probe
    #[must_use]
    pub fn probe_command(&self, node: &str) -> CommandSpec {
        CommandSpec::remote(node, format!("echo {PROBE_TOKEN}"))
            .with_connect_timeout(self.connect_timeout)
    }

    /// True iff the echo exits zero and its output contains the token
    ///
    /// Transport errors, timeouts and unexpected output all read as offline.
    #[instrument(skip(self), level = "debug")]
    pub async fn is_online(&self, node: &str) -> bool {
        let result = self.runner.run(self.probe_command(node)).await;

        if let Some(error) = &result.error {
            debug!(node, error = %error, "node did not answer probe");
            return false;
        }

        let online = result.stdout_lossy().contains(PROBE_TOKEN);
        if !online {
            debug!(node, stdout = %result.stdout_lossy(), "probe output missing token");
        }
        online
    }
}
