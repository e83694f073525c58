//! Remote execution through the OpenSSH client
//!
//! Authentication, host resolution and known-hosts handling all belong to the
//! client and the user's `~/.ssh/config`. This module only shapes the argv:
//! options first, then the host as the first positional argument, then the
//! literal command string for the remote shell.

use std::time::Duration;

/// Remote-access client binary
pub const SSH_CLIENT: &str = "ssh";

/// Build the argv that runs `command` on `host`
#[must_use]
pub fn wrap(host: &str, connect_timeout: Option<Duration>, command: &str) -> Vec<String> {
    let mut argv = vec![SSH_CLIENT.to_string()];

    if let Some(timeout) = connect_timeout {
        argv.push("-o".to_string());
        argv.push(connect_timeout_option(timeout));
    }

    argv.push(host.to_string());
    argv.push(command.to_string());
    argv
}

/// `ConnectTimeout` takes whole seconds; anything below one second rounds up
fn connect_timeout_option(timeout: Duration) -> String {
    let secs = timeout.as_secs().max(1);
    format!("ConnectTimeout={secs}")
}
