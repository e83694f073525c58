//! Command specification

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ssh;

/// Where a command runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// On this machine
    Local,
    /// On a remote host, through the remote-access client
    Remote {
        /// Host identity handed to the remote-access client
        host: String,
        /// Connection timeout passed to the client, if any
        connect_timeout: Option<Duration>,
    },
}

/// A command to run, built once and handed to a [`CommandRunner`](crate::CommandRunner)
///
/// For local targets `program` and `args` become the process argv directly.
/// For remote targets they are joined into the literal command string that
/// the remote shell executes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    env: Vec<(String, String)>,
    target: Target,
}

impl CommandSpec {
    /// Local command running `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            target: Target::Local,
        }
    }

    /// Command string executed by the shell on `host`
    pub fn remote(host: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            program: command.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
            target: Target::Remote {
                host: host.into(),
                connect_timeout: None,
            },
        }
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory of the spawned process
    #[must_use]
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Add an environment variable on top of the inherited environment
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Set the connect timeout for a remote command; no-op for local ones
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        if let Target::Remote {
            connect_timeout, ..
        } = &mut self.target
        {
            *connect_timeout = Some(timeout);
        }
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn env(&self) -> &[(String, String)] {
        &self.env
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Remote host, if this command targets one
    pub fn host(&self) -> Option<&str> {
        match &self.target {
            Target::Local => None,
            Target::Remote { host, .. } => Some(host),
        }
    }

    /// Program and arguments joined by spaces, without any remote wrapping
    #[must_use]
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }

    /// Full argv handed to the OS, including the remote-access client for
    /// remote targets
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        match &self.target {
            Target::Local => {
                let mut argv = Vec::with_capacity(self.args.len() + 1);
                argv.push(self.program.clone());
                argv.extend(self.args.iter().cloned());
                argv
            }
            Target::Remote {
                host,
                connect_timeout,
            } => ssh::wrap(host, *connect_timeout, &self.command_line()),
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.argv().join(" "))
    }
}
