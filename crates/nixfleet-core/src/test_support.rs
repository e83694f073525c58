//! Scripted command runner for unit tests

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use nixfleet_exec::{CommandResult, CommandRunner, CommandSpec, ExecError};

/// Canned reply for the first rule whose pattern appears in the rendered command
pub(crate) enum Reply {
    Exit(i32, &'static str),
    Spawn(&'static str),
}

pub(crate) struct ScriptedRunner {
    rules: Vec<(&'static str, Reply)>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl ScriptedRunner {
    pub(crate) fn new(rules: Vec<(&'static str, Reply)>) -> Self {
        Self {
            rules,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, spec: CommandSpec) -> CommandResult {
        let rendered = spec.to_string();
        self.calls.lock().unwrap().push(spec);

        let reply = self
            .rules
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern))
            .map(|(_, reply)| reply);

        match reply {
            Some(Reply::Exit(status, stdout)) => CommandResult::exited(
                *status,
                stdout.as_bytes().to_vec(),
                Vec::new(),
                Duration::ZERO,
            ),
            Some(Reply::Spawn(message)) => {
                CommandResult::failed(ExecError::SpawnError((*message).to_string()), Duration::ZERO)
            }
            None => CommandResult::exited(0, Vec::new(), Vec::new(), Duration::ZERO),
        }
    }

    fn runner_type(&self) -> &'static str {
        "scripted"
    }
}
