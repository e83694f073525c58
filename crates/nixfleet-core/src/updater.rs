//! `NodeUpdater`: per-node update state machine
//!
//! Probes the node, applies the flake configuration with `nixos-rebuild`,
//! asks the reboot oracle and schedules a reboot when allowed.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use nixfleet_exec::{CommandRunner, CommandSpec, ExecError};

use crate::config::UpdaterConfig;
use crate::error::NodeError;
use crate::event::FleetEvent;
use crate::probe::NodeProber;
use crate::reboot::{REBOOT_COMMAND, RebootCheck, RebootOracle};
use crate::report::{NodeFailure, NodeOutcome};
use crate::state::NodeState;

/// Arguments for building a `NodeUpdater`
pub struct NodeUpdaterArgs {
    /// Node identity, used as flake attribute and `ssh` target
    pub node: String,
    /// Update settings
    pub config: UpdaterConfig,
    /// Runner for every command this node issues
    pub runner: Arc<dyn CommandRunner>,
    /// Progress event sender
    pub event_tx: broadcast::Sender<FleetEvent>,
}

/// Drives one node from `Pending` to a terminal state
pub struct NodeUpdater {
    node: String,
    config: UpdaterConfig,
    runner: Arc<dyn CommandRunner>,
    prober: NodeProber,
    oracle: RebootOracle,
    event_tx: broadcast::Sender<FleetEvent>,
    state: NodeState,
    states: Vec<NodeState>,
}

impl NodeUpdater {
    #[must_use]
    pub fn new(args: NodeUpdaterArgs) -> Self {
        let prober = NodeProber::new(args.runner.clone(), args.config.connect_timeout);
        let oracle = RebootOracle::new(args.runner.clone());

        Self {
            node: args.node,
            config: args.config,
            runner: args.runner,
            prober,
            oracle,
            event_tx: args.event_tx,
            state: NodeState::Pending,
            states: vec![NodeState::Pending],
        }
    }

    #[must_use]
    pub fn node(&self) -> &str {
        &self.node
    }

    #[must_use]
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// `nixos-rebuild` invocation that builds and switches this node
    #[must_use]
    pub fn apply_command(&self) -> CommandSpec {
        CommandSpec::new("nixos-rebuild").args([
            "--flake".to_string(),
            format!("{}#{}", self.config.flake, self.node),
            "switch".to_string(),
            "--target-host".to_string(),
            self.node.clone(),
            "--use-remote-sudo".to_string(),
            "--use-substitutes".to_string(),
        ])
    }

    /// Delayed reboot on this node
    #[must_use]
    pub fn reboot_command(&self) -> CommandSpec {
        CommandSpec::remote(&self.node, REBOOT_COMMAND)
    }

    fn transition_to(&mut self, next: NodeState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {} -> {next}",
            self.state
        );

        let from = self.state;
        self.state = next;
        self.states.push(next);

        debug!(node = %self.node, %from, to = %next, "state transition");

        // No subscribers is fine
        let _ = self.event_tx.send(FleetEvent::StateChanged {
            node: self.node.clone(),
            from,
            to: next,
        });
    }

    /// Run the node to completion
    #[instrument(skip(self), fields(node = %self.node))]
    pub async fn run(mut self) -> NodeOutcome {
        let started_at = Utc::now();
        let _ = self.event_tx.send(FleetEvent::NodeStarted {
            node: self.node.clone(),
        });

        let (failure, warning) = self.drive().await;

        let outcome = NodeOutcome {
            node: self.node.clone(),
            state: self.state,
            failure,
            warning,
            states: std::mem::take(&mut self.states),
            started_at,
            finished_at: Utc::now(),
        };

        let _ = self.event_tx.send(FleetEvent::NodeFinished {
            outcome: outcome.clone(),
        });

        outcome
    }

    async fn drive(&mut self) -> (Option<NodeFailure>, Option<String>) {
        self.transition_to(NodeState::Probing);
        info!(node = %self.node, "checking if node is online");

        if !self.prober.is_online(&self.node).await {
            warn!(node = %self.node, "node is offline, skipping");
            self.transition_to(NodeState::Offline);
            return (None, None);
        }

        self.transition_to(NodeState::Applying);
        info!(node = %self.node, "node is online, running updates");

        let apply = self.apply_command();
        let command = apply.to_string();
        let result = self.runner.run(apply).await;
        debug!(node = %self.node, stdout = %result.stdout_lossy(), "nixos-rebuild output");

        if let Some(error) = result.error {
            return (Some(self.fail(command, error)), None);
        }

        self.transition_to(NodeState::Applied);
        info!(node = %self.node, "updates have completed");

        self.transition_to(NodeState::RebootCheck);
        match self.oracle.check(&self.node).await {
            RebootCheck::NotRequired => {
                self.transition_to(NodeState::RebootNotNeeded);
                (None, None)
            }
            RebootCheck::Indeterminate(error) => {
                // Treated as "not needed" so the run is not blocked
                let warning = format!("reboot check failed, assuming no reboot needed: {error}");
                self.transition_to(NodeState::RebootNotNeeded);
                (None, Some(warning))
            }
            RebootCheck::Required => {
                self.transition_to(NodeState::RebootNeeded);
                warn!(node = %self.node, "reboot is required");
                (self.reboot().await, None)
            }
        }
    }

    async fn reboot(&mut self) -> Option<NodeFailure> {
        if !self.config.reboot {
            self.transition_to(NodeState::RebootSkipped);
            return None;
        }

        let reboot = self.reboot_command();
        let command = reboot.to_string();
        let result = self.runner.run(reboot).await;

        if let Some(error) = result.error {
            return Some(self.fail(command, error));
        }

        self.transition_to(NodeState::RebootScheduled);
        warn!(node = %self.node, "reboot scheduled in 1 minute");
        None
    }

    fn fail(&mut self, command: String, error: ExecError) -> NodeFailure {
        error!(
            node = %self.node,
            command = %command,
            error = %error,
            "error updating node"
        );
        self.transition_to(NodeState::Failed);

        NodeFailure {
            command: Some(command),
            error: NodeError::Command(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Reply, ScriptedRunner};

    fn updater(
        rules: Vec<(&'static str, Reply)>,
        reboot: bool,
    ) -> (NodeUpdater, Arc<ScriptedRunner>, broadcast::Receiver<FleetEvent>) {
        let runner = Arc::new(ScriptedRunner::new(rules));
        let (event_tx, event_rx) = broadcast::channel(64);
        let updater = NodeUpdater::new(NodeUpdaterArgs {
            node: "web1".to_string(),
            config: UpdaterConfig {
                reboot,
                ..UpdaterConfig::default()
            },
            runner: runner.clone(),
            event_tx,
        });
        (updater, runner, event_rx)
    }

    #[test]
    fn test_apply_command() {
        let (updater, _, _) = updater(Vec::new(), false);

        assert_eq!(
            updater.apply_command().to_string(),
            "nixos-rebuild --flake .#web1 switch --target-host web1 --use-remote-sudo --use-substitutes"
        );
        assert_eq!(updater.state(), NodeState::Pending);
    }

    #[tokio::test]
    async fn test_offline_node_issues_nothing_else() {
        let (updater, runner, _) = updater(vec![("echo ping", Reply::Exit(255, ""))], true);

        let outcome = updater.run().await;

        assert_eq!(outcome.state, NodeState::Offline);
        assert_eq!(
            outcome.states,
            vec![NodeState::Pending, NodeState::Probing, NodeState::Offline]
        );
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_failure() {
        let (updater, runner, _) = updater(
            vec![
                ("echo ping", Reply::Exit(0, "ping")),
                ("nixos-rebuild", Reply::Exit(1, "")),
            ],
            true,
        );

        let outcome = updater.run().await;

        assert_eq!(outcome.state, NodeState::Failed);
        let failure = outcome.failure.unwrap();
        assert!(failure.command.unwrap().starts_with("nixos-rebuild --flake .#web1"));
        assert!(matches!(
            failure.error,
            NodeError::Command(ExecError::CommandFailed { status: 1, .. })
        ));
        assert!(!outcome.states.contains(&NodeState::RebootCheck));
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_reboot_scheduled() {
        let (updater, runner, _) = updater(
            vec![
                ("echo ping", Reply::Exit(0, "ping")),
                ("readlink", Reply::Exit(1, "")),
            ],
            true,
        );

        let outcome = updater.run().await;

        assert_eq!(outcome.state, NodeState::RebootScheduled);
        let reboots: Vec<_> = runner
            .calls()
            .into_iter()
            .filter(|c| c.command_line() == REBOOT_COMMAND)
            .collect();
        assert_eq!(reboots.len(), 1);
        assert_eq!(reboots[0].host(), Some("web1"));
    }

    #[tokio::test]
    async fn test_reboot_skipped_without_flag() {
        let (updater, runner, _) = updater(
            vec![
                ("echo ping", Reply::Exit(0, "ping")),
                ("readlink", Reply::Exit(1, "")),
            ],
            false,
        );

        let outcome = updater.run().await;

        assert_eq!(outcome.state, NodeState::RebootSkipped);
        assert!(outcome.visited(NodeState::RebootNeeded));
        assert!(
            runner
                .calls()
                .iter()
                .all(|c| c.command_line() != REBOOT_COMMAND)
        );
    }

    #[tokio::test]
    async fn test_failed_reboot_command_fails_node() {
        let (updater, _, _) = updater(
            vec![
                ("echo ping", Reply::Exit(0, "ping")),
                ("readlink", Reply::Exit(1, "")),
                ("shutdown", Reply::Exit(1, "")),
            ],
            true,
        );

        let outcome = updater.run().await;

        assert_eq!(outcome.state, NodeState::Failed);
        assert!(outcome.failure.unwrap().command.unwrap().contains("shutdown -r +1"));
    }

    #[tokio::test]
    async fn test_indeterminate_check_warns() {
        let (updater, _, _) = updater(
            vec![
                ("echo ping", Reply::Exit(0, "ping")),
                ("readlink", Reply::Exit(2, "")),
            ],
            true,
        );

        let outcome = updater.run().await;

        assert_eq!(outcome.state, NodeState::RebootNotNeeded);
        assert!(outcome.warning.unwrap().contains("reboot check failed"));
    }

    #[tokio::test]
    async fn test_events_follow_transitions() {
        let (updater, _, mut rx) = updater(vec![("echo ping", Reply::Exit(0, "ping"))], false);

        let outcome = updater.run().await;
        assert_eq!(outcome.state, NodeState::RebootNotNeeded);

        let mut transitions = Vec::new();
        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                FleetEvent::StateChanged { to, .. } => transitions.push(to),
                FleetEvent::NodeFinished { outcome } => {
                    finished = outcome.node == "web1";
                }
                FleetEvent::NodeStarted { .. } => {}
            }
        }

        assert!(finished);
        assert_eq!(transitions, outcome.states[1..].to_vec());
    }
}
