//! `FleetOrchestrator`: fleet-wide fan-out and fan-in
//!
//! Spawns one task per node, each returning its own `NodeOutcome` through its
//! `JoinHandle`. Handles are awaited in request order, so the report lines up
//! with the request and no slot is ever shared between workers.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use nixfleet_exec::CommandRunner;

use crate::config::FleetConfig;
use crate::event::FleetEvent;
use crate::report::{FleetReport, NodeOutcome};
use crate::updater::{NodeUpdater, NodeUpdaterArgs};

/// Runs node updates across the fleet
pub struct FleetOrchestrator {
    config: FleetConfig,
    runner: Arc<dyn CommandRunner>,
    event_tx: broadcast::Sender<FleetEvent>,
}

impl FleetOrchestrator {
    pub fn new(config: FleetConfig, runner: Arc<dyn CommandRunner>) -> Self {
        let (event_tx, _) = broadcast::channel(config.event_channel_capacity.max(1));

        Self {
            config,
            runner,
            event_tx,
        }
    }

    /// Get a receiver for progress events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<FleetEvent> {
        self.event_tx.subscribe()
    }

    /// Update every node and wait for all of them
    ///
    /// Duplicate names are collapsed. A failing node never stops its
    /// siblings; the report holds exactly one outcome per distinct node.
    #[instrument(skip(self, nodes), fields(nodes = nodes.len()))]
    pub async fn run(&self, nodes: &[String], reboot: bool) -> FleetReport {
        let started_at = Utc::now();
        let nodes = distinct(nodes);
        let updater_config = self.config.updater(reboot);
        let limit = (self.config.max_parallel > 0)
            .then(|| Arc::new(Semaphore::new(self.config.max_parallel)));

        info!(
            total_nodes = nodes.len(),
            max_parallel = self.config.max_parallel,
            runner = self.runner.runner_type(),
            reboot,
            "starting fleet update"
        );

        let mut slots = Vec::with_capacity(nodes.len());
        for node in &nodes {
            if is_option_like(node) {
                error!(node = %node, "node name would be read as an option, skipping");
                let outcome = NodeOutcome::invalid_name(node.as_str());
                let _ = self.event_tx.send(FleetEvent::NodeFinished {
                    outcome: outcome.clone(),
                });
                slots.push((node.clone(), Slot::Done(outcome)));
                continue;
            }

            let updater = NodeUpdater::new(NodeUpdaterArgs {
                node: node.clone(),
                config: updater_config.clone(),
                runner: self.runner.clone(),
                event_tx: self.event_tx.clone(),
            });
            info!(node = %updater.node(), "running updates on node");
            let limit = limit.clone();

            let handle = tokio::spawn(async move {
                // The semaphore is never closed, so acquire cannot fail
                let _permit = match limit {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                updater.run().await
            });

            slots.push((node.clone(), Slot::Running(handle)));
        }

        let mut outcomes = Vec::with_capacity(slots.len());
        for (node, slot) in slots {
            let handle = match slot {
                Slot::Running(handle) => handle,
                Slot::Done(outcome) => {
                    outcomes.push(outcome);
                    continue;
                }
            };
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    error!(node = %node, error = %e, "node worker panicked");
                    outcomes.push(NodeOutcome::panicked(node, e.to_string()));
                }
            }
        }

        let report = FleetReport {
            outcomes,
            started_at,
            finished_at: Utc::now(),
        };

        for outcome in report.outcomes.iter().filter(|o| o.is_failure()) {
            error!(node = %outcome.node, "error updating node");
        }

        let summary = report.summary();
        info!(
            total = summary.total,
            updated = summary.updated,
            offline = summary.offline,
            failed = summary.failed,
            "fleet update finished"
        );

        report
    }
}

/// Where a node's outcome will come from
enum Slot {
    Running(JoinHandle<NodeOutcome>),
    Done(NodeOutcome),
}

/// `ssh` and `nixos-rebuild` would take a leading `-` as an option
fn is_option_like(node: &str) -> bool {
    node.starts_with('-')
}

/// Request order with repeats removed
fn distinct(nodes: &[String]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(nodes.len());
    nodes
        .iter()
        .filter(|n| seen.insert(n.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::state::NodeState;
    use crate::test_support::{Reply, ScriptedRunner};

    #[test]
    fn test_distinct_keeps_first_seen_order() {
        let nodes = ["b", "a", "b", "c", "a"].map(String::from);
        assert_eq!(distinct(&nodes), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn test_option_like_name_fails_without_commands() {
        let runner = Arc::new(ScriptedRunner::new(vec![("echo ping", Reply::Exit(0, "ping"))]));
        let orchestrator = FleetOrchestrator::new(FleetConfig::default(), runner.clone());
        let mut events = orchestrator.subscribe();

        let nodes = ["-oProxyCommand=touch /tmp/x", "web1"].map(String::from);
        let report = orchestrator.run(&nodes, false).await;

        assert_eq!(report.len(), 2);
        let rejected = &report.outcomes[0];
        assert_eq!(rejected.state, NodeState::Failed);
        assert!(matches!(
            rejected.failure.as_ref().map(|f| &f.error),
            Some(NodeError::InvalidName(name)) if name == "-oProxyCommand=touch /tmp/x"
        ));
        assert_eq!(report.outcomes[1].state, NodeState::RebootNotNeeded);
        assert!(report.has_failures());

        // Only web1 reached the runner
        let calls = runner.calls();
        assert!(!calls.is_empty());
        assert!(calls.iter().all(|c| !c.to_string().contains("ProxyCommand")));

        let mut finished = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let FleetEvent::NodeFinished { outcome } = event {
                finished.push(outcome.node);
            }
        }
        finished.sort();
        assert_eq!(finished, vec!["-oProxyCommand=touch /tmp/x", "web1"]);
    }

    #[tokio::test]
    async fn test_empty_fleet() {
        let runner = Arc::new(ScriptedRunner::new(Vec::new()));
        let orchestrator = FleetOrchestrator::new(FleetConfig::default(), runner.clone());

        let report = orchestrator.run(&[], true).await;

        assert!(report.is_empty());
        assert!(!report.has_failures());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_duplicates_collapsed() {
        let runner = Arc::new(ScriptedRunner::new(vec![("echo ping", Reply::Exit(0, "ping"))]));
        let orchestrator = FleetOrchestrator::new(FleetConfig::default(), runner);

        let nodes = ["web1", "web1", "web2"].map(String::from);
        let report = orchestrator.run(&nodes, false).await;

        assert_eq!(report.len(), 2);
        assert_eq!(report.outcomes[0].node, "web1");
        assert_eq!(report.outcomes[1].node, "web2");
        assert!(
            report
                .outcomes
                .iter()
                .all(|o| o.state == NodeState::RebootNotNeeded)
        );
    }
}
