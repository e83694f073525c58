//! Per-node outcomes and the aggregate fleet report

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::NodeError;
use crate::state::NodeState;

/// Command and error that sent a node to `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeFailure {
    /// Command line that failed, if a command was involved
    pub command: Option<String>,
    /// Underlying error
    pub error: NodeError,
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.command {
            Some(command) => write!(f, "`{command}`: {}", self.error),
            None => write!(f, "{}", self.error),
        }
    }
}

/// Terminal result of one node's run
#[derive(Debug, Clone, Serialize)]
pub struct NodeOutcome {
    /// Node identity
    pub node: String,
    /// Terminal state reached
    pub state: NodeState,
    /// Set when `state` is `Failed`
    pub failure: Option<NodeFailure>,
    /// Anomalies that did not change control flow
    pub warning: Option<String>,
    /// Every state visited, starting with `Pending`
    pub states: Vec<NodeState>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl NodeOutcome {
    /// Outcome for a node whose worker died before reporting
    #[must_use]
    pub fn panicked(node: impl Into<String>, message: impl Into<String>) -> Self {
        Self::not_run(node.into(), NodeError::WorkerPanicked(message.into()))
    }

    /// Outcome for a node name that was refused without issuing any command
    #[must_use]
    pub fn invalid_name(node: impl Into<String>) -> Self {
        let node = node.into();
        let error = NodeError::InvalidName(node.clone());
        Self::not_run(node, error)
    }

    fn not_run(node: String, error: NodeError) -> Self {
        let now = Utc::now();
        Self {
            node,
            state: NodeState::Failed,
            failure: Some(NodeFailure {
                command: None,
                error,
            }),
            warning: None,
            states: vec![NodeState::Pending, NodeState::Failed],
            started_at: now,
            finished_at: now,
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.state == NodeState::Failed
    }

    /// Whether the given state was visited during the run
    #[must_use]
    pub fn visited(&self, state: NodeState) -> bool {
        self.states.contains(&state)
    }

    /// Short status for report lines
    #[must_use]
    pub fn status_line(&self) -> String {
        match self.state {
            NodeState::Offline => "skipped, node unreachable".to_string(),
            NodeState::RebootNotNeeded => "updated".to_string(),
            NodeState::RebootSkipped => "updated, reboot required but not performed".to_string(),
            NodeState::RebootScheduled => "updated, reboot scheduled".to_string(),
            NodeState::Failed => match &self.failure {
                Some(failure) => format!("failed: {failure}"),
                None => "failed".to_string(),
            },
            other => format!("stopped in non-terminal state {other}"),
        }
    }
}

/// Counts per terminal class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FleetSummary {
    pub total: usize,
    pub updated: usize,
    pub offline: usize,
    pub failed: usize,
    pub reboot_scheduled: usize,
    pub reboot_skipped: usize,
}

/// One outcome per requested node, in request order
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub outcomes: Vec<NodeOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl FleetReport {
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcome for a node, if it was part of the run
    #[must_use]
    pub fn get(&self, node: &str) -> Option<&NodeOutcome> {
        self.outcomes.iter().find(|o| o.node == node)
    }

    /// Any node ended `Failed`
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.outcomes.iter().any(NodeOutcome::is_failure)
    }

    #[must_use]
    pub fn summary(&self) -> FleetSummary {
        let mut summary = FleetSummary {
            total: self.outcomes.len(),
            ..FleetSummary::default()
        };

        for outcome in &self.outcomes {
            match outcome.state {
                NodeState::Offline => summary.offline += 1,
                NodeState::Failed => summary.failed += 1,
                state if state.is_success() => {
                    summary.updated += 1;
                    if state == NodeState::RebootScheduled {
                        summary.reboot_scheduled += 1;
                    } else if state == NodeState::RebootSkipped {
                        summary.reboot_skipped += 1;
                    }
                }
                _ => {}
            }
        }

        summary
    }
}
