//! Progress events published while a fleet update runs

use crate::report::NodeOutcome;
use crate::state::NodeState;

/// Operator-facing progress for one node
#[derive(Debug, Clone)]
pub enum FleetEvent {
    /// A worker picked up the node
    NodeStarted { node: String },
    /// The node moved to a new state
    StateChanged {
        node: String,
        from: NodeState,
        to: NodeState,
    },
    /// The node reached a terminal state
    NodeFinished { outcome: NodeOutcome },
}

impl FleetEvent {
    /// Node this event is about
    #[must_use]
    pub fn node(&self) -> &str {
        match self {
            FleetEvent::NodeStarted { node } | FleetEvent::StateChanged { node, .. } => node,
            FleetEvent::NodeFinished { outcome } => &outcome.node,
        }
    }
}
