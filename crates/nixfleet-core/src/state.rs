//! Node update state machine types

use std::fmt;

use serde::{Deserialize, Serialize};

/// States a node passes through during one update run
///
/// ```text
/// Pending -> Probing -> Offline
///                    -> Applying -> Failed
///                                -> Applied -> RebootCheck -> RebootNotNeeded
///                                                          -> RebootNeeded -> RebootSkipped
///                                                                          -> RebootScheduled
///                                                                          -> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    Pending,
    Probing,
    Offline,
    Applying,
    Applied,
    RebootCheck,
    RebootNotNeeded,
    RebootNeeded,
    RebootSkipped,
    RebootScheduled,
    Failed,
}

impl NodeState {
    /// Whether `next` is a legal successor of this state
    #[must_use]
    pub fn can_transition_to(self, next: NodeState) -> bool {
        use NodeState::*;

        matches!(
            (self, next),
            (Pending, Probing)
                | (Probing, Offline | Applying)
                | (Applying, Applied | Failed)
                | (Applied, RebootCheck)
                | (RebootCheck, RebootNotNeeded | RebootNeeded)
                | (RebootNeeded, RebootSkipped | RebootScheduled | Failed)
        )
    }

    /// No further transitions happen from a terminal state
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeState::Offline
                | NodeState::Failed
                | NodeState::RebootNotNeeded
                | NodeState::RebootSkipped
                | NodeState::RebootScheduled
        )
    }

    /// Terminal states where the update was applied
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(
            self,
            NodeState::RebootNotNeeded | NodeState::RebootSkipped | NodeState::RebootScheduled
        )
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeState::Pending => "pending",
            NodeState::Probing => "probing",
            NodeState::Offline => "offline",
            NodeState::Applying => "applying",
            NodeState::Applied => "applied",
            NodeState::RebootCheck => "reboot_check",
            NodeState::RebootNotNeeded => "reboot_not_needed",
            NodeState::RebootNeeded => "reboot_needed",
            NodeState::RebootSkipped => "reboot_skipped",
            NodeState::RebootScheduled => "reboot_scheduled",
            NodeState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_is_legal() {
        let path = [
            NodeState::Pending,
            NodeState::Probing,
            NodeState::Applying,
            NodeState::Applied,
            NodeState::RebootCheck,
            NodeState::RebootNeeded,
            NodeState::RebootScheduled,
        ];

        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_terminal_states_have_no_successors() {
        use NodeState::*;
        let all = [
            Pending,
            Probing,
            Offline,
            Applying,
            Applied,
            RebootCheck,
            RebootNotNeeded,
            RebootNeeded,
            RebootSkipped,
            RebootScheduled,
            Failed,
        ];

        for from in all.iter().filter(|s| s.is_terminal()) {
            assert!(all.iter().all(|to| !from.can_transition_to(*to)));
        }
    }

    #[test]
    fn test_offline_is_not_success() {
        assert!(NodeState::Offline.is_terminal());
        assert!(!NodeState::Offline.is_success());
        assert!(!NodeState::Failed.is_success());
        assert!(!NodeState::Probing.can_transition_to(NodeState::Failed));
    }
}
