//! Human-readable progress and report output

use std::fmt::Write;

use nixfleet_core::{FleetEvent, FleetReport, NodeState, PackageReport};

/// Progress line for an event, if it is worth showing
pub fn event_line(event: &FleetEvent) -> Option<String> {
    let FleetEvent::StateChanged { to, .. } = event else {
        return None;
    };
    let node = event.node();

    let line = match to {
        NodeState::Probing => format!("checking if node {node} is online..."),
        NodeState::Offline => format!("node {node} is offline, skipping"),
        NodeState::Applying => format!("node {node} is online, running updates..."),
        NodeState::Applied => format!("updates have completed for node {node}"),
        NodeState::RebootNeeded => format!("reboot is required for node {node}"),
        NodeState::RebootScheduled => format!("reboot scheduled in 1 minute for node {node}"),
        NodeState::Failed => format!("error updating node {node}"),
        _ => return None,
    };
    Some(line)
}

/// One line per node followed by a summary
pub fn report_text(report: &FleetReport) -> String {
    let width = report
        .outcomes
        .iter()
        .map(|o| o.node.len())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for outcome in &report.outcomes {
        let _ = writeln!(out, "{:width$}  {}", outcome.node, outcome.status_line());
        if let Some(warning) = &outcome.warning {
            let _ = writeln!(out, "{:width$}  warning: {warning}", "");
        }
    }

    let summary = report.summary();
    let _ = write!(
        out,
        "{} nodes: {} updated ({} reboot scheduled, {} reboot pending), {} offline, {} failed",
        summary.total,
        summary.updated,
        summary.reboot_scheduled,
        summary.reboot_skipped,
        summary.offline,
        summary.failed,
    );
    out
}

pub fn package_text(report: &PackageReport) -> String {
    let mut out = String::new();
    for name in &report.updated {
        let _ = writeln!(out, "{name}  updated");
    }
    for name in &report.failed {
        let _ = writeln!(out, "{name}  failed");
    }
    let _ = write!(
        out,
        "{} packages: {} updated, {} failed",
        report.updated.len() + report.failed.len(),
        report.updated.len(),
        report.failed.len()
    );
    out
}
