//! Plain-text rendering of scheduler events

use tormask_core::traits::TIMESTAMP_FORMAT;
use tormask_core::{Command, SchedulerEvent};

/// Status lines for one event
pub fn render(event: &SchedulerEvent) -> Vec<String> {
    match event {
        SchedulerEvent::Started {
            interval,
            log_location,
        } => vec![
            format!(
                "Rotating identity every {}s, logging to {}",
                interval.as_secs(),
                log_location
            ),
            "Type h and Enter for commands.".to_string(),
        ],

        SchedulerEvent::RotationSucceeded { entry, rotations } => {
            let id = &entry.identity;
            let mut lines = vec![format!(
                "[{}] #{} {}",
                entry.timestamp.format(TIMESTAMP_FORMAT),
                rotations,
                id.address
            )];
            if id.is_geolocated() {
                lines.push(format!("    {}, {} ({})", id.city, id.region, id.country));
                lines.push(format!("    {} | {}", id.isp, id.timezone));
            } else {
                lines.push("    location unknown".to_string());
            }
            lines
        }

        SchedulerEvent::RotationFailed { stage, error } => {
            vec![format!("Rotation skipped ({}): {}", stage, error)]
        }

        SchedulerEvent::LogWriteFailed { error } => {
            vec![format!("Could not write change log: {}", error)]
        }

        SchedulerEvent::Statistics(summary) => vec![
            format!(
                "Session started {}",
                summary.started.format(TIMESTAMP_FORMAT)
            ),
            format!("Running for {}", summary.elapsed_hms()),
            format!(
                "Rotations: {} ok, {} failed, {} not logged",
                summary.rotations, summary.failed_rotations, summary.log_write_failures
            ),
        ],

        SchedulerEvent::RecentLog { location, lines } => {
            if lines.is_empty() {
                return vec![format!("No identity changes in {} yet", location)];
            }
            let mut out = vec![format!("Last {} change(s) in {}:", lines.len(), location)];
            out.extend(lines.iter().map(|l| format!("    {}", l)));
            out
        }

        SchedulerEvent::RecentLogFailed { error } => {
            vec![format!("Could not read change log: {}", error)]
        }

        SchedulerEvent::Help => Command::HELP
            .iter()
            .map(|(key, description)| format!("  {}  {}", key, description))
            .collect(),

        SchedulerEvent::Stopped { reason, summary } => vec![format!(
            "Stopped ({}) after {} with {} rotation(s)",
            reason,
            summary.elapsed_hms(),
            summary.rotations
        )],

        SchedulerEvent::DaemonStopFailed { error } => {
            vec![format!("Could not stop daemon: {}", error)]
        }
    }
}
