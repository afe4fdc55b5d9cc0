//! CLI output formatting

use crate::core::{LogEntry, NodeState, SessionStatus};
use crate::execution::RunnerEvent;
use console::Emoji;
use serde_json::Value;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static BRANCH: Emoji<'_, '_> = Emoji("🔀 ", "? ");

/// Format a session status for display
pub fn format_status(status: SessionStatus) -> String {
    match status {
        SessionStatus::Created => style("CREATED").dim().to_string(),
        SessionStatus::Running => style("RUNNING").yellow().to_string(),
        SessionStatus::Paused => style("PAUSED").blue().to_string(),
        SessionStatus::Completed => style("COMPLETED").green().to_string(),
        SessionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// Format a node state for display
pub fn format_node_state(state: &NodeState) -> String {
    match state {
        NodeState::Pending => style("PENDING").dim().to_string(),
        NodeState::Running { attempt, .. } => style(format!("RUNNING (attempt {})", attempt))
            .yellow()
            .to_string(),
        NodeState::Done { .. } => style("DONE").green().to_string(),
        NodeState::Skipped { .. } => style("SKIPPED").dim().to_string(),
        NodeState::Failed { .. } => style("FAILED").red().to_string(),
    }
}

/// Format a runner event for display
pub fn format_runner_event(event: &RunnerEvent) -> String {
    match event {
        RunnerEvent::SessionStarted {
            session_id,
            pipeline_id,
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_id).bold(),
            style(&session_id.to_string()[..8]).dim()
        ),
        RunnerEvent::SessionPaused { .. } => format!("{} Session paused", INFO),
        RunnerEvent::SessionResumed { .. } => format!("{} Session resumed", INFO),
        RunnerEvent::BranchSelected { branch, selected } => format!(
            "{} {} → {}",
            BRANCH,
            style(branch).dim(),
            style(selected).cyan()
        ),
        RunnerEvent::PipelineEntered { pipeline } => {
            format!("{} Entering {}", INFO, style(pipeline).bold())
        }
        RunnerEvent::PipelineExited { pipeline } => {
            format!("{} Leaving {}", INFO, style(pipeline).bold())
        }
        RunnerEvent::NodeStarted { node, attempt } => {
            if *attempt > 1 {
                format!(
                    "{} {} (attempt {})",
                    SPINNER,
                    style(node).cyan(),
                    style(attempt).dim()
                )
            } else {
                format!("{} {}", SPINNER, style(node).cyan())
            }
        }
        RunnerEvent::NodeOutput { node, value } => format!(
            "  {} {}",
            style(format!("{}:", node)).dim(),
            format_value(value, 80)
        ),
        RunnerEvent::NodeCompleted { node, attempts } => {
            if *attempts > 1 {
                format!(
                    "{} {} after {} attempts",
                    CHECK,
                    style(node).green(),
                    attempts
                )
            } else {
                format!("{} {}", CHECK, style(node).green())
            }
        }
        RunnerEvent::NodeSkipped { node } => {
            format!("{} {} skipped", INFO, style(node).dim())
        }
        RunnerEvent::NodeRetrying {
            node,
            attempt,
            max_retries,
            error,
        } => format!(
            "{} {} (retry {}/{}): {}",
            WARN,
            style(node).yellow(),
            attempt - 1,
            max_retries,
            style(error).dim()
        ),
        RunnerEvent::SessionFinished { session_id, status } => format!(
            "{} Session ({}) {}",
            match status {
                SessionStatus::Completed => CHECK,
                SessionStatus::Failed => CROSS,
                _ => INFO,
            },
            style(&session_id.to_string()[..8]).dim(),
            format_status(*status)
        ),
    }
}

/// Format a log entry for display
pub fn format_log_entry(index: usize, entry: &LogEntry) -> String {
    let attempts = if entry.attempts > 1 {
        style(format!(" ({} attempts)", entry.attempts)).dim().to_string()
    } else {
        String::new()
    };
    format!(
        "{:>3}. {} = {}{}",
        index + 1,
        style(&entry.path).bold(),
        format_value(&entry.result, 60),
        attempts
    )
}

/// Compact JSON rendering, truncated to `max_chars`
pub fn format_value(value: &Value, max_chars: usize) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() <= max_chars {
        rendered
    } else {
        let truncated: String = rendered.chars().take(max_chars).collect();
        format!("{}{}", truncated, style("…").dim())
    }
}
