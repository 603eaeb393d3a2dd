use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::features::sync::{PendingOperation, QueueStats, SyncStatus};

/// Format a list of operations as a pretty table
pub fn format_operations_pretty(operations: &[PendingOperation], title: &str, max_attempts: u32) -> String {
    if operations.is_empty() {
        return format!("{title} (0 items)\n  No operations queued");
    }

    let mut output = format!("{title} ({} items)\n", operations.len());
    output.push_str(&"─".repeat(78));
    output.push('\n');
    output.push_str(&format!(
        "{:<36}  {:<22} {:>4}  {:<16} {}\n",
        "ID", "Type", "Prio", "Queued", "Tries"
    ));
    output.push_str(&"─".repeat(78));
    output.push('\n');

    for op in operations {
        let tries = format!("{}/{max_attempts}", op.retry_count);
        let tries = if op.is_exhausted(max_attempts) {
            tries.red()
        } else if op.retry_count > 0 {
            tries.yellow()
        } else {
            tries.normal()
        };

        output.push_str(&format!(
            "{:<36}  {:<22} {:>4}  {:<16} {}\n",
            op.id,
            op.operation_type().display_name(),
            op.priority,
            op.timestamp.format("%Y-%m-%d %H:%M"),
            tries
        ));

        if let Some(error) = &op.error {
            output.push_str(&format!("  {}\n", truncate(error, 74).red()));
        }
    }

    output
}

/// Format a single operation as pretty output
pub fn format_operation_pretty(op: &PendingOperation) -> String {
    let mut output = format!("{}\n", op.operation_type().display_name().bold());
    output.push_str(&format!("  {}: {}\n", "ID".dimmed(), op.id));
    output.push_str(&format!("  {}: {}\n", "Priority".dimmed(), op.priority));
    output.push_str(&format!("  {}: {}\n", "Queued".dimmed(), op.timestamp.to_rfc3339()));
    output.push_str(&format!("  {}: {}\n", "Retries".dimmed(), op.retry_count));

    if let Some(target) = op.operation.target_id() {
        output.push_str(&format!("  {}: {}\n", "Target".dimmed(), target));
    }
    if let Some(at) = op.last_attempt {
        output.push_str(&format!("  {}: {}\n", "Last attempt".dimmed(), at.to_rfc3339()));
    }
    if let Some(error) = &op.error {
        output.push_str(&format!("  {}: {}\n", "Error".dimmed(), error.red()));
    }

    output
}

/// Format queue statistics and sync status
pub fn format_status_pretty(stats: &QueueStats, status: &SyncStatus) -> String {
    let mut lines = Vec::new();

    lines.push("Sync Queue Status".bold().to_string());
    lines.push("─".repeat(40));

    lines.push(format!("  Queued:     {}", stats.total));
    lines.push(format!(
        "  Retryable:  {} {}",
        stats.retryable,
        if stats.retryable > 0 {
            "ready for the next pass".dimmed()
        } else {
            "".dimmed()
        }
    ));
    if stats.waiting > 0 {
        lines.push(format!(
            "  Waiting:    {} {}",
            stats.waiting,
            "failed recently".yellow()
        ));
    }
    lines.push(format!(
        "  Failed:     {} {}",
        stats.failed,
        if stats.failed > 0 {
            "operations need attention".red()
        } else {
            "".normal()
        }
    ));

    if let Some(oldest) = stats.oldest_pending {
        lines.push(format!("  Oldest:     {}", relative_age(oldest).dimmed()));
    }

    let last_sync = status
        .last_sync_time
        .map_or_else(|| "never".to_string(), relative_age);
    lines.push(format!("  Last sync:  {}", last_sync.dimmed()));

    if stats.failed > 0 {
        lines.push(String::new());
        lines.push(
            "Run 'tether retry --all' to re-queue failed operations"
                .dimmed()
                .to_string(),
        );
    }

    lines.join("\n")
}

fn relative_age(time: DateTime<Utc>) -> String {
    let age = Utc::now().signed_duration_since(time);
    if age.num_days() > 0 {
        format!("{} days ago", age.num_days())
    } else if age.num_hours() > 0 {
        format!("{} hours ago", age.num_hours())
    } else if age.num_minutes() > 0 {
        format!("{} minutes ago", age.num_minutes())
    } else {
        "just now".to_string()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::sync::{AssignmentResponse, OperationPayload};

    fn make_operation() -> PendingOperation {
        PendingOperation::new(
            OperationPayload::AcceptAssignment(AssignmentResponse {
                assignment_id: "as-7".to_string(),
                note: None,
            }),
            75,
        )
    }

    #[test]
    fn test_format_operations_empty() {
        colored::control::set_override(false);
        let output = format_operations_pretty(&[], "Queue", 3);
        assert!(output.contains("(0 items)"));
        assert!(output.contains("No operations queued"));
    }

    #[test]
    fn test_format_operations_shows_failures() {
        colored::control::set_override(false);
        let mut op = make_operation();
        op.retry_count = 3;
        op.error = Some("Max retry attempts (3) exceeded: Remote error: 409".to_string());

        let output = format_operations_pretty(&[op.clone()], "Queue", 3);
        assert!(output.contains(&op.id));
        assert!(output.contains("Accept Assignment"));
        assert!(output.contains("3/3"));
        assert!(output.contains("Max retry attempts (3) exceeded"));
    }

    #[test]
    fn test_format_operation_detail() {
        colored::control::set_override(false);
        let output = format_operation_pretty(&make_operation());
        assert!(output.contains("Priority: 75"));
        assert!(output.contains("Target: as-7"));
        assert!(!output.contains("Error"));
    }

    #[test]
    fn test_format_status() {
        colored::control::set_override(false);
        let stats = QueueStats {
            total: 4,
            retryable: 2,
            waiting: 1,
            failed: 1,
            oldest_pending: Some(Utc::now() - chrono::Duration::hours(3)),
        };
        let status = SyncStatus {
            is_syncing: false,
            pending_count: 3,
            last_sync_time: None,
        };

        let output = format_status_pretty(&stats, &status);
        assert!(output.contains("Queued:     4"));
        assert!(output.contains("3 hours ago"));
        assert!(output.contains("Last sync:  never"));
        assert!(output.contains("tether retry --all"));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("ünïcödé text here", 8), "ünïcö...");
    }
}
