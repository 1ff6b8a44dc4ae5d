//! CLI output formatting

use crate::{
    core::{ExecutionStatus, LogEntry, LogLevel},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
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

const PROGRESS_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Create a progress bar over `total` steps
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    let style = ProgressStyle::default_bar()
        .template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    progress.set_style(style);
    progress
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("COMPLETED").green().to_string(),
        ExecutionStatus::CompletedWithErrors => style("COMPLETED WITH ERRORS").yellow().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// One-line run summary for history listings
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::CompletedWithErrors => WARN,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
    };

    let duration = summary
        .duration_ms()
        .map(|ms| format!("{}ms", ms))
        .unwrap_or_else(|| "-".to_string());

    format!(
        "{} {} - {} - {} - {} steps, {} errors - {} - {}",
        status_icon,
        style(&summary.execution_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.step_count,
        summary.error_count,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim(),
        duration
    )
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline_name,
            total_steps,
        } => format!(
            "{} Starting pipeline {} ({} steps, {})",
            ROCKET,
            style(pipeline_name).bold(),
            total_steps,
            style(&execution_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StepStarted { index, step } => {
            format!("{} [{}] {}", SPINNER, index + 1, style(step).cyan())
        }
        ExecutionEvent::StepCompleted {
            index,
            step,
            data_replaced,
        } => {
            let note = if *data_replaced { "" } else { " (data unchanged)" };
            format!("{} [{}] {}{}", CHECK, index + 1, style(step).green(), style(note).dim())
        }
        ExecutionEvent::StepFailed {
            index,
            step,
            error,
            policy,
        } => format!(
            "{} [{}] {}: {} (on_error={})",
            CROSS,
            index + 1,
            style(step).red(),
            style(error).dim(),
            policy
        ),
        ExecutionEvent::StepRetrying { index, step } => {
            format!("{} [{}] {} (retrying)", WARN, index + 1, style(step).yellow())
        }
        ExecutionEvent::PipelineCompleted {
            execution_id,
            status,
            duration_ms,
        } => format!(
            "{} Pipeline ({}) {} in {:.2}ms",
            INFO,
            style(&execution_id.to_string()[..8]).dim(),
            format_status(*status),
            duration_ms
        ),
    }
}

/// Format a context log line
pub fn format_log_entry(entry: &LogEntry) -> String {
    let level = match entry.level {
        LogLevel::Debug => style("DEBUG").dim(),
        LogLevel::Info => style("INFO ").blue(),
        LogLevel::Warn => style("WARN ").yellow(),
        LogLevel::Error => style("ERROR").red(),
    };
    format!(
        "  {} {} {}",
        style(entry.timestamp.format("%H:%M:%S%.3f")).dim(),
        level,
        entry.message
    )
}

/// Pretty JSON with truncation after `max_lines`
pub fn format_value(value: &Value, max_lines: usize) -> String {
    let output = serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string());
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
