//! Output formatting utilities for CLI commands

use colored::Colorize;
use vantage_shared::JobStatus;

/// Print success message
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print error message
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print info message
pub fn info(msg: &str) {
    println!("{} {}", "ℹ".blue(), msg);
}

/// Print warning message
pub fn warning(msg: &str) {
    println!("{} {}", "⚠".yellow(), msg);
}

/// Colored one-word rendering of a job status
pub fn status_label(status: &JobStatus) -> String {
    match status {
        JobStatus::Pending => "pending".yellow().to_string(),
        JobStatus::Finished => "finished".green().to_string(),
        JobStatus::Error { .. } => "error".red().to_string(),
    }
}

/// Pretty-print a JSON payload to stdout
pub fn payload(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
