//! Output formatting for CLI

use clap::ValueEnum;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use glassbox_common::{DisplayId, EndpointAddress};
use glassbox_harness::{ShutdownOutcome, StopReport};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
    /// Plain text format
    Plain,
}

/// Trait for items that can be displayed in a table
pub trait TableDisplay {
    fn headers() -> Vec<&'static str>;
    fn row(&self) -> Vec<String>;
}

/// Print a single item
pub fn print_item<T: Serialize + TableDisplay>(item: &T, format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic);

            table.set_header(T::headers());
            table.add_row(item.row());

            println!("{table}");
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(item).unwrap_or_default());
        }
        OutputFormat::Plain => {
            let row = item.row();
            for (header, value) in T::headers().iter().zip(row.iter()) {
                println!("{}: {}", header, value);
            }
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("{} {}", "✔".green().bold(), message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✖".red().bold(), message);
}

/// Print warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "!".yellow().bold(), message);
}

/// Print info message
pub fn print_info(message: &str) {
    println!("{} {}", "·".cyan(), message);
}

/// Announce a server that accepts connections.
pub fn print_ready(endpoint: &EndpointAddress, display: Option<DisplayId>) {
    print_success(&format!("Server ready at {}", endpoint.to_string().green()));
    if let Some(display) = display {
        println!("   display: {}", display);
    }
}

/// Summarize what stopping the session took.
pub fn print_stop_report(report: &StopReport) {
    if report.was_forced() {
        print_warning("Session had to be killed");
    } else {
        print_success("Session stopped");
    }
    println!("   server: {}", describe_outcome(report.main));
    if report.helper.is_some() {
        println!("   xvfb:   {}", describe_outcome(report.helper));
    }
}

fn describe_outcome(outcome: Option<ShutdownOutcome>) -> String {
    match outcome {
        None => "-".to_string(),
        Some(ShutdownOutcome::AlreadyExited(status)) => format!("had already exited ({status})"),
        Some(ShutdownOutcome::Graceful(status)) => format!("stopped ({status})"),
        Some(ShutdownOutcome::Forced(_)) => "killed".to_string(),
    }
}

/// Dump captured server output under a header.
pub fn print_server_logs(logs: &str) {
    println!();
    println!("{}", "--- Server Logs ---".bold());
    if logs.is_empty() {
        println!("{}", "(no logs captured)".dimmed());
    } else {
        println!("{}", logs);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;

    #[test]
    fn stop_outcomes_read_naturally() {
        let clean = ExitStatus::from_raw(0);
        assert_eq!(describe_outcome(None), "-");
        assert_eq!(
            describe_outcome(Some(ShutdownOutcome::Graceful(clean))),
            format!("stopped ({clean})")
        );
        assert!(describe_outcome(Some(ShutdownOutcome::AlreadyExited(clean)))
            .starts_with("had already exited"));
        assert_eq!(describe_outcome(Some(ShutdownOutcome::Forced(None))), "killed");
    }
}
