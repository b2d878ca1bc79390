//! Output formatting utilities

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print rows as a table, or `raw` as JSON
pub fn print_rows<R: Tabled, T: Serialize + ?Sized>(
    rows: Vec<R>,
    raw: &T,
    format: OutputFormat,
    empty_message: &str,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(raw)?,
        OutputFormat::Table => {
            if rows.is_empty() {
                print_warning(empty_message);
                return Ok(());
            }
            let count = rows.len();
            let table = Table::new(rows).with(Style::rounded()).to_string();
            println!("{}", table);
            println!("\nTotal: {}", count);
        }
    }
    Ok(())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Human-readable age of an RFC 3339 timestamp relative to `now`
pub fn format_age(timestamp: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(parsed) = timestamp.and_then(|t| DateTime::parse_from_rfc3339(t).ok()) else {
        return "-".to_string();
    };
    let secs = (now - parsed.with_timezone(&Utc)).num_seconds().max(0);
    match secs {
        s if s < 60 => format!("{}s", s),
        s if s < 3600 => format!("{}m", s / 60),
        s if s < 86400 => format!("{}h", s / 3600),
        s => format!("{}d", s / 86400),
    }
}

/// `ready/desired` replica summary, colored by availability
pub fn format_replicas(ready: Option<i32>, desired: Option<i32>) -> String {
    let ready = ready.unwrap_or(0);
    let desired = desired.unwrap_or(0);
    let text = format!("{}/{}", ready, desired);
    if desired == 0 {
        text.dimmed().to_string()
    } else if ready >= desired {
        text.green().to_string()
    } else if ready > 0 {
        text.yellow().to_string()
    } else {
        text.red().to_string()
    }
}

/// Color a pod phase
pub fn color_phase(phase: &str) -> String {
    match phase.to_lowercase().as_str() {
        "running" | "succeeded" => phase.green().to_string(),
        "pending" => phase.yellow().to_string(),
        "failed" | "unknown" => phase.red().to_string(),
        _ => phase.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_age() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_age(Some("2024-05-01T11:59:30+00:00"), now), "30s");
        assert_eq!(format_age(Some("2024-05-01T11:15:00Z"), now), "45m");
        assert_eq!(format_age(Some("2024-05-01T09:00:00Z"), now), "3h");
        assert_eq!(format_age(Some("2024-04-28T12:00:00Z"), now), "3d");
        assert_eq!(format_age(Some("not a time"), now), "-");
        assert_eq!(format_age(None, now), "-");
    }

    #[test]
    fn test_format_replicas_text() {
        colored::control::set_override(false);
        assert_eq!(format_replicas(Some(2), Some(3)), "2/3");
        assert_eq!(format_replicas(None, Some(1)), "0/1");
        assert_eq!(format_replicas(None, None), "0/0");
    }
}
