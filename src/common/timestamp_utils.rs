use chrono::{DateTime, Local};
use std::time::Duration;

// Get current local timestamp as a formatted string
pub fn current_local_timestamp_str(format_str: &str) -> String {
    let now: DateTime<Local> = Local::now();
    now.format(format_str).to_string()
}

/// Formats an elapsed duration as `HH:MM:SS`. Hours keep growing past 99.
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let (hours, remainder) = (total / 3600, total % 3600);
    let (minutes, seconds) = (remainder / 60, remainder % 60);
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
