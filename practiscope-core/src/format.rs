//! Formatting helpers for text output.

use chrono::{DateTime, Utc};

use crate::analytics::Summary;

/// Format a timestamp as relative time (e.g., "2m ago").
pub fn format_relative_time(ts: DateTime<Utc>) -> String {
    format_relative_time_at(ts, Utc::now())
}

/// Format `ts` relative to `now`.
pub fn format_relative_time_at(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(ts);

    if duration.num_seconds() < 0 {
        "just now".to_string()
    } else if duration.num_seconds() < 60 {
        format!("{}s ago", duration.num_seconds())
    } else if duration.num_minutes() < 60 {
        format!("{}m ago", duration.num_minutes())
    } else if duration.num_hours() < 24 {
        format!("{}h ago", duration.num_hours())
    } else if duration.num_days() < 7 {
        format!("{}d ago", duration.num_days())
    } else {
        ts.format("%b %d").to_string()
    }
}

/// Format an optional timestamp as relative time, or "-" if missing.
pub fn format_relative_time_opt(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => format_relative_time(ts),
        None => "-".to_string(),
    }
}

/// Format a ratio as a whole percentage (0.667 -> "67%").
pub fn format_rate(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

/// One-line text rendering of a summary.
pub fn format_summary(summary: &Summary) -> String {
    format!(
        "{} attempts, {} passed ({}), avg score {:.2}, avg stars {:.1}, last {}",
        summary.attempts,
        summary.passes,
        format_rate(summary.pass_rate),
        summary.avg_score,
        summary.avg_stars,
        format_relative_time_opt(summary.last_at)
    )
}
