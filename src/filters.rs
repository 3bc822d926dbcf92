//! Custom askama filters used by the view templates.

use chrono::{DateTime, FixedOffset, Offset, Utc};

const SUMMARY_CHARS: usize = 300;

/// Articles are shown in UTC+8.
const DISPLAY_OFFSET_SECS: i32 = 8 * 60 * 60;

fn display_zone() -> FixedOffset {
    FixedOffset::east_opt(DISPLAY_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// First 300 characters of `text`.
pub fn summary<T: std::fmt::Display>(text: T) -> ::askama::Result<String> {
    let text = text.to_string();
    Ok(text.chars().take(SUMMARY_CHARS).collect())
}

/// Compact `[HH:MM][MM.DD]` stamp for list rows.
pub fn smart_time(t: &DateTime<Utc>) -> ::askama::Result<String> {
    Ok(t.with_timezone(&display_zone())
        .format("[%H:%M][%m.%d]")
        .to_string())
}

/// Full timestamp for the article page.
pub fn long_time(t: &DateTime<Utc>) -> ::askama::Result<String> {
    Ok(t.with_timezone(&display_zone())
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string())
}
