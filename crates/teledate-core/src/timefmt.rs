//! Timestamp presentation: display-timezone shifting, manual-date parsing,
//! and human-readable elapsed time.
//!
//! Stored timestamps are always UTC. Anything shown to the user is shifted
//! by a fixed display offset (UTC+3, the bot's home timezone convention).

use chrono::{Duration, NaiveDateTime};

/// Fixed presentation offset from UTC, in hours.
pub const DISPLAY_OFFSET_HOURS: i64 = 3;

/// Format accepted for manual record entry, e.g. `01.01.2000 10:00`.
pub const MANUAL_FORMAT: &str = "%d.%m.%Y %H:%M";

/// Shift a stored (UTC) timestamp into display time.
pub fn to_display(dt: NaiveDateTime) -> NaiveDateTime {
    dt + Duration::hours(DISPLAY_OFFSET_HOURS)
}

/// Shift a display-time timestamp back to UTC for storage and comparison.
pub fn from_display(dt: NaiveDateTime) -> NaiveDateTime {
    dt - Duration::hours(DISPLAY_OFFSET_HOURS)
}

/// Parse a manual record argument (`dd.mm.yyyy hh:mm`, display time).
pub fn parse_manual(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), MANUAL_FORMAT).ok()
}

/// Full display form with seconds, e.g. `01.01.2000 10:00:00`.
pub fn format_full(dt: NaiveDateTime) -> String {
    to_display(dt).format("%d.%m.%Y %H:%M:%S").to_string()
}

/// Short display form without seconds, e.g. `01.01.2000 10:00`.
pub fn format_short(dt: NaiveDateTime) -> String {
    to_display(dt).format(MANUAL_FORMAT).to_string()
}

/// Time-of-day display form, e.g. `10:00`.
pub fn format_time_of_day(dt: NaiveDateTime) -> String {
    to_display(dt).format("%H:%M").to_string()
}

/// Human-readable time passed between two UTC timestamps.
///
/// Only the two most significant units are shown, mirroring the bot's
/// original wording: "2 days 5 hours", "5 hours 12 min", "12 min 3 sec",
/// "3 sec".
pub fn format_elapsed(from: NaiveDateTime, now: NaiveDateTime) -> String {
    let total = (now - from).num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let mins = (total % 3_600) / 60;
    let secs = total % 60;

    let days_case = if days == 1 { "day" } else { "days" };
    let hours_case = if hours == 1 { "hour" } else { "hours" };
    if days > 0 {
        return format!("{days} {days_case} {hours} {hours_case}");
    }
    if hours > 0 {
        return format!("{hours} {hours_case} {mins} min");
    }
    if mins > 0 {
        return format!("{mins} min {secs} sec");
    }
    format!("{secs} sec")
}
