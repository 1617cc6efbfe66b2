//! Display helpers for durations and paces.
//!
//! Times keep one decimal on the seconds (`M:SS.s`), paces round to whole
//! seconds (`M:SS`). Both split on `floor(seconds / 60)` first, so a time of
//! 59.96s renders as `0:60.0`, the same as the platform's own export.

pub fn format_time(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor();
    let secs = seconds - minutes * 60.0;
    format!("{}:{:04.1}", minutes as i64, secs)
}

pub fn format_pace(seconds: f64) -> String {
    let minutes = (seconds / 60.0).floor();
    let secs = (seconds - minutes * 60.0).round();
    format!("{}:{:02}", minutes as i64, secs as i64)
}

/// Inverse of [`format_pace`]: `"1:05"` is 65 seconds.
pub fn parse_pace(text: &str) -> Option<f64> {
    let (minutes, seconds) = text.split_once(':')?;
    let minutes: f64 = minutes.trim().parse().ok()?;
    let seconds: f64 = seconds.trim().parse().ok()?;
    Some(minutes * 60.0 + seconds)
}

/// Numeric cell text. Whole values print without a fraction (`25`, not `25.0`).
pub fn format_number(value: f64) -> String {
    format!("{}", value)
}

pub fn format_optional(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_default()
}
