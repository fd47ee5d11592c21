//! Timestamps for journal records.
use time::OffsetDateTime;

/// returns the current UTC time formatted as `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn now_iso() -> String {
    format_iso(OffsetDateTime::now_utc())
}

/// formats `t` (converted to UTC) with millisecond precision and a `Z` suffix.
/// Sub-millisecond digits are truncated, not rounded.
pub fn format_iso(t: OffsetDateTime) -> String {
    let t = t.to_offset(time::UtcOffset::UTC);
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:03}Z",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second(),
        t.millisecond()
    )
}
