use chrono::{Datelike, Local, TimeZone, Timelike};

/// Render `secs` since the Unix epoch in local civil time.
pub fn format_timestamp(secs: i64) -> String {
    format_timestamp_in(secs, &Local)
}

/// Render `secs` since the Unix epoch in `tz` as `YYYY-MM-DD HH:M:SS`.
///
/// Minutes are not zero padded, `14:5:03` is five minutes past two.
/// Timestamps chrono can't represent are printed as the raw seconds.
pub fn format_timestamp_in<Tz: TimeZone>(secs: i64, tz: &Tz) -> String {
    match tz.timestamp_opt(secs, 0).earliest() {
        Some(t) => format!(
            "{}-{:02}-{:02} {:02}:{}:{:02}",
            t.year(),
            t.month(),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        ),
        None => secs.to_string(),
    }
}
