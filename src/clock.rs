use time::{macros::format_description, OffsetDateTime};

/// Milliseconds since the unix epoch.
pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Local wall clock as `HH:MM:SS`, falling back to UTC when the local offset can't be determined.
pub fn wall_time() -> Result<String, time::error::Format> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_hms(now)
}

pub fn format_hms(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.format(format_description!("[hour]:[minute]:[second]"))
}
