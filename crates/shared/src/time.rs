//! Time helpers for the school's configured time zone.
//!
//! The calendar provider expects timestamps formatted as ISO-8601 with an
//! explicit numeric offset (`2024-05-01T14:00:00+08:00`), never `Z`.

use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, TimeZone, Utc};
use thiserror::Error;

/// Offset of Asia/Singapore, the school's time zone.
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 8 * 60;

/// IANA name that accompanies [`DEFAULT_UTC_OFFSET_MINUTES`].
pub const DEFAULT_TIME_ZONE: &str = "Asia/Singapore";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("UTC offset out of range: {0} minutes")]
    InvalidOffset(i32),
}

/// Builds a fixed offset from a minute count east of UTC.
pub fn offset_from_minutes(minutes: i32) -> Result<FixedOffset, TimeError> {
    FixedOffset::east_opt(minutes * 60).ok_or(TimeError::InvalidOffset(minutes))
}

/// Formats an instant as ISO-8601 seconds precision with an explicit offset.
pub fn format_with_offset(instant: DateTime<Utc>, offset: FixedOffset) -> String {
    instant
        .with_timezone(&offset)
        .to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Calendar day of an instant as observed in the given offset.
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Interprets a local wall-clock time in the given offset as a UTC instant.
pub fn local_to_utc(
    date: NaiveDate,
    hour: u32,
    minute: u32,
    offset: FixedOffset,
) -> Option<DateTime<Utc>> {
    let naive = date.and_hms_opt(hour, minute, 0)?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}
