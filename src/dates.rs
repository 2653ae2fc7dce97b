//! Parsing for date path/query parameters.
//!
//! Calendar dates expand to UTC day boundaries: the start of the day for
//! range starts, 23:59:59 for range ends. Date-times are ISO-8601 without an
//! offset and are taken as UTC.

use time::format_description::FormatItem;
use time::macros::{format_description, time};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

const DATE_FMT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");
const DATE_TIME_FMT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// `YYYY-MM-DD` → start of that day, UTC.
pub fn parse_day_start(s: &str) -> Option<OffsetDateTime> {
    let date = Date::parse(s, DATE_FMT).ok()?;
    Some(date.midnight().assume_utc())
}

/// `YYYY-MM-DD` → 23:59:59 of that day, UTC.
pub fn parse_day_end(s: &str) -> Option<OffsetDateTime> {
    let date = Date::parse(s, DATE_FMT).ok()?;
    Some(date.with_time(time!(23:59:59)).assume_utc())
}

/// `YYYY-MM-DDThh:mm:ss` → that instant, UTC.
pub fn parse_date_time(s: &str) -> Option<OffsetDateTime> {
    let dt = PrimitiveDateTime::parse(s, DATE_TIME_FMT).ok()?;
    Some(dt.assume_utc())
}
