use crate::error::{caldav_error, BotResult};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse an iCalendar DTSTART value into a timezone-aware UTC instant.
///
/// Date-only values are promoted to midnight of that date. Values without
/// timezone information (floating times) are assumed to be UTC.
pub fn parse_dtstart(value: &str, tzid: Option<&str>) -> BotResult<DateTime<Utc>> {
    let trimmed = value.trim();
    let is_utc = trimmed.ends_with('Z');
    let trimmed = trimmed.trim_end_matches('Z');

    let naive = if trimmed.len() == 8 {
        let date = NaiveDate::parse_from_str(trimmed, "%Y%m%d")
            .map_err(|e| caldav_error(&format!("Failed to parse date '{}': {}", trimmed, e)))?;
        date.and_hms_opt(0, 0, 0)
            .ok_or_else(|| caldav_error("Failed to create datetime"))?
    } else {
        NaiveDateTime::parse_from_str(trimmed, "%Y%m%dT%H%M%S")
            .map_err(|e| caldav_error(&format!("Failed to parse datetime '{}': {}", trimmed, e)))?
    };

    if is_utc {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    match tzid {
        Some(tz_name) => {
            let tz: Tz = tz_name
                .parse()
                .map_err(|_| caldav_error(&format!("Unknown TZID: {}", tz_name)))?;
            match tz.from_local_datetime(&naive) {
                chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
                chrono::LocalResult::Ambiguous(_, _) => {
                    Err(caldav_error("Ambiguous local time"))
                }
                chrono::LocalResult::None => Err(caldav_error("Invalid local time")),
            }
        }
        None => Ok(Utc.from_utc_datetime(&naive)),
    }
}
