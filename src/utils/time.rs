// src/utils/time.rs

//! Server-local timestamp resolution.
//!
//! The site renders times in its own zone and drops the date (chat lines) or
//! the year (mail, flag reports). These helpers rebuild an absolute UTC
//! instant from such a string and a reference "now", stepping back a day or a
//! year when the naive reading would land in the future.
//!
//! Every record is resolved against the same reference instant, never against
//! the record parsed before it.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;

/// Zone the game server renders timestamps in.
pub const SERVER_TZ: Tz = chrono_tz::America::Chicago;

const CHAT_TIME_FORMAT: &str = "%I:%M:%S %p";
// A leap year is prepended so "Feb 29" always parses; only month/day/time are kept.
const LOG_TIME_FORMAT: &str = "%Y %b %d, %I:%M:%S %p";
const LOG_TIME_PARSE_YEAR: i32 = 2000;

/// How far back to look for a valid year for a month/day reading.
const MAX_YEAR_STEPS: i32 = 8;

/// Attach the server zone to a wall-clock reading.
///
/// Ambiguous readings (clocks going back) take the earlier instant. Readings
/// inside a spring-forward gap use the offset in force before the gap.
pub fn localize(naive: NaiveDateTime) -> DateTime<Tz> {
    SERVER_TZ
        .from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| {
            let offset = SERVER_TZ
                .offset_from_utc_datetime(&(naive - Duration::days(1)))
                .fix();
            let utc = naive - Duration::seconds(i64::from(offset.local_minus_utc()));
            utc.and_utc().with_timezone(&SERVER_TZ)
        })
}

/// Resolve a time-of-day to the latest instant not after `now`.
///
/// Today's server date is assumed; if that is in the future the reading is
/// moved to the previous day.
pub fn resolve_time_of_day(time: NaiveTime, now: DateTime<Utc>) -> DateTime<Utc> {
    let local_now = now.with_timezone(&SERVER_TZ);
    let today = local_now.date_naive();
    let mut resolved = localize(today.and_time(time));
    if resolved > local_now {
        let yesterday = today.pred_opt().unwrap_or(today);
        resolved = localize(yesterday.and_time(time));
    }
    resolved.with_timezone(&Utc)
}

/// Resolve a month/day/time to an instant not after `now`.
///
/// The current server year is assumed; if that is in the future the previous
/// year is used. Returns `None` when no recent year has that calendar date.
pub fn resolve_month_day(
    month: u32,
    day: u32,
    time: NaiveTime,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let local_now = now.with_timezone(&SERVER_TZ);
    (0..MAX_YEAR_STEPS)
        .map(|step| local_now.year() - step)
        .filter_map(|year| NaiveDate::from_ymd_opt(year, month, day))
        .map(|date| localize(date.and_time(time)))
        .find(|resolved| *resolved <= local_now)
        .map(|resolved| resolved.with_timezone(&Utc))
}

/// Parse a chat clock reading such as `8:28:15 PM`.
pub fn parse_chat_time(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let time = NaiveTime::parse_from_str(text.trim(), CHAT_TIME_FORMAT).ok()?;
    Some(resolve_time_of_day(time, now))
}

/// Parse a log/mail reading such as `Apr 16, 5:37:04 PM`.
pub fn parse_log_time(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let padded = format!("{LOG_TIME_PARSE_YEAR} {}", text.trim());
    let naive = NaiveDateTime::parse_from_str(&padded, LOG_TIME_FORMAT).ok()?;
    resolve_month_day(naive.month(), naive.day(), naive.time(), now)
}
