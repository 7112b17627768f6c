use chrono::NaiveDate;

// Anything above this is treated as a millisecond timestamp (it's early 5138 in seconds).
const MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// Projects a report's `date` onto unix seconds, so stored reports can be range queried.
///
/// Producers send either a unix timestamp (seconds or milliseconds) as text, or a
/// `YYYY-MM-DD` calendar date, which is taken as midnight UTC. Anything else yields `None`.
pub fn date_to_epoch_seconds(date: &str) -> Option<i64> {
    let date = date.trim();
    if let Ok(ts) = date.parse::<i64>() {
        return Some(if ts.unsigned_abs() >= MILLIS_THRESHOLD.unsigned_abs() {
            ts / 1000
        } else {
            ts
        });
    }

    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp())
}

/// Inclusive `[start, end]` bounds covering the day that starts at `start_of_day`, or `None`
/// when the day runs past the end of the timestamp range.
pub fn day_bounds(start_of_day: i64) -> Option<(i64, i64)> {
    start_of_day
        .checked_add(86400 - 1)
        .map(|end| (start_of_day, end))
}
