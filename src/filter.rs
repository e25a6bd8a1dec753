//! Line predicates for search: substring and inclusive date range.

use crate::entry::parse_timestamp;
use crate::error::{Error, Result};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

/// Outcome of checking one line against a [`LineFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Match,
    Skip,
    /// No line further along the scan can match; stop reading.
    Stop,
}

/// Text and date predicates applied to each scanned line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineFilter {
    pub text: Option<String>,
    /// Inclusive `(from, to)` bounds on the line timestamp.
    pub range: Option<(NaiveDateTime, NaiveDateTime)>,
}

impl LineFilter {
    /// Build a filter. If only one date bound is given, the other defaults
    /// to the beginning of time (`from`) or now (`to`).
    pub fn new(
        text: Option<String>,
        date_from: Option<NaiveDateTime>,
        date_to: Option<NaiveDateTime>,
    ) -> Self {
        let range = match (date_from, date_to) {
            (None, None) => None,
            (from, to) => Some((
                from.unwrap_or(NaiveDateTime::MIN),
                to.unwrap_or_else(|| Local::now().naive_local()),
            )),
        };
        LineFilter {
            text: text.filter(|t| !t.is_empty()),
            range,
        }
    }

    pub fn is_active(&self) -> bool {
        self.text.is_some() || self.range.is_some()
    }

    /// Check `line`. Entries are appended in time order, so once a reverse
    /// scan passes `from` (or a forward scan passes `to`) it can stop.
    pub fn check(&self, line: &str, reverse: bool) -> Verdict {
        if let Some((from, to)) = self.range {
            let Some(ts) = parse_timestamp(line) else {
                return Verdict::Skip;
            };
            if ts < from {
                return if reverse { Verdict::Stop } else { Verdict::Skip };
            }
            if ts > to {
                return if reverse { Verdict::Skip } else { Verdict::Stop };
            }
        }
        match &self.text {
            Some(needle) if !line.contains(needle.as_str()) => Verdict::Skip,
            _ => Verdict::Match,
        }
    }
}

/// Parse a date bound given as text.
///
/// Accepts `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`, RFC 3339 (converted
/// to local time), integer Unix seconds, or a bare `YYYY-MM-DD`, which means
/// the start of that day, or its last second when `end_of_day` is set.
///
/// # Examples
///
/// ```
/// use flatlog::parse_date;
///
/// let from = parse_date("2024-05-01", false).unwrap();
/// let to = parse_date("2024-05-01", true).unwrap();
/// assert_eq!(from.to_string(), "2024-05-01 00:00:00");
/// assert_eq!(to.to_string(), "2024-05-01 23:59:59");
/// assert!(parse_date("yesterday-ish", false).is_err());
/// ```
pub fn parse_date(input: &str, end_of_day: bool) -> Result<NaiveDateTime> {
    let s = input.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Local).naive_local());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let time = if end_of_day {
            NaiveTime::from_hms_opt(23, 59, 59)
        } else {
            NaiveTime::from_hms_opt(0, 0, 0)
        };
        if let Some(time) = time {
            return Ok(date.and_time(time));
        }
    }
    if let Ok(secs) = s.parse::<i64>() {
        if let Some(dt) = Local.timestamp_opt(secs, 0).single() {
            return Ok(dt.naive_local());
        }
    }
    Err(Error::InvalidDate(input.to_string()))
}
