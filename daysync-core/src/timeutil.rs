//! Clock, rollover, and window arithmetic for the daily digest.
//!
//! The digest runs on a fixed UTC+9 wall clock, and its notion of "today"
//! rolls over at 11:00 rather than midnight: before 11:00 the tool still
//! reports on yesterday.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};

/// Hour (local) at which the digest's day advances.
pub const ROLLOVER_HOUR: u32 = 11;

/// The fixed UTC+9 offset all local arithmetic uses.
pub fn digest_zone() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).unwrap()
}

/// The logical date the digest covers at `now`: the local date, shifted back
/// one day before the 11:00 rollover.
pub fn effective_date(now: DateTime<Utc>) -> NaiveDate {
    let local = now.with_timezone(&digest_zone());
    let date = local.date_naive();
    if local.hour() < ROLLOVER_HOUR {
        date - Duration::days(1)
    } else {
        date
    }
}

/// Midnight local time on `date`, as a UTC instant.
pub fn day_start_utc(date: NaiveDate) -> DateTime<Utc> {
    digest_zone()
        .from_local_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
        .unwrap()
        .with_timezone(&Utc)
}

/// Format an instant as a local 12-hour clock time: "2pm", "2:30pm".
pub fn format_clock(instant: DateTime<Utc>) -> String {
    let local = instant.with_timezone(&digest_zone());
    let (hour, minute) = (local.hour(), local.minute());
    let suffix = if hour < 12 { "am" } else { "pm" };
    let hour12 = match hour % 12 {
        0 => 12,
        h => h,
    };
    if minute == 0 {
        format!("{}{}", hour12, suffix)
    } else {
        format!("{}:{:02}{}", hour12, minute, suffix)
    }
}

/// Inclusive overlap test for two date ranges.
pub fn ranges_overlap(a_start: NaiveDate, a_end: NaiveDate, b_start: NaiveDate, b_end: NaiveDate) -> bool {
    a_end >= b_start && b_end >= a_start
}

/// The 3-day span (yesterday, today, tomorrow) around an effective date.
/// Bounds both the calendar sync and the digest queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn around(effective: NaiveDate) -> Window {
        Window {
            start: effective - Duration::days(1),
            end: effective + Duration::days(1),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Whether an inclusive date range touches this window.
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        ranges_overlap(start, end, self.start, self.end)
    }

    /// UTC instants bounding the window for feed queries: local midnight
    /// opening the first day through local midnight closing the last.
    pub fn fetch_bounds_utc(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            day_start_utc(self.start),
            day_start_utc(self.end + Duration::days(1)),
        )
    }
}
