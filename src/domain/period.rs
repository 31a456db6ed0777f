//! Week buckets and watermark arithmetic
//!
//! Incremental sync advances in fixed seven-day buckets. A bucket is
//! identified by its start date and labelled `Week YYYY-MM-DD`; that label is
//! both the sheet name of the raw weekly data and the date key downstream
//! consumers group on. The watermark is the start date of the newest bucket
//! already recorded; everything from one bucket past it up to "now" is
//! outstanding.

use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, Utc};

/// Length of one sync bucket.
pub const BUCKET_DAYS: i64 = 7;

const WEEK_LABEL_PREFIX: &str = "Week ";

/// One fixed-length sync period, identified by its start date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WeekBucket {
    pub start: NaiveDate,
}

impl WeekBucket {
    pub fn new(start: NaiveDate) -> Self {
        Self { start }
    }

    /// Last calendar day covered by this bucket.
    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(BUCKET_DAYS - 1)
    }

    /// Period label, e.g. `Week 2024-03-18`. Doubles as the raw sheet name
    /// and the date cell of consolidated rows.
    pub fn label(&self) -> String {
        format!("{WEEK_LABEL_PREFIX}{}", self.start.format("%Y-%m-%d"))
    }

    /// Parse a period label back into a bucket. Returns `None` for anything
    /// that is not exactly `Week YYYY-MM-DD`.
    pub fn parse_label(label: &str) -> Option<Self> {
        let date_part = label.trim().strip_prefix(WEEK_LABEL_PREFIX)?;
        NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
            .ok()
            .map(Self::new)
    }

    pub fn next(&self) -> Self {
        Self::new(self.start + Duration::days(BUCKET_DAYS))
    }
}

/// Compute the ordered list of outstanding buckets.
///
/// With a watermark, the first outstanding bucket starts exactly one bucket
/// length after it. Without one (empty dataset), sync backfills a fixed
/// window of whole weeks ending at "now". A bucket is outstanding while its
/// start lies strictly before "now"; the current partially-elapsed week is
/// therefore included, and a watermark already at or past the current week
/// yields an empty list.
pub fn outstanding_buckets(
    watermark: Option<NaiveDate>,
    now: NaiveDateTime,
    backfill_weeks: u32,
) -> Vec<WeekBucket> {
    let first_start = match watermark {
        Some(mark) => mark + Duration::days(BUCKET_DAYS),
        None => now.date() - Duration::days(BUCKET_DAYS * i64::from(backfill_weeks)),
    };

    let mut buckets = Vec::new();
    let mut bucket = WeekBucket::new(first_start);
    while bucket.start.and_hms_opt(0, 0, 0).is_some_and(|start| start < now) {
        buckets.push(bucket);
        bucket = bucket.next();
    }
    buckets
}

/// Current wall-clock time at the remote system (Singapore, UTC+8).
pub fn remote_now() -> NaiveDateTime {
    let sgt = FixedOffset::east_opt(8 * 3600).unwrap();
    Utc::now().with_timezone(&sgt).naive_local()
}
