//! Period resolution and calendar bucketing.
//!
//! Everything here is pure: the reference instant is always passed in, never read
//! from the wall clock. Ranges are half-open `[start, end)` in UTC.

use crate::errors::{Error, Result};
use chrono::{DateTime, Datelike, Months, NaiveDate, NaiveTime, TimeDelta, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Symbolic reporting period selected by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Period {
    /// The seven days leading up to now.
    Week,
    /// The current calendar month.
    Month,
    /// The current calendar year.
    Year,
    /// The previous calendar month.
    LastMonth,
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "week" => Ok(Self::Week),
            "month" => Ok(Self::Month),
            "year" => Ok(Self::Year),
            "lastMonth" => Ok(Self::LastMonth),
            other => Err(Error::invalid(format!("unknown period token '{other}'"))),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
            Self::LastMonth => "lastMonth",
        };
        f.write_str(token)
    }
}

/// Half-open instant range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }

    /// The whole calendar month containing `date`.
    pub fn calendar_month(date: NaiveDate) -> Result<Self> {
        let first = first_of_month(date.year(), date.month())?;
        let next = add_months(first, 1)?;
        Ok(Self {
            start: midnight(first),
            end: midnight(next),
        })
    }

    /// Jan 1 of `year` up to Jan 1 of the following year.
    pub fn calendar_year(year: i32) -> Result<Self> {
        let first = first_of_month(year, 1)?;
        let next = first_of_month(year + 1, 1)?;
        Ok(Self {
            start: midnight(first),
            end: midnight(next),
        })
    }

    /// Inclusive calendar dates `first..=last` as a range.
    pub fn from_dates(first: NaiveDate, last: NaiveDate) -> Result<Self> {
        let after = last
            .succ_opt()
            .ok_or_else(|| Error::invalid(format!("date {last} is out of range")))?;
        Ok(Self {
            start: midnight(first),
            end: midnight(after),
        })
    }
}

/// Time-series bucket size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Granularity {
    Day,
    IsoWeek,
    Month,
}

impl Granularity {
    /// `year` is charted by month, `month` by ISO week, anything shorter by day.
    #[must_use]
    pub const fn for_period(period: Period) -> Self {
        match period {
            Period::Year => Self::Month,
            Period::Month => Self::IsoWeek,
            Period::Week | Period::LastMonth => Self::Day,
        }
    }
}

/// One slot of a zero-filled time series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub key: String,
    pub label: String,
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn first_of_month(year: i32, month: u32) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| Error::invalid(format!("no such month {year}-{month:02}")))
}

fn add_months(date: NaiveDate, months: u32) -> Result<NaiveDate> {
    date.checked_add_months(Months::new(months))
        .ok_or_else(|| Error::invalid(format!("date {date} is out of range")))
}

/// Shifts an instant by whole calendar months, clamping the day to the end of a
/// shorter target month (Mar 31 minus one month is Feb 28/29).
pub fn shift_months(instant: DateTime<Utc>, months: i32) -> Result<DateTime<Utc>> {
    let step = Months::new(months.unsigned_abs());
    let shifted = if months >= 0 {
        instant.checked_add_months(step)
    } else {
        instant.checked_sub_months(step)
    };
    shifted.ok_or_else(|| Error::invalid(format!("cannot shift {instant} by {months} months")))
}

/// Maps a period token to a concrete range relative to `now`.
pub fn resolve(period: Period, now: DateTime<Utc>) -> Result<DateRange> {
    let today = now.date_naive();
    match period {
        Period::Week => Ok(DateRange {
            start: now - TimeDelta::days(7),
            end: now,
        }),
        Period::Month => DateRange::calendar_month(today),
        Period::Year => DateRange::calendar_year(today.year()),
        Period::LastMonth => {
            let this_month = first_of_month(today.year(), today.month())?;
            let previous = this_month
                .checked_sub_months(Months::new(1))
                .ok_or_else(|| Error::invalid(format!("date {today} is out of range")))?;
            DateRange::calendar_month(previous)
        }
    }
}

/// The window one period length before `range`, used for trend deltas.
pub fn previous_comparable(range: DateRange, period: Period) -> Result<DateRange> {
    match period {
        Period::Week => Ok(DateRange {
            start: range.start - TimeDelta::days(7),
            end: range.end - TimeDelta::days(7),
        }),
        Period::Month | Period::LastMonth => Ok(DateRange {
            start: shift_months(range.start, -1)?,
            end: shift_months(range.end, -1)?,
        }),
        Period::Year => Ok(DateRange {
            start: shift_months(range.start, -12)?,
            end: shift_months(range.end, -12)?,
        }),
    }
}

fn date_key(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => date.format("%Y-%m-%d").to_string(),
        Granularity::IsoWeek => {
            let week = date.iso_week();
            format!("{}-W{:02}", week.year(), week.week())
        }
        Granularity::Month => format!("{}-{:02}", date.year(), date.month()),
    }
}

/// Bucket key for an instant: `2024-06-15`, `2024-W24` or `2024-06`.
///
/// ISO weeks start on Monday and week 1 contains the year's first Thursday, so the
/// ISO year can differ from the calendar year around New Year.
#[must_use]
pub fn bucket_key(instant: DateTime<Utc>, granularity: Granularity) -> String {
    date_key(instant.date_naive(), granularity)
}

/// Display label for the bucket containing `date`.
#[must_use]
pub fn bucket_label(date: NaiveDate, granularity: Granularity) -> String {
    match granularity {
        Granularity::Day => date.format("%b %d").to_string(),
        Granularity::IsoWeek => {
            let week = date.iso_week();
            let monday =
                NaiveDate::from_isoywd_opt(week.year(), week.week(), Weekday::Mon).unwrap_or(date);
            format!("Week of {}", monday.format("%b %d"))
        }
        Granularity::Month => date.format("%b %Y").to_string(),
    }
}

/// Every bucket touched by `range`, oldest first, including empty ones.
///
/// The full window is enumerated regardless of where "now" falls inside it, so a
/// `year` range always yields twelve monthly buckets.
#[must_use]
pub fn enumerate_buckets(range: DateRange, granularity: Granularity) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = Vec::new();
    if range.end <= range.start {
        return buckets;
    }
    let first = range.start.date_naive();
    let last = (range.end - TimeDelta::nanoseconds(1)).date_naive();

    for date in first.iter_days().take_while(|d| *d <= last) {
        let key = date_key(date, granularity);
        if buckets.last().is_some_and(|b| b.key == key) {
            continue;
        }
        buckets.push(Bucket {
            key,
            label: bucket_label(date, granularity),
        });
    }
    buckets
}
