//! # Cron schedule.
//!
//! Accepted layouts:
//!
//! ```text
//! 5 fields:  minute hour day-of-month month day-of-week
//! 6 fields:  minute hour day-of-month month day-of-week year
//! 7 fields:  second minute hour day-of-month month day-of-week year
//! ```
//!
//! Seconds default to `0`, the year defaults to any year.
//!
//! ## Rules
//! - Validation happens in the constructor; an invalid field is an error, never coerced.
//! - [`Schedule::next_after`] is strictly after its reference (second precision, UTC).
//! - When both day fields are restricted, a day matches if **either** matches.
//! - Equality and hashing compare the normalized fields only, not the name.
//!
//! ## Example
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use taskloom::Schedule;
//!
//! let every_monday: Schedule = "0 9 * * MON".parse().unwrap();
//! let tuesday = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
//!
//! let next = every_monday.next_after(tuesday).unwrap();
//! assert_eq!(next, Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0).unwrap());
//! ```

use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

use crate::error::ScheduleError;
use crate::scheduler::field::{FieldKind, FieldMatch};

/// Immutable, validated cron expression.
#[derive(Debug, Clone)]
pub struct Schedule {
    name: String,
    second: FieldMatch,
    minute: FieldMatch,
    hour: FieldMatch,
    day_of_month: FieldMatch,
    month: FieldMatch,
    day_of_week: FieldMatch,
    year: Option<FieldMatch>,
}

impl Schedule {
    /// Parses `expression`; the schedule is named after its normalized form.
    pub fn parse(expression: &str) -> Result<Self, ScheduleError> {
        let mut schedule = Self::build(expression)?;
        schedule.name = schedule.to_string();
        Ok(schedule)
    }

    /// Parses `expression` under an explicit name.
    pub fn named(name: impl Into<String>, expression: &str) -> Result<Self, ScheduleError> {
        let mut schedule = Self::build(expression)?;
        schedule.name = name.into();
        Ok(schedule)
    }

    fn build(expression: &str) -> Result<Self, ScheduleError> {
        let parts: Vec<&str> = expression.split_whitespace().collect();
        let (second, rest) = match parts.len() {
            5 | 6 => (None, &parts[..]),
            7 => (Some(parts[0]), &parts[1..]),
            found => {
                return Err(ScheduleError::FieldCount {
                    expression: expression.to_string(),
                    found,
                });
            }
        };

        let second = match second {
            Some(raw) => FieldMatch::parse(FieldKind::Second, raw)?,
            None => FieldMatch::exact(0),
        };
        let year = match rest.get(5) {
            Some(raw) => Some(FieldMatch::parse(FieldKind::Year, raw)?),
            None => None,
        };

        Ok(Self {
            name: String::new(),
            second,
            minute: FieldMatch::parse(FieldKind::Minute, rest[0])?,
            hour: FieldMatch::parse(FieldKind::Hour, rest[1])?,
            day_of_month: FieldMatch::parse(FieldKind::DayOfMonth, rest[2])?,
            month: FieldMatch::parse(FieldKind::Month, rest[3])?,
            day_of_week: FieldMatch::parse(FieldKind::DayOfWeek, rest[4])?,
            year,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// First instant matching the schedule strictly after `after`.
    ///
    /// `None` when no such instant exists (for example a year range in the past).
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let start = after.naive_utc().with_nanosecond(0)? + Duration::seconds(1);
        self.next_from(start).map(|t| t.and_utc())
    }

    fn next_from(&self, mut t: NaiveDateTime) -> Option<NaiveDateTime> {
        let last_year = self
            .year
            .as_ref()
            .and_then(FieldMatch::max)
            .unwrap_or(MAX_YEAR);

        loop {
            let year = u32::try_from(t.year()).ok()?;
            if year > last_year {
                return None;
            }
            if !self.year.as_ref().is_none_or(|y| y.contains(year)) {
                t = start_of_day(NaiveDate::from_ymd_opt(t.year() + 1, 1, 1)?);
                continue;
            }
            if !self.month.contains(t.month()) {
                t = start_of_day(first_of_next_month(t.date())?);
                continue;
            }
            if !self.day_matches(t.date()) {
                t = start_of_day(t.date().succ_opt()?);
                continue;
            }
            if !self.hour.contains(t.hour()) {
                t = t.with_minute(0)?.with_second(0)? + Duration::hours(1);
                continue;
            }
            if !self.minute.contains(t.minute()) {
                t = t.with_second(0)? + Duration::minutes(1);
                continue;
            }
            if !self.second.contains(t.second()) {
                t += Duration::seconds(1);
                continue;
            }
            return Some(t);
        }
    }

    fn day_matches(&self, date: NaiveDate) -> bool {
        let dom = self.day_of_month.contains(date.day());
        let dow = self
            .day_of_week
            .contains(date.weekday().num_days_from_sunday());
        if self.day_of_month.is_restricted() && self.day_of_week.is_restricted() {
            dom || dow
        } else {
            dom && dow
        }
    }

    fn fields(&self) -> [&str; 7] {
        [
            self.second.text(),
            self.minute.text(),
            self.hour.text(),
            self.day_of_month.text(),
            self.month.text(),
            self.day_of_week.text(),
            self.year.as_ref().map_or("", FieldMatch::text),
        ]
    }
}

const MAX_YEAR: u32 = 2099;

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(chrono::NaiveTime::MIN)
}

fn first_of_next_month(date: NaiveDate) -> Option<NaiveDate> {
    if date.month() == 12 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
    }
}

impl PartialEq for Schedule {
    fn eq(&self, other: &Self) -> bool {
        self.fields() == other.fields()
    }
}

impl Eq for Schedule {}

impl Hash for Schedule {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.fields().hash(state);
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let with_seconds = self.second.text() != "0";
        if with_seconds {
            write!(f, "{} ", self.second.text())?;
        }
        write!(
            f,
            "{} {} {} {} {}",
            self.minute.text(),
            self.hour.text(),
            self.day_of_month.text(),
            self.month.text(),
            self.day_of_week.text()
        )?;
        match &self.year {
            Some(year) => write!(f, " {}", year.text()),
            None if with_seconds => f.write_str(" *"),
            None => Ok(()),
        }
    }
}

impl FromStr for Schedule {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
