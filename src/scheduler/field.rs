//! # Cron field parsing.
//!
//! Each field goes through the same pipeline:
//!
//! ```text
//! raw text
//!   ├─► trim + uppercase
//!   ├─► month / day names → numbers      (JAN..DEC, SUN..SAT)
//!   ├─► leading zeros stripped            ("05" → "5", "*/010" → "*/10")
//!   ├─► field-specific syntax regex       (compiled once)
//!   └─► expansion + range check           → FieldMatch { values, restricted }
//! ```
//!
//! ## Rules
//! - Elements: `*`, `N`, `N-M`, `*/S`, `N/S`, `N-M/S`, joined by commas.
//! - `?` is accepted in the two day fields and means "any".
//! - Day-of-week accepts 0-7; 7 is folded into 0 (Sunday).
//! - A field is *restricted* unless its text starts with `*` or `?`; this
//!   decides how day-of-month and day-of-week combine.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::ScheduleError;

static LEADING_ZEROS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|[^\d])0+(\d)").expect("constant regex pattern is valid")
});

static SMALL_FIELD: LazyLock<Regex> =
    LazyLock::new(|| field_pattern(r"\d{1,2}", false));
static DAY_OF_MONTH_FIELD: LazyLock<Regex> =
    LazyLock::new(|| field_pattern(r"\d{1,2}", true));
static DAY_OF_WEEK_FIELD: LazyLock<Regex> = LazyLock::new(|| field_pattern(r"\d", true));
static YEAR_FIELD: LazyLock<Regex> = LazyLock::new(|| field_pattern(r"\d{4}", false));

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];
const DAYS: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Builds `^elem(,elem)*$` where `elem` is a wildcard or number range with an
/// optional step.
fn field_pattern(num: &str, allow_any: bool) -> Regex {
    let range = format!(r"(?:\*|{num}(?:-{num})?)(?:/\d{{1,4}})?");
    let elem = if allow_any {
        format!(r"(?:\?|{range})")
    } else {
        range
    };
    Regex::new(&format!(r"^{elem}(?:,{elem})*$")).expect("constant regex pattern is valid")
}

/// Position of a field inside a schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FieldKind {
    Second,
    Minute,
    Hour,
    DayOfMonth,
    Month,
    DayOfWeek,
    Year,
}

impl FieldKind {
    pub(crate) fn label(self) -> &'static str {
        match self {
            FieldKind::Second => "second",
            FieldKind::Minute => "minute",
            FieldKind::Hour => "hour",
            FieldKind::DayOfMonth => "day_of_month",
            FieldKind::Month => "month",
            FieldKind::DayOfWeek => "day_of_week",
            FieldKind::Year => "year",
        }
    }

    fn bounds(self) -> (u32, u32) {
        match self {
            FieldKind::Second | FieldKind::Minute => (0, 59),
            FieldKind::Hour => (0, 23),
            FieldKind::DayOfMonth => (1, 31),
            FieldKind::Month => (1, 12),
            FieldKind::DayOfWeek => (0, 7),
            FieldKind::Year => (1970, 2099),
        }
    }

    fn syntax(self) -> &'static Regex {
        match self {
            FieldKind::Second | FieldKind::Minute | FieldKind::Hour | FieldKind::Month => {
                &SMALL_FIELD
            }
            FieldKind::DayOfMonth => &DAY_OF_MONTH_FIELD,
            FieldKind::DayOfWeek => &DAY_OF_WEEK_FIELD,
            FieldKind::Year => &YEAR_FIELD,
        }
    }
}

/// Expanded set of values one field accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FieldMatch {
    text: String,
    values: BTreeSet<u32>,
    restricted: bool,
}

impl FieldMatch {
    /// Parses `raw` as a field of `kind`.
    pub(crate) fn parse(kind: FieldKind, raw: &str) -> Result<Self, ScheduleError> {
        let invalid = || ScheduleError::InvalidField {
            field: kind.label(),
            value: raw.to_string(),
        };

        let text = normalize(kind, raw);
        if !kind.syntax().is_match(&text) {
            return Err(invalid());
        }

        let (min, max) = kind.bounds();
        let mut values = BTreeSet::new();
        for elem in text.split(',') {
            let (range, step) = match elem.split_once('/') {
                Some((range, step)) => (range, Some(step)),
                None => (elem, None),
            };
            let step = match step {
                Some(s) => s.parse::<u32>().map_err(|_| invalid())?,
                None => 1,
            };
            if step == 0 {
                return Err(invalid());
            }

            let (lo, hi) = match range {
                "*" | "?" => (min, max),
                _ => match range.split_once('-') {
                    Some((lo, hi)) => (
                        lo.parse::<u32>().map_err(|_| invalid())?,
                        hi.parse::<u32>().map_err(|_| invalid())?,
                    ),
                    None => {
                        let n = range.parse::<u32>().map_err(|_| invalid())?;
                        // `N/S` runs from N to the end of the range.
                        if elem.contains('/') {
                            (n, max)
                        } else {
                            (n, n)
                        }
                    }
                },
            };
            if lo < min || hi > max || lo > hi {
                return Err(invalid());
            }
            values.extend((lo..=hi).step_by(step as usize));
        }

        if kind == FieldKind::DayOfWeek && values.remove(&7) {
            values.insert(0);
        }

        let restricted = !(text.starts_with('*') || text.starts_with('?'));
        Ok(Self {
            text,
            values,
            restricted,
        })
    }

    /// Field that accepts exactly `value` (used for the implicit seconds field).
    pub(crate) fn exact(value: u32) -> Self {
        Self {
            text: value.to_string(),
            values: BTreeSet::from([value]),
            restricted: true,
        }
    }

    pub(crate) fn contains(&self, value: u32) -> bool {
        self.values.contains(&value)
    }

    pub(crate) fn is_restricted(&self) -> bool {
        self.restricted
    }

    /// Largest accepted value.
    pub(crate) fn max(&self) -> Option<u32> {
        self.values.last().copied()
    }

    /// Normalized field text.
    pub(crate) fn text(&self) -> &str {
        &self.text
    }
}

fn normalize(kind: FieldKind, raw: &str) -> String {
    let mut text = raw.trim().to_ascii_uppercase();
    match kind {
        FieldKind::Month => {
            for (idx, name) in MONTHS.iter().enumerate() {
                text = text.replace(name, &(idx + 1).to_string());
            }
        }
        FieldKind::DayOfWeek => {
            for (idx, name) in DAYS.iter().enumerate() {
                text = text.replace(name, &idx.to_string());
            }
        }
        _ => {}
    }
    LEADING_ZEROS.replace_all(&text, "${1}${2}").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leading_zeros_are_trimmed() {
        let f = FieldMatch::parse(FieldKind::Minute, "05").unwrap();
        assert_eq!(f.text(), "5");
        assert!(f.contains(5));

        let f = FieldMatch::parse(FieldKind::Minute, "00,010").unwrap();
        assert_eq!(f.text(), "0,10");

        let f = FieldMatch::parse(FieldKind::Hour, "*/06").unwrap();
        assert_eq!(f.text(), "*/6");
        assert_eq!(f.values, BTreeSet::from([0, 6, 12, 18]));
    }

    #[test]
    fn ranges_steps_and_lists_expand() {
        let f = FieldMatch::parse(FieldKind::Minute, "10-20/5,45").unwrap();
        assert_eq!(f.values, BTreeSet::from([10, 15, 20, 45]));

        let f = FieldMatch::parse(FieldKind::Minute, "50/5").unwrap();
        assert_eq!(f.values, BTreeSet::from([50, 55]));
    }

    #[test]
    fn names_are_case_insensitive() {
        let f = FieldMatch::parse(FieldKind::Month, "jan,Mar-may").unwrap();
        assert_eq!(f.values, BTreeSet::from([1, 3, 4, 5]));

        let f = FieldMatch::parse(FieldKind::DayOfWeek, "mon-FRI").unwrap();
        assert_eq!(f.values, BTreeSet::from([1, 2, 3, 4, 5]));
    }

    #[test]
    fn sunday_is_zero_or_seven() {
        let f = FieldMatch::parse(FieldKind::DayOfWeek, "7").unwrap();
        assert_eq!(f.values, BTreeSet::from([0]));
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for (kind, raw) in [
            (FieldKind::Minute, "60"),
            (FieldKind::Hour, "24"),
            (FieldKind::DayOfMonth, "0"),
            (FieldKind::Month, "13"),
            (FieldKind::DayOfWeek, "8"),
            (FieldKind::Year, "1969"),
            (FieldKind::Minute, "20-10"),
            (FieldKind::Minute, "*/0"),
            (FieldKind::Minute, "?"),
            (FieldKind::Hour, "abc"),
        ] {
            let err = FieldMatch::parse(kind, raw).unwrap_err();
            assert_eq!(
                err,
                ScheduleError::InvalidField {
                    field: kind.label(),
                    value: raw.to_string(),
                },
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn wildcard_fields_are_unrestricted() {
        assert!(!FieldMatch::parse(FieldKind::DayOfMonth, "?").unwrap().is_restricted());
        assert!(!FieldMatch::parse(FieldKind::DayOfWeek, "*/2").unwrap().is_restricted());
        assert!(FieldMatch::parse(FieldKind::DayOfWeek, "1").unwrap().is_restricted());
    }
}
