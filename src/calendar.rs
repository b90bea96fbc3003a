//! Calendar and relative time member resolution
//!
//! Time dimensions accept symbolic members in cuts:
//!
//! - `today`, `yesterday`, `tomorrow`
//! - `<n><unit>ago`, `<n><unit>forward`: shift by `n` units (`3monthsago`)
//! - `last<n><unit>`, `next<n><unit>`: truncate to the start of the unit,
//!   then shift (`lastmonth` is the first day of the previous month)
//!
//! Units are `day`, `week`, `month`, `quarter` and `year`; a plural `s` and
//! a missing count (meaning 1) are accepted.

use crate::cell::{MemberConverter, Path};
use crate::model::{Dimension, Hierarchy};
use chrono::{Datelike, Days, Months, NaiveDate, Utc, Weekday};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

lazy_static! {
    static ref RELATIVE_FINE: Regex =
        Regex::new(r"^(?P<offset>\d+)?(?P<unit>[a-z]+?)s?(?P<direction>ago|forward)$")
            .expect("valid relative time regex");
    static ref RELATIVE_TRUNCATED: Regex =
        Regex::new(r"^(?P<direction>last|next)(?P<offset>\d+)?(?P<unit>[a-z]+?)s?$")
            .expect("valid relative time regex");
}

/// Calendar unit used in relative expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl TimeUnit {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "day" => Some(TimeUnit::Day),
            "week" => Some(TimeUnit::Week),
            "month" => Some(TimeUnit::Month),
            "quarter" => Some(TimeUnit::Quarter),
            "year" => Some(TimeUnit::Year),
            _ => None,
        }
    }
}

/// Calendar settings shared by time member conversion
#[derive(Debug, Clone)]
pub struct Calendar {
    timezone: String,
    first_weekday: Weekday,
    reference_date: Option<NaiveDate>,
}

impl Default for Calendar {
    fn default() -> Self {
        Self::new("UTC", Weekday::Mon)
    }
}

impl Calendar {
    pub fn new(timezone: impl Into<String>, first_weekday: Weekday) -> Self {
        Self {
            timezone: timezone.into(),
            first_weekday,
            reference_date: None,
        }
    }

    /// Fix "today" to a given date
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    pub fn first_weekday(&self) -> Weekday {
        self.first_weekday
    }

    /// Current date (UTC) unless a reference date is set
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Resolve a relative expression to a date
    pub fn relative_date(&self, expression: &str) -> Option<NaiveDate> {
        let expression = expression.trim().to_ascii_lowercase();
        let today = self.today();

        match expression.as_str() {
            "today" | "now" => return Some(today),
            "yesterday" => return today.checked_sub_days(Days::new(1)),
            "tomorrow" => return today.checked_add_days(Days::new(1)),
            _ => {}
        }

        if let Some(caps) = RELATIVE_FINE.captures(&expression) {
            let unit = TimeUnit::parse(&caps["unit"])?;
            let offset = parse_offset(caps.name("offset").map(|m| m.as_str()))?;
            let offset = if &caps["direction"] == "ago" {
                -offset
            } else {
                offset
            };
            return shift(today, unit, offset);
        }

        if let Some(caps) = RELATIVE_TRUNCATED.captures(&expression) {
            let unit = TimeUnit::parse(&caps["unit"])?;
            let offset = parse_offset(caps.name("offset").map(|m| m.as_str()))?;
            let offset = if &caps["direction"] == "last" {
                -offset
            } else {
                offset
            };
            let start = self.truncate(today, unit)?;
            return shift(start, unit, offset);
        }

        None
    }

    /// First day of the unit containing `date`
    pub fn truncate(&self, date: NaiveDate, unit: TimeUnit) -> Option<NaiveDate> {
        match unit {
            TimeUnit::Day => Some(date),
            TimeUnit::Week => {
                let back = (7 + date.weekday().num_days_from_monday()
                    - self.first_weekday.num_days_from_monday())
                    % 7;
                date.checked_sub_days(Days::new(u64::from(back)))
            }
            TimeUnit::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            TimeUnit::Quarter => {
                let month = (date.month0() / 3) * 3 + 1;
                NaiveDate::from_ymd_opt(date.year(), month, 1)
            }
            TimeUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
        }
    }

    /// Member path of `date` for the given level names
    ///
    /// Levels without a calendar meaning end the path.
    pub fn path<S: AsRef<str>>(&self, date: NaiveDate, levels: &[S]) -> Path {
        let mut path = Path::with_capacity(levels.len());
        for level in levels {
            let key = match level.as_ref() {
                "year" => date.year().to_string(),
                "quarter" => (date.month0() / 3 + 1).to_string(),
                "month" => date.month().to_string(),
                "week" => date.iso_week().week().to_string(),
                "day" => date.day().to_string(),
                "weekday" => date.weekday().num_days_from_monday().to_string(),
                _ => break,
            };
            path.push(key);
        }
        path
    }

    /// Path of a relative expression, or `None` when it is not one
    pub fn named_relative_path<S: AsRef<str>>(&self, expression: &str, levels: &[S]) -> Option<Path> {
        let date = self.relative_date(expression)?;
        let path = self.path(date, levels);
        if path.is_empty() {
            None
        } else {
            Some(path)
        }
    }
}

fn parse_offset(offset: Option<&str>) -> Option<i64> {
    match offset {
        Some(digits) => digits.parse().ok(),
        None => Some(1),
    }
}

fn shift(date: NaiveDate, unit: TimeUnit, amount: i64) -> Option<NaiveDate> {
    let months = |count: i64| -> Option<NaiveDate> {
        let magnitude = Months::new(u32::try_from(count.unsigned_abs()).ok()?);
        if count < 0 {
            date.checked_sub_months(magnitude)
        } else {
            date.checked_add_months(magnitude)
        }
    };
    let days = |count: i64| -> Option<NaiveDate> {
        let magnitude = Days::new(count.unsigned_abs());
        if count < 0 {
            date.checked_sub_days(magnitude)
        } else {
            date.checked_add_days(magnitude)
        }
    };

    match unit {
        TimeUnit::Day => days(amount),
        TimeUnit::Week => days(amount.checked_mul(7)?),
        TimeUnit::Month => months(amount),
        TimeUnit::Quarter => months(amount.checked_mul(3)?),
        TimeUnit::Year => months(amount.checked_mul(12)?),
    }
}

/// Member converter for `time` dimensions
///
/// Single-key paths holding a relative expression are replaced by the
/// member path for the dimension's hierarchy; anything else passes through.
#[derive(Debug, Clone)]
pub struct CalendarMemberConverter {
    calendar: Arc<Calendar>,
}

impl CalendarMemberConverter {
    pub fn new(calendar: Arc<Calendar>) -> Self {
        Self { calendar }
    }
}

impl MemberConverter for CalendarMemberConverter {
    fn convert(&self, _dimension: &Dimension, hierarchy: &Hierarchy, path: Path) -> Path {
        if path.len() != 1 {
            return path;
        }
        match self
            .calendar
            .named_relative_path(&path[0], &hierarchy.level_names())
        {
            Some(converted) => converted,
            None => path,
        }
    }
}
