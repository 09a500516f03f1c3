use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        DateRange { start, end }
    }

    pub fn contains(self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// Expands to inclusive datetime bounds: `start` at local midnight,
    /// `end` at 23:59:59 of that calendar day.
    pub fn datetime_bounds(self) -> (NaiveDateTime, NaiveDateTime) {
        (
            self.start.and_hms_opt(0, 0, 0).unwrap(),
            self.end.and_hms_opt(23, 59, 59).unwrap(),
        )
    }
}
