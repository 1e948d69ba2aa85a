//! Assignment date arithmetic.
//!
//! A [`Schedule`] describes the rotation rhythm: a start weekday, a fixed
//! interval in days, and whether an assignment series may begin on the
//! current day. The anchor date is the first slot of a fresh series;
//! subsequent slots follow at `anchor + k * interval`.

use chrono::{Datelike, Days, NaiveDate};

/// Rotation schedule parameters.
#[derive(Debug, Clone, Copy)]
pub struct Schedule {
    /// Days between consecutive assignment dates (>= 1).
    pub interval_days: u32,
    /// Weekday on which a fresh series starts (0 = Monday .. 6 = Sunday).
    pub weekday_start: u8,
    /// Whether the anchor may fall on today itself.
    pub allow_start_today: bool,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            interval_days: 7,
            weekday_start: 0,
            allow_start_today: false,
        }
    }
}

impl Schedule {
    /// First assignment date of a fresh series, relative to `today`.
    ///
    /// Picks the next occurrence of the configured start weekday on or
    /// after `today`. When that occurrence is `today` itself and same-day
    /// starts are disallowed, the anchor advances one week.
    pub fn anchor(&self, today: NaiveDate) -> NaiveDate {
        let target = u32::from(self.weekday_start);
        let current = today.weekday().num_days_from_monday();
        let mut ahead = (target + 7 - current) % 7;
        if ahead == 0 && !self.allow_start_today {
            ahead = 7;
        }
        today + Days::new(u64::from(ahead))
    }

    /// Date of slot `k` in a series starting at `anchor`.
    pub fn slot(&self, anchor: NaiveDate, k: usize) -> NaiveDate {
        anchor + Days::new(k as u64 * u64::from(self.interval_days))
    }

    /// The interval as a [`Days`] offset.
    pub fn interval(&self) -> Days {
        Days::new(u64::from(self.interval_days))
    }
}
