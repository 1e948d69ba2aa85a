//! Lookup period parsing and resolution.
//!
//! The `/lookup` endpoint accepts either a named period token (`next`,
//! `current`, `previous`), an explicit ISO date as the period, or an
//! explicit `from`/`to` range. Parsing produces a closed [`Period`]
//! enumeration; resolution turns it into a concrete [`Window`] relative
//! to `today` and the configured interval.

use crate::error::{Result, RotaError};
use crate::schedule::Schedule;
use chrono::{Days, NaiveDate};

/// A named or explicit time window for `/lookup`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    /// The nearest not-yet-passed assignment.
    Next,
    /// The assignment window currently in progress.
    Current,
    /// The assignment window before the current one.
    Previous,
    /// The first assignment on or after an explicit date.
    From(NaiveDate),
    /// All assignments in an inclusive explicit range.
    Between { from: NaiveDate, to: NaiveDate },
}

/// A resolved lookup window over the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// The single earliest entry with `date >= day`.
    FirstOnOrAfter(NaiveDate),
    /// All entries with `from <= date <= to`.
    Range { from: NaiveDate, to: NaiveDate },
}

impl Period {
    /// Parse a period from `/lookup` query parameters.
    ///
    /// `period=` and `from=`/`to=` are mutually exclusive. A bare `to=`
    /// searches from `today` to the given date. No parameters at all
    /// means [`Period::Next`].
    pub fn from_query(
        period: Option<&str>,
        from: Option<&str>,
        to: Option<&str>,
        today: NaiveDate,
    ) -> Result<Self> {
        if period.is_some() && (from.is_some() || to.is_some()) {
            return Err(RotaError::InvalidInput(
                "period and from/to cannot be combined".to_owned(),
            ));
        }

        if let Some(token) = period {
            return Self::parse_token(token);
        }

        match (from, to) {
            (None, None) => Ok(Self::Next),
            (Some(from), None) => Ok(Self::From(parse_date(from)?)),
            (from, Some(to)) => {
                let from = match from {
                    Some(s) => parse_date(s)?,
                    None => today,
                };
                let to = parse_date(to)?;
                if to < from {
                    return Err(RotaError::InvalidInput(format!(
                        "period end {to} is before start {from}"
                    )));
                }
                Ok(Self::Between { from, to })
            }
        }
    }

    /// Parse a `period=` token: a named window or an explicit ISO date.
    fn parse_token(token: &str) -> Result<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "next" => Ok(Self::Next),
            "current" => Ok(Self::Current),
            "previous" => Ok(Self::Previous),
            other => parse_date(other).map(Self::From),
        }
    }

    /// Resolve this period into a concrete window.
    pub fn resolve(&self, today: NaiveDate, schedule: &Schedule) -> Window {
        let interval = u64::from(schedule.interval_days);
        match self {
            Self::Next => Window::FirstOnOrAfter(today),
            Self::Current => Window::Range {
                from: today - Days::new(interval - 1),
                to: today,
            },
            Self::Previous => Window::Range {
                from: today - Days::new(2 * interval - 1),
                to: today - Days::new(interval),
            },
            Self::From(day) => Window::FirstOnOrAfter(*day),
            Self::Between { from, to } => Window::Range {
                from: *from,
                to: *to,
            },
        }
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    s.trim()
        .parse::<NaiveDate>()
        .map_err(|_| RotaError::InvalidInput(format!("invalid date: {s:?} (expected YYYY-MM-DD)")))
}
