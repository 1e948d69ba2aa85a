//! The assignment roster: an ordered list of (user, date) pairs.
//!
//! All operations are pure with respect to I/O. They take the current
//! date and [`Schedule`] as explicit parameters; loading and persisting
//! the roster is owned by the storage layer and the request handlers.
//!
//! Invariants maintained by every operation:
//! - user names are unique and non-empty,
//! - dates are strictly ascending,
//! - after `add`, `remove`, and `reset` consecutive dates differ by
//!   exactly the configured interval.

use crate::error::{Result, RotaError};
use crate::period::Window;
use crate::schedule::Schedule;
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// A single (user, assignment date) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique user name.
    pub user: String,
    /// Assigned turn date (ISO `YYYY-MM-DD` on the wire).
    pub date: NaiveDate,
}

/// Persisted roster document, written wholesale on every mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Document {
    /// Schema version.
    #[serde(default = "default_document_version")]
    version: u8,
    /// Ordered assignments, ascending by date.
    #[serde(default)]
    assignments: Vec<Entry>,
}

fn default_document_version() -> u8 {
    DOCUMENT_VERSION
}

const DOCUMENT_VERSION: u8 = 1;

/// Target of a [`Roster::delay`] operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayTarget<'a> {
    /// Shift every entry.
    All,
    /// Shift a named user's entry and all subsequent entries.
    User(&'a str),
    /// Shift the first entry with `date > day` and all subsequent entries.
    /// An assignment dated `day` itself is already underway and is skipped.
    Upcoming(NaiveDate),
}

/// Ordered collection of assignment entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    entries: Vec<Entry>,
}

impl Roster {
    /// Roster with no entries.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries, ascending by date.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// The entry for `user`.
    pub fn get(&self, user: &str) -> Result<&Entry> {
        self.entries
            .iter()
            .find(|e| e.user == user)
            .ok_or_else(|| RotaError::UnknownUser(user.to_owned()))
    }

    fn position(&self, user: &str) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.user == user)
            .ok_or_else(|| RotaError::UnknownUser(user.to_owned()))
    }

    /// Add a user at the end of the rotation.
    ///
    /// The new date is the last assigned date plus one interval, or the
    /// schedule's anchor date when the roster is empty.
    pub fn add(&mut self, user: &str, today: NaiveDate, schedule: &Schedule) -> Result<Entry> {
        let user = user.trim();
        if user.is_empty() {
            return Err(RotaError::InvalidInput(
                "user name must not be empty".to_owned(),
            ));
        }
        if self.entries.iter().any(|e| e.user == user) {
            return Err(RotaError::DuplicateUser(user.to_owned()));
        }

        let date = match self.entries.last() {
            Some(last) => last.date + schedule.interval(),
            None => schedule.anchor(today),
        };
        let entry = Entry {
            user: user.to_owned(),
            date,
        };
        self.entries.push(entry.clone());
        Ok(entry)
    }

    /// Remove a user and re-tighten the remaining dates.
    ///
    /// Every entry after the removed one shifts earlier by one interval,
    /// so the sequence stays contiguous from the original first date.
    pub fn remove(&mut self, user: &str, schedule: &Schedule) -> Result<Entry> {
        let index = self.position(user)?;
        let removed = self.entries.remove(index);
        for entry in &mut self.entries[index..] {
            entry.date = entry.date - schedule.interval();
        }
        Ok(removed)
    }

    /// Reassign all dates from the anchor, preserving membership order.
    pub fn reset(&mut self, today: NaiveDate, schedule: &Schedule) {
        let anchor = schedule.anchor(today);
        for (k, entry) in self.entries.iter_mut().enumerate() {
            entry.date = schedule.slot(anchor, k);
        }
    }

    /// Shift assignment dates forward by `days`.
    ///
    /// Shifting a suffix of the list keeps dates ascending; gaps wider
    /// than one interval are allowed after a delay.
    pub fn delay(&mut self, target: DelayTarget<'_>, days: u32) -> Result<()> {
        if days == 0 {
            return Err(RotaError::InvalidInput(
                "delay must be at least one day".to_owned(),
            ));
        }
        let start = match target {
            DelayTarget::All => 0,
            DelayTarget::User(user) => self.position(user)?,
            DelayTarget::Upcoming(day) => self
                .entries
                .iter()
                .position(|e| e.date > day)
                .ok_or_else(|| {
                    RotaError::InvalidInput("no upcoming assignment to delay".to_owned())
                })?,
        };
        for entry in &mut self.entries[start..] {
            entry.date = entry.date + Days::new(u64::from(days));
        }
        Ok(())
    }

    /// Exchange the dates of two users.
    ///
    /// Implemented by swapping the user names in place, which keeps the
    /// list ordered by date. Self-inverse.
    pub fn swap(&mut self, a: &str, b: &str) -> Result<()> {
        if a == b {
            return Err(RotaError::InvalidInput(
                "cannot swap a user with themselves".to_owned(),
            ));
        }
        let index_a = self.position(a)?;
        let index_b = self.position(b)?;
        // The users travel, the dates stay put.
        let user_a = self.entries[index_a].user.clone();
        self.entries[index_a].user =
            std::mem::replace(&mut self.entries[index_b].user, user_a);
        Ok(())
    }

    /// Entries whose date falls in the resolved window.
    pub fn lookup(&self, window: Window) -> Vec<Entry> {
        match window {
            Window::FirstOnOrAfter(day) => self
                .entries
                .iter()
                .find(|e| e.date >= day)
                .cloned()
                .into_iter()
                .collect(),
            Window::Range { from, to } => self
                .entries
                .iter()
                .filter(|e| e.date >= from && e.date <= to)
                .cloned()
                .collect(),
        }
    }

    // -- persistence codec ---------------------------------------------------

    /// Decode a persisted document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let document: Document = serde_json::from_slice(bytes)
            .map_err(|e| RotaError::Storage(format!("cannot parse stored document: {e}")))?;
        if document.version != DOCUMENT_VERSION {
            return Err(RotaError::Storage(format!(
                "unsupported document version {}",
                document.version
            )));
        }
        Ok(Self {
            entries: document.assignments,
        })
    }

    /// Encode the roster as the persisted document.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        let document = Document {
            version: DOCUMENT_VERSION,
            assignments: self.entries.clone(),
        };
        serde_json::to_vec(&document)
            .map_err(|e| RotaError::Storage(format!("cannot serialize document: {e}")))
    }
}
