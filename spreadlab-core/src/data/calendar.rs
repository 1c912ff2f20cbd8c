//! Trading calendar: the ordered session dates a run walks over.
//!
//! The pipeline needs two things from a calendar: whether a date is a
//! session, and the session immediately before it (the last day whose close
//! is known at trade time).

use chrono::{Datelike, NaiveDate, Weekday};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("read calendar file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line}: '{value}' is not a YYYY-MM-DD date")]
    InvalidDate { line: usize, value: String },

    #[error("calendar range is empty: {start} to {end}")]
    EmptyRange { start: NaiveDate, end: NaiveDate },
}

/// Ordered session dates with prior-session lookup.
pub trait TradingCalendar: Send + Sync {
    /// All sessions, ascending and unique.
    fn sessions(&self) -> &[NaiveDate];

    fn contains(&self, date: NaiveDate) -> bool {
        self.sessions().binary_search(&date).is_ok()
    }

    /// The last session strictly before `date`.
    fn prior_session(&self, date: NaiveDate) -> Option<NaiveDate> {
        let sessions = self.sessions();
        let idx = match sessions.binary_search(&date) {
            Ok(i) | Err(i) => i,
        };
        idx.checked_sub(1).map(|i| sessions[i])
    }
}

/// A calendar backed by an explicit session list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCalendar {
    sessions: Vec<NaiveDate>,
}

impl SessionCalendar {
    /// Build from any list of dates; sorts and removes duplicates.
    pub fn new(mut sessions: Vec<NaiveDate>) -> Self {
        sessions.sort_unstable();
        sessions.dedup();
        Self { sessions }
    }

    /// Monday-to-Friday sessions in `[start, end]`, minus `holidays`.
    pub fn weekdays(
        start: NaiveDate,
        end: NaiveDate,
        holidays: &[NaiveDate],
    ) -> Result<Self, CalendarError> {
        if end < start {
            return Err(CalendarError::EmptyRange { start, end });
        }
        let sessions = start
            .iter_days()
            .take_while(|d| *d <= end)
            .filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
            .filter(|d| !holidays.contains(d))
            .collect();
        Ok(Self::new(sessions))
    }

    /// Load from a text file with one `YYYY-MM-DD` per line.
    ///
    /// Blank lines and lines starting with `#` are ignored.
    pub fn from_file(path: &Path) -> Result<Self, CalendarError> {
        let content = std::fs::read_to_string(path).map_err(|source| CalendarError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, CalendarError> {
        let mut sessions = Vec::new();
        for (i, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let date = NaiveDate::parse_from_str(line, "%Y-%m-%d").map_err(|_| {
                CalendarError::InvalidDate {
                    line: i + 1,
                    value: line.to_string(),
                }
            })?;
            sessions.push(date);
        }
        Ok(Self::new(sessions))
    }

    /// Sessions within `[start, end]` that have a prior session in this calendar.
    ///
    /// The first session of the calendar is never a candidate: it has no
    /// prior close to anchor the regime window on.
    pub fn candidate_dates(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Vec<NaiveDate> {
        self.sessions
            .iter()
            .skip(1)
            .copied()
            .filter(|d| start.map_or(true, |s| *d >= s))
            .filter(|d| end.map_or(true, |e| *d <= e))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl TradingCalendar for SessionCalendar {
    fn sessions(&self) -> &[NaiveDate] {
        &self.sessions
    }
}
