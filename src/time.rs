//! Event time windows.
//!
//! An event covers a half-open interval `[start, end)`. Events that are still
//! active have no end. All reads made while explaining an event are taken at
//! `start`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A half-open interval `[start, end)`.
///
/// # Examples
///
/// ```
/// use traitlens::TimeRange;
/// use chrono::{Duration, Utc};
///
/// let start = Utc::now();
/// let window = TimeRange::new(start, start + Duration::minutes(5)).unwrap();
/// assert!(window.contains(start));
/// assert!(!window.is_open_ended());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the range (inclusive).
    pub start: DateTime<Utc>,

    /// End of the range (exclusive). None means still active.
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    /// Creates a closed range.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if `start >= end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, ValidationError> {
        if start >= end {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self {
            start,
            end: Some(end),
        })
    }

    /// Creates an open-ended range starting at the given time.
    #[must_use]
    pub const fn starting_at(start: DateTime<Utc>) -> Self {
        Self { start, end: None }
    }

    pub const fn is_open_ended(&self) -> bool {
        self.end.is_none()
    }

    /// Check if a timestamp falls within this range [start, end).
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && self.end.map_or(true, |end| time < end)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.end.map(|end| end - self.start)
    }

    /// Closes an open-ended range at the specified time.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidTimeRange` if the close time is not after the start.
    pub fn close_at(&mut self, at: DateTime<Utc>) -> Result<(), ValidationError> {
        if at <= self.start {
            return Err(ValidationError::InvalidTimeRange {
                start: self.start,
                end: at,
            });
        }
        self.end = Some(at);
        Ok(())
    }
}

impl std::fmt::Display for TimeRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.end {
            Some(end) => write!(f, "[{} → {})", self.start, end),
            None => write!(f, "[{} → ∞)", self.start),
        }
    }
}
