//! Limit and timeout thresholds for bounded workers.
//!
//! Both thresholds have an unbounded form. An unbounded timeout becomes a
//! deadline at the far end of the calendar rather than a special case, so
//! expiry is always the single comparison `now >= deadline`.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of items a worker may handle in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Limit {
    #[default]
    Unbounded,
    Max(usize),
}

impl Limit {
    /// Whether `count` items would go over the limit.
    ///
    /// The limit itself is inclusive: `Max(3)` allows exactly three.
    pub fn is_exceeded_by(&self, count: usize) -> bool {
        match self {
            Limit::Unbounded => false,
            Limit::Max(max) => count > *max,
        }
    }

    pub fn as_option(&self) -> Option<usize> {
        match self {
            Limit::Unbounded => None,
            Limit::Max(max) => Some(*max),
        }
    }
}

impl From<Option<usize>> for Limit {
    fn from(value: Option<usize>) -> Self {
        value.map(Limit::Max).unwrap_or(Limit::Unbounded)
    }
}

/// Wall-clock budget of a worker run, measured from its (re)start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Timeout {
    #[default]
    Unbounded,
    After(Duration),
}

impl Timeout {
    pub fn from_secs(secs: u64) -> Self {
        Timeout::After(Duration::from_secs(secs))
    }

    /// Absolute deadline for a run starting at `start`.
    pub fn deadline_from(&self, start: DateTime<Utc>) -> Deadline {
        let at = match self {
            Timeout::Unbounded => DateTime::<Utc>::MAX_UTC,
            Timeout::After(duration) => TimeDelta::from_std(*duration)
                .ok()
                .and_then(|delta| start.checked_add_signed(delta))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        Deadline { at }
    }

    /// Deadline for a run starting now.
    pub fn start(&self) -> Deadline {
        self.deadline_from(Utc::now())
    }
}

impl From<Option<u64>> for Timeout {
    fn from(value: Option<u64>) -> Self {
        value.map(Timeout::from_secs).unwrap_or(Timeout::Unbounded)
    }
}

/// An absolute expiry timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: DateTime<Utc>,
}

impl Deadline {
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Limit and timeout applied to producer and consumer runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkerBounds {
    #[serde(default)]
    pub limit: Limit,
    #[serde(default)]
    pub timeout: Timeout,
}

impl WorkerBounds {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: Limit) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = timeout;
        self
    }
}
