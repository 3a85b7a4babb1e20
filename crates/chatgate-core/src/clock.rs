//! Time source abstraction.
//!
//! Penalty expiry and day-partition rollover both depend on "now", so every
//! component that reads the time takes a `Clock` instead of calling
//! `Utc::now()` directly.

use std::sync::Mutex;

use chrono::{DateTime, Datelike, Local, TimeDelta, Utc};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for tests and replay tooling.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += delta;
    }

    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Local calendar day identifier, `YYYY-M-D` without zero padding.
pub fn day_id(instant: DateTime<Utc>) -> String {
    let local = instant.with_timezone(&Local);
    format!("{}-{}-{}", local.year(), local.month(), local.day())
}

/// Human readable local timestamp used in statistics and rejection messages.
pub fn format_local(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&Local)
        .format("%Y/%m/%d %H:%M:%S")
        .to_string()
}

/// Converts epoch milliseconds back into an instant, clamping garbage to the epoch.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}
