//! Working-hours gate and wall clock.
//!
//! Actions run only Monday through Friday, within `[start_hour, end_hour)`
//! local time. Weekends are always closed; `start_hour == end_hour` is an
//! empty window.

use chrono::{DateTime, Datelike, Local, TimeDelta, Timelike, Weekday};
use parking_lot::Mutex;

use crate::config::CampaignConfig;

/// Is `now` inside the working window?
pub fn is_open<T: Datelike + Timelike>(now: &T, start_hour: u32, end_hour: u32) -> bool {
    if matches!(now.weekday(), Weekday::Sat | Weekday::Sun) {
        return false;
    }
    (start_hour..end_hour).contains(&now.hour())
}

/// Working window in whole local hours.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl WorkingHours {
    pub fn new(start_hour: u32, end_hour: u32) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub fn is_open<T: Datelike + Timelike>(&self, now: &T) -> bool {
        is_open(now, self.start_hour, self.end_hour)
    }
}

impl From<&CampaignConfig> for WorkingHours {
    fn from(config: &CampaignConfig) -> Self {
        Self::new(config.start_hour, config.end_hour)
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of local wall-clock time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Local>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Local>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: TimeDelta) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.lock()
    }
}
