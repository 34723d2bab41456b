//! Injectable wall clock
//!
//! Daily quotas and streak counters reset at local midnight in the campaign's
//! configured timezone. The reset must be idempotent and testable, so the
//! current time is an explicit dependency of the orchestrator rather than a
//! call to `Utc::now()` buried in draw logic.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use parking_lot::Mutex;

/// Source of the current UTC time.
///
/// Production code uses [`SystemClock`]; tests use [`FixedClock`] to pin or
/// advance time deterministically.
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real wall clock.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually controlled clock for tests.
///
/// # Example
/// ```
/// use loyalty_lottery_core_rs::core::{Clock, FixedClock};
/// use chrono::{TimeZone, Utc};
///
/// let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
/// clock.advance_days(1);
/// assert_eq!(clock.now_utc().to_rfc3339(), "2026-03-02T12:00:00+00:00");
/// ```
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance_days(&self, days: i64) {
        let mut guard = self.now.lock();
        *guard = *guard + chrono::Duration::days(days);
    }

    pub fn advance_seconds(&self, seconds: i64) {
        let mut guard = self.now.lock();
        *guard = *guard + chrono::Duration::seconds(seconds);
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Calendar date at `now` in a fixed-offset timezone.
///
/// Offsets outside the valid range (|offset| >= 24h) are rejected at policy
/// load time; an out-of-range value reaching this function falls back to UTC.
pub fn local_date(now: DateTime<Utc>, utc_offset_secs: i32) -> NaiveDate {
    let offset = FixedOffset::east_opt(utc_offset_secs)
        .unwrap_or_else(|| FixedOffset::east_opt(0).expect("zero offset is valid"));
    now.with_timezone(&offset).date_naive()
}
