//! Time source and business-day arithmetic
//!
//! All `now` reads in the engine go through an injected [`Clock`] so that
//! deadline and window tests are deterministic, rather than racing against
//! wall-clock time.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Datelike, Duration, Utc, Weekday};

/// Abstract time source.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock, backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Test clock with a settable, atomically-stored instant.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use extrashifty_engine::clock::{Clock, TestClock};
///
/// let clock = TestClock::new(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap());
/// let t0 = clock.now();
/// clock.advance(chrono::Duration::hours(1));
/// assert_eq!(clock.now(), t0 + chrono::Duration::hours(1));
/// ```
pub struct TestClock {
    micros_since_epoch: AtomicI64,
}

impl TestClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self {
            micros_since_epoch: AtomicI64::new(at.timestamp_micros()),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        self.micros_since_epoch
            .store(at.timestamp_micros(), Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.micros_since_epoch
            .fetch_add(by.num_microseconds().unwrap_or(0), Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_micros(self.micros_since_epoch.load(Ordering::SeqCst))
            .expect("TestClock instant always valid")
    }
}

/// Add `n` business days (Mon-Fri, UTC, no holiday calendar) to `from`.
///
/// # Example
/// ```
/// use chrono::{TimeZone, Utc};
/// use extrashifty_engine::clock::add_business_days;
///
/// // Friday + 3 business days -> following Wednesday.
/// let friday = Utc.with_ymd_and_hms(2026, 7, 31, 12, 0, 0).unwrap();
/// let deadline = add_business_days(friday, 3);
/// assert_eq!(deadline.weekday(), chrono::Weekday::Wed);
/// ```
pub fn add_business_days(from: DateTime<Utc>, n: i64) -> DateTime<Utc> {
    use chrono::Datelike as _;
    let mut remaining = n;
    let mut day = from;
    while remaining > 0 {
        day += Duration::days(1);
        if !matches!(day.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    day
}

pub fn is_weekend(at: DateTime<Utc>) -> bool {
    matches!(at.weekday(), Weekday::Sat | Weekday::Sun)
}
