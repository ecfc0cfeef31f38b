use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};

/// Source of "now" for the engine facade.
///
/// The sweep and booking algorithms themselves take the current time as an
/// explicit parameter; this trait only exists at the boundary so callers
/// (the binary, tests) decide where that time comes from. Tests inject a
/// `MockClock` and drive it forward to simulate activation and expiry.
pub trait Clock: std::fmt::Debug + Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock shared between the test and the engine under test.
#[derive(Debug, Clone)]
pub struct MockClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl MockClock {
    pub fn new(now: DateTime<Utc>) -> MockClock {
        MockClock { now: Arc::new(RwLock::new(now)) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().unwrap() = now;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}
