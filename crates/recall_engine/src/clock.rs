//! Time source abstraction.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Where the engine takes its timestamps from.
///
/// Injected so tests can drive `updated_at` ordering deterministically.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock under explicit test control.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Sets the current time.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

// Lets tests keep a handle on a shared clock after handing it to the
// engine.
impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(Utc.timestamp_opt(100, 0).unwrap());
        assert_eq!(clock.now(), Utc.timestamp_opt(100, 0).unwrap());

        clock.advance(Duration::seconds(50));
        assert_eq!(clock.now(), Utc.timestamp_opt(150, 0).unwrap());

        clock.set(Utc.timestamp_opt(10, 0).unwrap());
        assert_eq!(clock.now(), Utc.timestamp_opt(10, 0).unwrap());
    }
}
