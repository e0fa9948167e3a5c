//! Controllable server time.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// Where the server takes its timestamps from.
///
/// Tests use [`TimeSource::manual`] so `server_timestamp` ordering and
/// conflict detection are deterministic.
pub enum TimeSource {
    /// Wall-clock time.
    System,
    /// Explicitly controlled time.
    Manual(Mutex<DateTime<Utc>>),
}

impl TimeSource {
    /// Creates a manual time source starting at `start`.
    #[must_use]
    pub fn manual(start: DateTime<Utc>) -> Self {
        TimeSource::Manual(Mutex::new(start))
    }

    /// Returns the current server time.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            TimeSource::System => Utc::now(),
            TimeSource::Manual(t) => *t.lock(),
        }
    }

    /// Moves a manual source forward. No-op for [`TimeSource::System`].
    pub fn set(&self, now: DateTime<Utc>) {
        if let TimeSource::Manual(t) = self {
            *t.lock() = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn manual_source_is_settable() {
        let t0 = Utc.timestamp_opt(100, 0).unwrap();
        let t1 = Utc.timestamp_opt(200, 0).unwrap();

        let source = TimeSource::manual(t0);
        assert_eq!(source.now(), t0);

        source.set(t1);
        assert_eq!(source.now(), t1);
    }
}
