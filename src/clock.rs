//! Process start time and uptime.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Wall-clock and monotonic start time of this process.
///
/// Created once in `main` and handed to whatever reports uptime.
#[derive(Debug, Clone, Copy)]
pub struct ProcessClock {
    started: Instant,
    started_at: DateTime<Utc>,
}

impl ProcessClock {
    #[must_use]
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uptime_is_monotonic() {
        let clock = ProcessClock::start();
        let first = clock.uptime();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.uptime() > first);
        assert!(clock.started_at() <= Utc::now());
    }
}
