//! `ScanEnvironment`: periodic plus on-demand environment scans.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanDirective {
    pub scope: String,
    pub depth: u8,
    pub priority: u8,
}

impl ScanDirective {
    pub fn new(scope: impl Into<String>) -> Self {
        Self { scope: scope.into(), depth: 1, priority: 0 }
    }
}

pub struct ScanSchedule {
    pub interval: Duration,
    pub directive: ScanDirective,
}

impl ScanSchedule {
    pub fn new(directive: ScanDirective) -> Self {
        Self { interval: DEFAULT_SCAN_INTERVAL, directive }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_interval_is_five_minutes() {
        let schedule = ScanSchedule::new(ScanDirective::new("market"));
        assert_eq!(schedule.interval, DEFAULT_SCAN_INTERVAL);
    }
}
