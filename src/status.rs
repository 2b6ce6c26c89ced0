//! Edge-triggered log of currency enabled/disabled transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryItem {
    pub time: DateTime<Utc>,
    pub enabled: bool,
}

/// Append-only log that stores an observation only when it differs from
/// the previous one.
#[derive(Debug, Clone, Default)]
pub struct StatusLog {
    items: Vec<StatusHistoryItem>,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `enabled` if the log is empty or the value changed.
    /// Returns `true` when an entry was appended.
    pub fn record_status(&mut self, enabled: bool, time: DateTime<Utc>) -> bool {
        if self.items.last().is_some_and(|last| last.enabled == enabled) {
            return false;
        }
        self.items.push(StatusHistoryItem { time, enabled });
        true
    }

    pub fn last(&self) -> Option<&StatusHistoryItem> {
        self.items.last()
    }

    pub fn items(&self) -> &[StatusHistoryItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_observation_always_recorded() {
        let mut log = StatusLog::new();
        assert!(log.record_status(false, Utc::now()));
        assert_eq!(log.len(), 1);
        assert!(!log.last().unwrap().enabled);
    }

    #[test]
    fn repeated_value_recorded_once() {
        let mut log = StatusLog::new();
        for _ in 0..10 {
            log.record_status(true, Utc::now());
        }
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn alternating_values_recorded_every_time() {
        let mut log = StatusLog::new();
        for i in 0..10 {
            assert!(log.record_status(i % 2 == 0, Utc::now()));
        }
        assert_eq!(log.len(), 10);
    }
}
