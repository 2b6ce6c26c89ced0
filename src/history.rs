//! Bounded chronological log of ticker snapshots with change derivation.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Result, TickwatchError};

/// Hard cap on stored snapshots.
pub const DEFAULT_CAPACITY: usize = 72_000;

/// Number of oldest snapshots dropped at once when the cap is exceeded.
pub const DEFAULT_EVICT_BATCH: usize = 2_000;

/// Size limits and derivation options for a [`HistoryBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    pub capacity: usize,
    pub evict_batch: usize,
    /// Multiply derived bid changes by 100 while ask changes stay raw.
    ///
    /// Existing consumers rely on this asymmetry; it is most likely a
    /// defect and can be switched off once they are migrated.
    pub legacy_bid_scale: bool,
}

impl HistoryConfig {
    /// Checks that the limits keep a non-empty buffer: a capacity of at
    /// least one and an evict batch between one and the capacity.
    ///
    /// # Errors
    ///
    /// Returns [`TickwatchError::Config`] naming the offending limit.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(TickwatchError::Config(
                "history capacity must be at least 1".to_string(),
            ));
        }
        if self.evict_batch == 0 || self.evict_batch > self.capacity {
            return Err(TickwatchError::Config(format!(
                "history evict batch must be between 1 and {}",
                self.capacity
            )));
        }
        Ok(())
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            evict_batch: DEFAULT_EVICT_BATCH,
            legacy_bid_scale: true,
        }
    }
}

/// Point-in-time ticker snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub time: DateTime<Utc>,
    pub ask: Decimal,
    pub bid: Decimal,
    /// Last trade price at `time`.
    pub current: Decimal,
}

/// Changes derived from comparing a snapshot to its predecessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryDeltas {
    /// Percentage change of the last price; zero when the previous last
    /// price was zero.
    pub change_percent: Decimal,
    /// Set only when the bid moved.
    pub bid_change: Option<Decimal>,
    /// Set only when the ask moved.
    pub ask_change: Option<Decimal>,
}

/// Result of [`HistoryBuffer::record_snapshot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOutcome {
    /// Ask, bid and last matched the newest entry; nothing was stored.
    Unchanged,
    /// A new entry was stored. Deltas are absent for the very first entry.
    Appended(Option<HistoryDeltas>),
}

impl SnapshotOutcome {
    pub fn is_appended(&self) -> bool {
        matches!(self, Self::Appended(_))
    }
}

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    config: HistoryConfig,
}

impl HistoryBuffer {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            entries: VecDeque::new(),
            config,
        }
    }

    pub fn config(&self) -> &HistoryConfig {
        &self.config
    }

    /// Records a snapshot unless it repeats the newest entry.
    ///
    /// The append and the cap check happen under the same `&mut self`, so
    /// wrapping the buffer in a lock makes the whole step atomic.
    pub fn record_snapshot(
        &mut self,
        time: DateTime<Utc>,
        ask: Decimal,
        bid: Decimal,
        last: Decimal,
    ) -> SnapshotOutcome {
        let deltas = match self.entries.back() {
            Some(prev) if prev.ask == ask && prev.bid == bid && prev.current == last => {
                return SnapshotOutcome::Unchanged;
            }
            Some(prev) => Some(self.derive(prev, ask, bid, last)),
            None => None,
        };

        let evicted = push_bounded(
            &mut self.entries,
            HistoryEntry {
                time,
                ask,
                bid,
                current: last,
            },
            self.config.capacity,
            self.config.evict_batch,
        );
        if evicted > 0 {
            debug!(evicted, len = self.entries.len(), "Evicted oldest history entries");
        }

        SnapshotOutcome::Appended(deltas)
    }

    fn derive(&self, prev: &HistoryEntry, ask: Decimal, bid: Decimal, last: Decimal) -> HistoryDeltas {
        let change_percent = percent_change(prev.current, last);

        let bid_change = (prev.bid != bid).then(|| {
            let delta = bid - prev.bid;
            if self.config.legacy_bid_scale {
                delta * Decimal::ONE_HUNDRED
            } else {
                delta
            }
        });
        let ask_change = (prev.ask != ask).then(|| ask - prev.ask);

        HistoryDeltas {
            change_percent,
            bid_change,
            ask_change,
        }
    }

    /// Newest entry whose time is at or before `time`, scanning from the
    /// most recent end.
    pub fn nearest_at_or_before(&self, time: DateTime<Utc>) -> Option<&HistoryEntry> {
        self.entries.iter().rev().find(|h| h.time <= time)
    }

    pub fn latest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn oldest(&self) -> Option<&HistoryEntry> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Copies the stored entries, oldest first.
    pub fn to_vec(&self) -> Vec<HistoryEntry> {
        self.entries.iter().copied().collect()
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(HistoryConfig::default())
    }
}

/// `(current - previous) / previous * 100`, or zero when `previous` is zero
/// or the result does not fit a `Decimal`.
pub fn percent_change(previous: Decimal, current: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    (current - previous)
        .checked_div(previous)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

/// Appends `item`, then drops the oldest `batch` items in one step if the
/// buffer grew past `capacity`. Returns how many items were dropped.
///
/// The appended item always survives, whatever the limits.
pub(crate) fn push_bounded<T>(
    buf: &mut VecDeque<T>,
    item: T,
    capacity: usize,
    batch: usize,
) -> usize {
    buf.push_back(item);
    if buf.len() <= capacity {
        return 0;
    }
    let n = batch.max(buf.len() - capacity).min(buf.len() - 1);
    buf.drain(..n);
    n
}
