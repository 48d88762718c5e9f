//! Bounded history of feeding events.
//!
//! When the log is full, the oldest `COMPACTION_DROP` entries are discarded
//! in one go before the new event is appended.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::types::FeedingMode;

pub const LOG_CAPACITY: usize = 50;
pub const COMPACTION_DROP: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingEvent {
    /// Controller time of the dispense.
    pub timestamp_ms: u64,
    pub mode: FeedingMode,
    pub requested_g: u16,
    pub bowl_before_g: f32,
    pub bowl_after_g: f32,
    /// Filled in once the bowl is seen empty again.
    #[serde(default)]
    pub consumed_g: Option<f32>,
    #[serde(default)]
    pub eating_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: VecDeque<FeedingEvent>,
    /// Leading events carried over from a previous boot. Their timestamps
    /// belong to another clock and are kept out of time-based queries.
    restored: usize,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: VecDeque::with_capacity(LOG_CAPACITY),
            restored: 0,
        }
    }

    /// Rebuild a log from events recorded during this boot, oldest first.
    pub fn from_events(events: impl IntoIterator<Item = FeedingEvent>) -> Self {
        let mut log = Self::new();
        for e in events {
            log.append(e);
        }
        log
    }

    /// Rebuild a log from a previous boot's history. Every loaded event is
    /// marked restored; events appended later are not.
    pub fn restore(events: impl IntoIterator<Item = FeedingEvent>) -> Self {
        let mut log = Self::from_events(events);
        log.restored = log.events.len();
        log
    }

    /// Number of events carried over from a previous boot.
    pub fn restored_len(&self) -> usize {
        self.restored
    }

    /// Append an event; returns how many old events were dropped to make room.
    pub fn append(&mut self, event: FeedingEvent) -> usize {
        let mut dropped = 0;
        if self.events.len() >= LOG_CAPACITY {
            dropped = COMPACTION_DROP.min(self.events.len());
            self.events.drain(..dropped);
            self.restored = self.restored.saturating_sub(dropped);
        }
        self.events.push_back(event);
        dropped
    }

    /// Record what was eaten after the most recent dispense.
    ///
    /// Returns the updated event, or `None` if the log is empty or the last
    /// event was already completed.
    pub fn complete_last(&mut self, consumed_g: f32, eating_duration_ms: u64) -> Option<&FeedingEvent> {
        let last = self.events.back_mut()?;
        if last.consumed_g.is_some() {
            return None;
        }
        last.consumed_g = Some(consumed_g.max(0.0));
        last.eating_duration_ms = Some(eating_duration_ms);
        Some(last)
    }

    pub fn last(&self) -> Option<&FeedingEvent> {
        self.events.back()
    }

    /// Most recent event recorded during this boot.
    pub fn last_this_boot(&self) -> Option<&FeedingEvent> {
        if self.events.len() > self.restored {
            self.events.back()
        } else {
            None
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &FeedingEvent> + '_ {
        self.events.iter()
    }

    /// Up to `n` events, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &FeedingEvent> + '_ {
        self.events.iter().rev().take(n)
    }

    /// Events of this boot with `from_ms <= timestamp_ms <= to_ms`.
    pub fn between(&self, from_ms: u64, to_ms: u64) -> impl Iterator<Item = &FeedingEvent> + '_ {
        self.events
            .iter()
            .skip(self.restored)
            .filter(move |e| (from_ms..=to_ms).contains(&e.timestamp_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(ts: u64) -> FeedingEvent {
        FeedingEvent {
            timestamp_ms: ts,
            mode: FeedingMode::Scheduled,
            requested_g: 50,
            bowl_before_g: 0.0,
            bowl_after_g: 50.0,
            consumed_g: None,
            eating_duration_ms: None,
        }
    }

    #[test]
    fn recent_is_newest_first() {
        let log = EventLog::from_events((1..=5).map(ev));
        let ts: Vec<u64> = log.recent(3).map(|e| e.timestamp_ms).collect();
        assert_eq!(ts, vec![5, 4, 3]);
    }

    #[test]
    fn completion_happens_once() {
        let mut log = EventLog::new();
        assert!(log.complete_last(10.0, 100).is_none());
        log.append(ev(1));
        assert_eq!(log.complete_last(48.0, 9_000).map(|e| e.consumed_g), Some(Some(48.0)));
        assert!(log.complete_last(1.0, 1).is_none());
    }

    #[test]
    fn restored_events_stay_out_of_time_queries() {
        let mut log = EventLog::restore([ev(200_000), ev(300_000)]);
        assert_eq!(log.len(), 2);
        assert!(log.last_this_boot().is_none());
        assert_eq!(log.between(0, u64::MAX).count(), 0);

        log.append(ev(1_000));
        assert_eq!(log.last_this_boot().map(|e| e.timestamp_ms), Some(1_000));
        let ts: Vec<u64> = log.between(0, 2_000).map(|e| e.timestamp_ms).collect();
        assert_eq!(ts, vec![1_000]);
    }

    #[test]
    fn compaction_releases_restored_events_first() {
        let mut log = EventLog::restore((0..LOG_CAPACITY as u64).map(ev));
        assert_eq!(log.restored_len(), LOG_CAPACITY);
        assert_eq!(log.append(ev(7)), COMPACTION_DROP);
        assert_eq!(log.restored_len(), LOG_CAPACITY - COMPACTION_DROP);
        assert_eq!(log.last_this_boot().map(|e| e.timestamp_ms), Some(7));
    }
}
