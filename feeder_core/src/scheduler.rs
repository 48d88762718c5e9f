//! Loop timers, the scheduled-feed check and the simulated day.

use crate::config::TimingCfg;
use crate::state::FeederState;
use crate::types::FeedingMode;

/// Fires at most once per period; the first poll always fires.
#[derive(Debug, Clone)]
pub struct Every {
    period_ms: u64,
    last_ms: Option<u64>,
}

impl Every {
    pub fn new(period_ms: u64) -> Self {
        Self {
            period_ms,
            last_ms: None,
        }
    }

    pub fn due(&mut self, now_ms: u64) -> bool {
        match self.last_ms {
            Some(last) if now_ms.saturating_sub(last) < self.period_ms => false,
            _ => {
                self.last_ms = Some(now_ms);
                true
            }
        }
    }
}

/// The controller's periodic duties.
#[derive(Debug, Clone)]
pub struct LoopTimers {
    pub sensors: Every,
    pub scheduler: Every,
    pub display: Every,
    pub telemetry: Every,
    pub health: Every,
}

impl From<&TimingCfg> for LoopTimers {
    fn from(t: &TimingCfg) -> Self {
        Self {
            sensors: Every::new(t.sensor_poll_ms),
            scheduler: Every::new(t.scheduler_ms),
            display: Every::new(t.display_ms),
            telemetry: Every::new(t.telemetry_ms),
            health: Every::new(t.health_check_ms),
        }
    }
}

/// True when scheduled mode is active and the feeding interval has passed.
pub fn scheduled_feed_due(state: &FeederState, now_ms: u64) -> bool {
    state.mode == FeedingMode::Scheduled
        && now_ms.saturating_sub(state.last_feed_time_ms) >= state.feed_interval_ms
}

/// A day boundary that has just been crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rollover {
    /// Index of the day that ended, counting from zero.
    pub ended_day: u64,
    pub started_ms: u64,
    pub ended_ms: u64,
}

/// Simulated day clock. Tracks how many boundaries have been handled so each
/// one is processed exactly once, even if several pass between polls.
#[derive(Debug, Clone)]
pub struct DayCycle {
    day_length_ms: u64,
    origin_ms: u64,
    processed: u64,
}

impl DayCycle {
    pub fn new(day_length_ms: u64, origin_ms: u64) -> Self {
        Self {
            day_length_ms: day_length_ms.max(1),
            origin_ms,
            processed: 0,
        }
    }

    /// Next unprocessed boundary at or before `now_ms`, marking it handled.
    pub fn next_rollover(&mut self, now_ms: u64) -> Option<Rollover> {
        let started_ms = self.origin_ms + self.processed * self.day_length_ms;
        let ended_ms = started_ms + self.day_length_ms;
        if now_ms < ended_ms {
            return None;
        }
        let ended_day = self.processed;
        self.processed += 1;
        Some(Rollover {
            ended_day,
            started_ms,
            ended_ms,
        })
    }

    /// Handle every pending boundary; returns how many there were.
    pub fn poll(&mut self, now_ms: u64) -> u64 {
        let mut n = 0;
        while self.next_rollover(now_ms).is_some() {
            n += 1;
        }
        n
    }

    /// Start of the day currently in progress.
    pub fn current_day_start_ms(&self) -> u64 {
        self.origin_ms + self.processed * self.day_length_ms
    }

    pub fn ms_until_rollover(&self, now_ms: u64) -> u64 {
        (self.current_day_start_ms() + self.day_length_ms).saturating_sub(now_ms)
    }
}
