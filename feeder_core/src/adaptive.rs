//! Consumption analysis and end-of-day portion tuning.

use std::fmt;

use serde::Serialize;

use crate::config::{AdaptiveCfg, ScheduleCfg};
use crate::event_log::EventLog;
use crate::state::FeederState;
use crate::types::{MAX_PORTION_G, MIN_PORTION_G};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsumptionSummary {
    pub feed_count: usize,
    pub total_consumed_g: f32,
    pub avg_per_feed_g: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HealthAlert {
    LowIntake { consumed_g: f32, threshold_g: f32 },
    ExcessiveIntake { consumed_g: f32, threshold_g: f32 },
    NoFeedsToday { day: u64 },
}

impl fmt::Display for HealthAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowIntake {
                consumed_g,
                threshold_g,
            } => write!(f, "low intake: {consumed_g:.0} g eaten (below {threshold_g:.0} g)"),
            Self::ExcessiveIntake {
                consumed_g,
                threshold_g,
            } => write!(f, "excessive intake: {consumed_g:.0} g eaten (above {threshold_g:.0} g)"),
            Self::NoFeedsToday { day } => write!(f, "no feeds during day {day}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentCause {
    /// The bowl never dropped below full; the cat is being overfed.
    BowlFullAllDay,
    /// The bowl was emptied within moments of a feed.
    RapidConsumption,
}

/// Change decided at a day boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Adjustment {
    pub cause: AdjustmentCause,
    pub portion_g: u16,
    pub interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct AdaptiveTuner {
    cfg: AdaptiveCfg,
    schedule: ScheduleCfg,
}

impl AdaptiveTuner {
    pub fn new(cfg: AdaptiveCfg, schedule: ScheduleCfg) -> Self {
        Self { cfg, schedule }
    }

    /// Totals over the analysis window ending at `now_ms`. Only events with a
    /// measured consumption contribute to the total.
    pub fn analyze_consumption(&self, log: &EventLog, now_ms: u64) -> ConsumptionSummary {
        let from = now_ms.saturating_sub(self.cfg.analysis_window_ms);
        let (feed_count, total_consumed_g) = log
            .between(from, now_ms)
            .fold((0usize, 0.0f32), |(n, total), e| {
                (n + 1, total + e.consumed_g.unwrap_or(0.0))
            });
        let avg_per_feed_g = if feed_count == 0 {
            0.0
        } else {
            total_consumed_g / feed_count as f32
        };
        ConsumptionSummary {
            feed_count,
            total_consumed_g,
            avg_per_feed_g,
        }
    }

    /// Intake outside the configured band. A window with no feeds is not
    /// judged here.
    pub fn detect_unusual_behavior(&self, summary: &ConsumptionSummary) -> Option<HealthAlert> {
        if summary.feed_count == 0 {
            return None;
        }
        if summary.total_consumed_g < self.cfg.low_intake_g {
            return Some(HealthAlert::LowIntake {
                consumed_g: summary.total_consumed_g,
                threshold_g: self.cfg.low_intake_g,
            });
        }
        if summary.total_consumed_g > self.cfg.high_intake_g {
            return Some(HealthAlert::ExcessiveIntake {
                consumed_g: summary.total_consumed_g,
                threshold_g: self.cfg.high_intake_g,
            });
        }
        None
    }

    /// Decide the adjustment for the day that started at `day_start_ms`.
    ///
    /// Portion moves by one gram; once it is pinned at a limit the interval
    /// moves by one step instead. Returns `None` when nothing would change.
    pub fn end_of_day_adjustment(
        &self,
        state: &FeederState,
        log: &EventLog,
        day_start_ms: u64,
    ) -> Option<Adjustment> {
        // A day without a single valid weighing says nothing about the bowl.
        let cause = if state.bowl_full_all_day && state.weighed_today {
            AdjustmentCause::BowlFullAllDay
        } else if self.emptied_rapidly(state, log, day_start_ms) {
            AdjustmentCause::RapidConsumption
        } else {
            return None;
        };

        let step = self.schedule.interval_step_ms;
        let (portion_g, interval_ms) = match cause {
            AdjustmentCause::BowlFullAllDay if state.portion_size_g > MIN_PORTION_G => {
                (state.portion_size_g - 1, state.feed_interval_ms)
            }
            AdjustmentCause::BowlFullAllDay => (
                state.portion_size_g,
                (state.feed_interval_ms + step).min(self.schedule.slowest_interval_ms),
            ),
            AdjustmentCause::RapidConsumption if state.portion_size_g < MAX_PORTION_G => {
                (state.portion_size_g + 1, state.feed_interval_ms)
            }
            AdjustmentCause::RapidConsumption => (
                state.portion_size_g,
                state
                    .feed_interval_ms
                    .saturating_sub(step)
                    .max(self.schedule.fastest_interval_ms),
            ),
        };
        if portion_g == state.portion_size_g && interval_ms == state.feed_interval_ms {
            return None;
        }
        Some(Adjustment {
            cause,
            portion_g,
            interval_ms,
        })
    }

    fn emptied_rapidly(&self, state: &FeederState, log: &EventLog, day_start_ms: u64) -> bool {
        if state.bowl_empty_time_ms.is_none() {
            return false;
        }
        log.last_this_boot().is_some_and(|e| {
            e.timestamp_ms >= day_start_ms
                && e.eating_duration_ms
                    .is_some_and(|d| d < self.cfg.rapid_consumption_ms)
        })
    }
}
