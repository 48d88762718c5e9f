use serde::Serialize;

use crate::config::VesselCfg;
use crate::settings::SystemSettings;
use crate::types::FeedingMode;

/// Level thresholds derived from settings and vessel geometry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Thresholds {
    pub bowl_full_g: f32,
    pub bowl_full_hysteresis_g: f32,
    pub bowl_empty_g: f32,
    pub tank_low_g: f32,
    pub tank_low_hysteresis_g: f32,
    pub tank_capacity_g: f32,
}

impl Thresholds {
    pub fn new(settings: &SystemSettings, vessels: &VesselCfg) -> Self {
        Self {
            bowl_full_g: settings.bowl_full_threshold_g,
            bowl_full_hysteresis_g: vessels.bowl_full_hysteresis_g,
            bowl_empty_g: settings.bowl_empty_threshold_g,
            tank_low_g: settings.tank_low_fraction * vessels.tank_capacity_g,
            tank_low_hysteresis_g: vessels.tank_low_hysteresis_fraction * vessels.tank_capacity_g,
            tank_capacity_g: vessels.tank_capacity_g,
        }
    }
}

/// Edges observed while applying new levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelChanges {
    /// The bowl just dropped to the empty threshold.
    pub bowl_emptied: bool,
    /// The tank just crossed below the low threshold.
    pub tank_went_low: bool,
}

/// Live controller state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeederState {
    pub mode: FeedingMode,
    /// Portion used by scheduled feeds; the tuner adjusts it.
    pub portion_size_g: u16,
    /// Portion currently selected on the dial; used by manual feeds.
    pub dial_portion_g: u16,
    pub bowl_level_g: f32,
    pub tank_level_g: f32,
    pub feed_events_today: u32,
    pub bowl_is_full: bool,
    pub tank_low: bool,
    /// Cleared the first time the bowl is seen below full during a day.
    pub bowl_full_all_day: bool,
    pub day_cycle: u64,
    pub last_feed_time_ms: u64,
    pub feed_interval_ms: u64,
    /// When the bowl last reached empty; cleared by the next dispense.
    pub bowl_empty_time_ms: Option<u64>,
    /// A valid weight reading was applied since the day started.
    pub weighed_today: bool,
    pub sensors_valid: bool,
}

impl FeederState {
    pub fn new(settings: &SystemSettings, mode: FeedingMode, now_ms: u64) -> Self {
        Self {
            mode,
            portion_size_g: settings.default_portion_g,
            dial_portion_g: settings.default_portion_g,
            bowl_level_g: 0.0,
            tank_level_g: 0.0,
            feed_events_today: 0,
            bowl_is_full: false,
            tank_low: false,
            bowl_full_all_day: true,
            day_cycle: 0,
            last_feed_time_ms: now_ms,
            feed_interval_ms: settings.feeding_interval_ms,
            bowl_empty_time_ms: None,
            weighed_today: false,
            sensors_valid: false,
        }
    }

    /// Store fresh readings and update the derived flags.
    pub fn apply_levels(
        &mut self,
        bowl_g: f32,
        tank_g: f32,
        th: &Thresholds,
        now_ms: u64,
    ) -> LevelChanges {
        self.bowl_level_g = bowl_g;
        self.tank_level_g = tank_g.clamp(0.0, th.tank_capacity_g);
        self.weighed_today = true;
        let was_low = self.tank_low;
        self.refresh_flags(th);

        let mut changes = LevelChanges {
            tank_went_low: self.tank_low && !was_low,
            ..LevelChanges::default()
        };
        if self.bowl_level_g <= th.bowl_empty_g {
            if self.bowl_empty_time_ms.is_none() {
                self.bowl_empty_time_ms = Some(now_ms);
                changes.bowl_emptied = true;
            }
        } else {
            self.bowl_empty_time_ms = None;
        }
        changes
    }

    /// Recompute `bowl_is_full`, `tank_low` and the all-day flag with hysteresis.
    pub fn refresh_flags(&mut self, th: &Thresholds) {
        if self.bowl_level_g >= th.bowl_full_g {
            self.bowl_is_full = true;
        } else if self.bowl_level_g < th.bowl_full_g - th.bowl_full_hysteresis_g {
            self.bowl_is_full = false;
        }
        if self.tank_level_g < th.tank_low_g {
            self.tank_low = true;
        } else if self.tank_level_g > th.tank_low_g + th.tank_low_hysteresis_g {
            self.tank_low = false;
        }
        self.bowl_full_all_day &= self.bowl_is_full;
    }

    /// Account for a successful dispense of `portion_g`.
    pub fn record_dispense(&mut self, portion_g: u16, now_ms: u64, th: &Thresholds) {
        let p = f32::from(portion_g);
        self.feed_events_today += 1;
        self.bowl_level_g += p;
        self.tank_level_g = (self.tank_level_g - p).max(0.0);
        self.last_feed_time_ms = now_ms;
        self.bowl_empty_time_ms = None;
        self.refresh_flags(th);
    }

    /// Milliseconds until the schedule allows the next feed.
    pub fn ms_until_next_feed(&self, now_ms: u64) -> u64 {
        self.feed_interval_ms
            .saturating_sub(now_ms.saturating_sub(self.last_feed_time_ms))
    }

    /// Daily counters back to their start-of-day values.
    pub fn start_new_day(&mut self) {
        self.feed_events_today = 0;
        self.bowl_full_all_day = true;
        self.weighed_today = false;
        self.bowl_empty_time_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn th() -> Thresholds {
        Thresholds::new(&SystemSettings::default(), &VesselCfg::default())
    }

    #[test]
    fn thresholds_follow_settings() {
        let t = th();
        assert_eq!(t.bowl_full_g, 80.0);
        assert_eq!(t.tank_low_g, 500.0);
        assert_eq!(t.tank_low_hysteresis_g, 100.0);
    }

    #[test]
    fn bowl_full_flag_has_hysteresis() {
        let t = th();
        let mut s = FeederState::new(&SystemSettings::default(), FeedingMode::Scheduled, 0);
        s.apply_levels(80.0, 1500.0, &t, 0);
        assert!(s.bowl_is_full);
        s.apply_levels(77.0, 1500.0, &t, 100);
        assert!(s.bowl_is_full, "inside hysteresis band");
        s.apply_levels(74.0, 1500.0, &t, 200);
        assert!(!s.bowl_is_full);
        assert!(!s.bowl_full_all_day);
    }

    #[test]
    fn tank_low_edge_reported_once() {
        let t = th();
        let mut s = FeederState::new(&SystemSettings::default(), FeedingMode::Scheduled, 0);
        assert!(!s.apply_levels(0.0, 1000.0, &t, 0).tank_went_low);
        assert!(s.apply_levels(0.0, 400.0, &t, 100).tank_went_low);
        assert!(!s.apply_levels(0.0, 399.0, &t, 200).tank_went_low);
        s.apply_levels(0.0, 550.0, &t, 300);
        assert!(s.tank_low, "still within hysteresis");
        s.apply_levels(0.0, 601.0, &t, 400);
        assert!(!s.tank_low);
    }

    #[test]
    fn bowl_emptied_fires_once_until_refilled() {
        let t = th();
        let mut s = FeederState::new(&SystemSettings::default(), FeedingMode::Scheduled, 0);
        assert!(s.apply_levels(3.0, 1000.0, &t, 10).bowl_emptied);
        assert!(!s.apply_levels(2.0, 1000.0, &t, 20).bowl_emptied);
        assert_eq!(s.bowl_empty_time_ms, Some(10));
        s.record_dispense(40, 30, &t);
        assert_eq!(s.bowl_empty_time_ms, None);
        assert_eq!(s.bowl_level_g, 42.0);
        assert_eq!(s.tank_level_g, 960.0);
        assert_eq!(s.last_feed_time_ms, 30);
    }

    #[test]
    fn start_of_day_forgets_the_weighing() {
        let t = th();
        let mut s = FeederState::new(&SystemSettings::default(), FeedingMode::Scheduled, 0);
        assert!(!s.weighed_today);
        s.apply_levels(90.0, 1000.0, &t, 0);
        assert!(s.weighed_today);
        s.start_new_day();
        assert!(!s.weighed_today);
        assert!(s.bowl_full_all_day);
    }
}
