//! Configuration types for the feeding controller.
//!
//! These are the runtime configuration structs used by `Feeder` and
//! `SensorHub`. They are separate from the TOML-deserialized config in
//! `feeder_config`.

/// Signal conditioning for the weight channels, the portion dial and the
/// digital inputs.
#[derive(Debug, Clone)]
pub struct FilterCfg {
    /// EMA weight kept from the previous weight sample. Range: [0.0, 1.0).
    pub weight_alpha: f32,
    /// EMA weight kept from the previous dial sample.
    pub pot_alpha: f32,
    /// Dial changes of this many grams or less are ignored (except at the endpoints).
    pub pot_hysteresis_g: u16,
    /// A level must hold this long before a button/switch edge is accepted.
    pub debounce_ms: u64,
    /// Full-scale reading of the dial ADC.
    pub adc_max: i32,
}

impl Default for FilterCfg {
    fn default() -> Self {
        Self {
            weight_alpha: 0.85,
            pot_alpha: 0.9,
            pot_hysteresis_g: 2,
            debounce_ms: 50,
            adc_max: 1023,
        }
    }
}

/// Physical bounds of the bowl and the storage tank.
#[derive(Debug, Clone)]
pub struct VesselCfg {
    pub bowl_max_g: f32,
    /// Readings this far outside `[0, bowl_max_g]` are rejected as sensor faults.
    pub bowl_tolerance_g: f32,
    /// The bowl stops counting as full only once it drops this far below the threshold.
    pub bowl_full_hysteresis_g: f32,
    pub tank_capacity_g: f32,
    pub tank_tolerance_g: f32,
    /// Fraction of capacity above the low threshold needed to clear the low-tank flag.
    pub tank_low_hysteresis_fraction: f32,
}

impl Default for VesselCfg {
    fn default() -> Self {
        Self {
            bowl_max_g: 500.0,
            bowl_tolerance_g: 25.0,
            bowl_full_hysteresis_g: 5.0,
            tank_capacity_g: 2000.0,
            tank_tolerance_g: 50.0,
            tank_low_hysteresis_fraction: 0.05,
        }
    }
}

/// Gate servo geometry and dispense timing.
#[derive(Debug, Clone)]
pub struct ActuatorCfg {
    pub closed_deg: u8,
    /// Opening angle for the smallest portion.
    pub open_min_deg: u8,
    /// Opening angle for the largest portion.
    pub open_max_deg: u8,
    pub hold_min_ms: u64,
    pub hold_max_ms: u64,
    /// Wall-clock budget for open, hold and close together.
    pub dispense_timeout_ms: u64,
}

impl Default for ActuatorCfg {
    fn default() -> Self {
        Self {
            closed_deg: 0,
            open_min_deg: 30,
            open_max_deg: 90,
            hold_min_ms: 200,
            hold_max_ms: 500,
            dispense_timeout_ms: 5000,
        }
    }
}

/// Safety configuration.
#[derive(Debug, Clone)]
pub struct SafetyCfg {
    /// Minimum time between two dispenses regardless of mode.
    pub min_feed_gap_ms: u64,
    /// Consecutive failures from one source that latch the emergency stop.
    pub max_consecutive_failures: u8,
    /// Health check faults when no valid weight reading arrived for this long.
    pub sensor_timeout_ms: u64,
}

impl Default for SafetyCfg {
    fn default() -> Self {
        Self {
            min_feed_gap_ms: 5000,
            max_consecutive_failures: 5,
            sensor_timeout_ms: 10_000,
        }
    }
}

/// Day cycle and feeding interval bounds.
#[derive(Debug, Clone)]
pub struct ScheduleCfg {
    pub day_length_ms: u64,
    pub fastest_interval_ms: u64,
    pub slowest_interval_ms: u64,
    /// Interval change applied by rate commands and by the tuner at the portion limits.
    pub interval_step_ms: u64,
}

impl Default for ScheduleCfg {
    fn default() -> Self {
        Self {
            day_length_ms: 120_000,
            fastest_interval_ms: 10_000,
            slowest_interval_ms: 40_000,
            interval_step_ms: 2500,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdaptiveCfg {
    /// A bowl emptied faster than this after a feed counts as rapid consumption.
    pub rapid_consumption_ms: u64,
    pub low_intake_g: f32,
    pub high_intake_g: f32,
    /// Window for consumption analysis.
    pub analysis_window_ms: u64,
}

impl Default for AdaptiveCfg {
    fn default() -> Self {
        Self {
            rapid_consumption_ms: 5000,
            low_intake_g: 25.0,
            high_intake_g: 200.0,
            analysis_window_ms: 86_400_000,
        }
    }
}

/// Periods of the cooperative loop's timers.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    pub sensor_poll_ms: u64,
    pub scheduler_ms: u64,
    pub display_ms: u64,
    pub telemetry_ms: u64,
    pub health_check_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            sensor_poll_ms: 100,
            scheduler_ms: 1000,
            display_ms: 1000,
            telemetry_ms: 10_000,
            health_check_ms: 30_000,
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone)]
pub struct Timeouts {
    /// Per-read budget handed to the load cells.
    pub sensor_ms: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { sensor_ms: 150 }
    }
}
