#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema and calibration parsing for the pet feeder.
//!
//! - `Config` and its sections are deserialized from TOML; every section has
//!   defaults so an empty file describes the stock simulator build.
//! - `Config::validate()` rejects out-of-range values with the offending key.
//! - The calibration CSV loader fits `raw,grams` pairs for a load cell.

pub mod calibration;

pub use calibration::{CalibrationRow, LoadCellCalibration, load_calibration_csv};

use serde::Deserialize;
use std::ops::RangeInclusive;

/// Allowed portion sizes in grams. Kept equal to the core's portion limits.
pub const PORTION_RANGE_G: RangeInclusive<u16> = 30..=75;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub bowl_dt: u8,
    pub bowl_sck: u8,
    pub tank_dt: u8,
    pub tank_sck: u8,
    pub servo: u8,
    pub feed_button: u8,
    pub mode_switch: u8,
    /// MCP3008 channel wired to the portion potentiometer.
    pub pot_channel: u8,
    pub estop_in: Option<u8>,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            bowl_dt: 5,
            bowl_sck: 6,
            tank_dt: 20,
            tank_sck: 21,
            servo: 18,
            feed_button: 17,
            mode_switch: 27,
            pot_channel: 0,
            estop_in: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct FilterCfg {
    /// EMA weight on the previous value for load cell readings. Range: [0.0, 1.0).
    pub weight_alpha: f32,
    /// EMA weight on the previous value for the potentiometer. Range: [0.0, 1.0).
    pub pot_alpha: f32,
    /// Reported dial portion only moves by more than this many grams.
    pub pot_hysteresis_g: u16,
    /// Button/switch level must be stable this long to count.
    pub debounce_ms: u64,
    /// Full-scale ADC value of the potentiometer channel.
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

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ActuatorCfg {
    pub closed_deg: u8,
    pub open_min_deg: u8,
    pub open_max_deg: u8,
    pub hold_min_ms: u64,
    pub hold_max_ms: u64,
    /// Upper bound on one complete open-hold-close sequence.
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
            dispense_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Safety {
    /// Minimum gap between any two dispenses.
    pub min_feed_gap_ms: u64,
    /// Consecutive failures of one source that latch emergency mode.
    pub max_consecutive_failures: u8,
    /// No valid weight reading for this long counts as a sensor failure.
    pub sensor_timeout_ms: u64,
}

impl Default for Safety {
    fn default() -> Self {
        Self {
            min_feed_gap_ms: 5_000,
            max_consecutive_failures: 5,
            sensor_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Schedule {
    /// Length of one simulated day.
    pub day_length_ms: u64,
    /// Shortest allowed interval between scheduled feeds.
    pub fastest_interval_ms: u64,
    /// Longest allowed interval between scheduled feeds.
    pub slowest_interval_ms: u64,
    /// Amount one `increase`/`decrease` or adaptive nudge moves the interval.
    pub interval_step_ms: u64,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            day_length_ms: 120_000,
            fastest_interval_ms: 10_000,
            slowest_interval_ms: 40_000,
            interval_step_ms: 2_500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Adaptive {
    /// Bowl emptied faster than this after a feed counts as rapid consumption.
    pub rapid_consumption_ms: u64,
    pub low_intake_g: f32,
    pub high_intake_g: f32,
    pub analysis_window_ms: u64,
}

impl Default for Adaptive {
    fn default() -> Self {
        Self {
            rapid_consumption_ms: 5_000,
            low_intake_g: 25.0,
            high_intake_g: 200.0,
            analysis_window_ms: 24 * 60 * 60 * 1000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Bowl {
    pub max_g: f32,
    /// Readings beyond [-tolerance, max + tolerance] are rejected.
    pub tolerance_g: f32,
    /// Full flag clears only once the bowl drops this far below the threshold.
    pub full_hysteresis_g: f32,
}

impl Default for Bowl {
    fn default() -> Self {
        Self {
            max_g: 500.0,
            tolerance_g: 25.0,
            full_hysteresis_g: 5.0,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Tank {
    pub capacity_g: f32,
    pub tolerance_g: f32,
    /// Low flag clears only once the tank rises this fraction of capacity above the threshold.
    pub low_hysteresis_fraction: f32,
}

impl Default for Tank {
    fn default() -> Self {
        Self {
            capacity_g: 2_000.0,
            tolerance_g: 50.0,
            low_hysteresis_fraction: 0.05,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub sensor_poll_ms: u64,
    pub scheduler_ms: u64,
    pub display_ms: u64,
    pub telemetry_ms: u64,
    pub health_check_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            sensor_poll_ms: 100,
            scheduler_ms: 1_000,
            display_ms: 1_000,
            telemetry_ms: 10_000,
            health_check_ms: 30_000,
        }
    }
}

/// Factory settings used when the persisted settings record is missing or invalid.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub default_portion_g: u16,
    pub feeding_interval_ms: u64,
    pub bowl_full_threshold_g: f32,
    pub bowl_empty_threshold_g: f32,
    pub tank_low_fraction: f32,
    pub adaptive_enabled: bool,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            default_portion_g: 50,
            feeding_interval_ms: 20_000,
            bowl_full_threshold_g: 80.0,
            bowl_empty_threshold_g: 5.0,
            tank_low_fraction: 0.25,
            adaptive_enabled: true,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Hardware {
    /// Max time to wait for HX711 data-ready (DT low) before failing
    pub sensor_read_timeout_ms: u64,
    /// Servo sweep speed; the gate moves one degree per step.
    pub servo_step_ms: u64,
}

impl Default for Hardware {
    fn default() -> Self {
        Self {
            sensor_read_timeout_ms: 150,
            servo_step_ms: 15,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct EstopCfg {
    /// Treat low level as pressed when true
    pub active_low: bool,
    /// Number of consecutive polls required to latch E-stop
    pub debounce_n: u8,
}

impl Default for EstopCfg {
    fn default() -> Self {
        Self {
            active_low: true,
            debounce_n: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TelemetryCfg {
    pub enabled: bool,
    pub topic_prefix: String,
    /// JSON lines sink for published messages; stderr when unset.
    pub file: Option<String>,
}

impl Default for TelemetryCfg {
    fn default() -> Self {
        Self {
            enabled: false,
            topic_prefix: "catfeeder".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Persistence {
    /// Directory holding `settings.bin` and `events.jsonl`.
    pub state_dir: String,
}

impl Default for Persistence {
    fn default() -> Self {
        Self {
            state_dir: "var/feeder".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PersistedCalibration {
    /// grams per count
    pub gain_g_per_count: f32,
    /// tare zero in raw counts
    pub zero_counts: i32,
    /// additive offset in grams (rarely needed; default 0.0)
    #[serde(default)]
    pub offset_g: f32,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Calibrations {
    pub bowl: Option<PersistedCalibration>,
    pub tank: Option<PersistedCalibration>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub filter: FilterCfg,
    pub actuator: ActuatorCfg,
    pub safety: Safety,
    pub schedule: Schedule,
    pub adaptive: Adaptive,
    pub bowl: Bowl,
    pub tank: Tank,
    pub timing: Timing,
    pub defaults: Defaults,
    pub logging: Logging,
    pub hardware: Hardware,
    pub estop: EstopCfg,
    pub telemetry: TelemetryCfg,
    pub persistence: Persistence,
    /// Persisted load cell calibration; preferred over CSV when present.
    pub calibration: Calibrations,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

fn fraction_open(x: f32) -> bool {
    x.is_finite() && x > 0.0 && x < 1.0
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Filter
        if !(self.filter.weight_alpha.is_finite() && (0.0..1.0).contains(&self.filter.weight_alpha))
        {
            eyre::bail!("filter.weight_alpha must be in [0.0, 1.0)");
        }
        if !(self.filter.pot_alpha.is_finite() && (0.0..1.0).contains(&self.filter.pot_alpha)) {
            eyre::bail!("filter.pot_alpha must be in [0.0, 1.0)");
        }
        if self.filter.debounce_ms == 0 || self.filter.debounce_ms > 1_000 {
            eyre::bail!("filter.debounce_ms must be in [1, 1000]");
        }
        if self.filter.adc_max <= 0 {
            eyre::bail!("filter.adc_max must be > 0");
        }

        // Actuator
        let a = &self.actuator;
        if a.closed_deg > 90 || a.open_min_deg > 90 || a.open_max_deg > 90 {
            eyre::bail!("actuator angles must be within [0, 90] degrees");
        }
        if a.open_min_deg > a.open_max_deg {
            eyre::bail!("actuator.open_min_deg must be <= actuator.open_max_deg");
        }
        if a.open_min_deg <= a.closed_deg {
            eyre::bail!("actuator.open_min_deg must be greater than actuator.closed_deg");
        }
        if a.hold_min_ms == 0 || a.hold_min_ms > a.hold_max_ms {
            eyre::bail!("actuator.hold_min_ms must be in [1, hold_max_ms]");
        }
        if a.dispense_timeout_ms <= a.hold_max_ms {
            eyre::bail!("actuator.dispense_timeout_ms must exceed actuator.hold_max_ms");
        }

        // Safety
        if self.safety.max_consecutive_failures == 0 {
            eyre::bail!("safety.max_consecutive_failures must be >= 1");
        }
        if self.safety.sensor_timeout_ms == 0 {
            eyre::bail!("safety.sensor_timeout_ms must be >= 1");
        }

        // Schedule
        let s = &self.schedule;
        if s.day_length_ms < 1_000 {
            eyre::bail!("schedule.day_length_ms must be >= 1000");
        }
        if s.fastest_interval_ms == 0 {
            eyre::bail!("schedule.fastest_interval_ms must be >= 1");
        }
        if s.fastest_interval_ms >= s.slowest_interval_ms {
            eyre::bail!("schedule.fastest_interval_ms must be < schedule.slowest_interval_ms");
        }
        if s.interval_step_ms == 0 {
            eyre::bail!("schedule.interval_step_ms must be >= 1");
        }

        // Adaptive
        if self.adaptive.low_intake_g < 0.0 || self.adaptive.high_intake_g <= self.adaptive.low_intake_g
        {
            eyre::bail!("adaptive.low_intake_g must be >= 0 and below adaptive.high_intake_g");
        }
        if self.adaptive.analysis_window_ms == 0 {
            eyre::bail!("adaptive.analysis_window_ms must be >= 1");
        }

        // Bowl / tank
        if !(self.bowl.max_g.is_finite() && self.bowl.max_g > 0.0) {
            eyre::bail!("bowl.max_g must be > 0");
        }
        if self.bowl.tolerance_g < 0.0 || self.bowl.full_hysteresis_g < 0.0 {
            eyre::bail!("bowl.tolerance_g and bowl.full_hysteresis_g must be >= 0");
        }
        if !(self.tank.capacity_g.is_finite() && self.tank.capacity_g > 0.0) {
            eyre::bail!("tank.capacity_g must be > 0");
        }
        if self.tank.tolerance_g < 0.0 || !(0.0..1.0).contains(&self.tank.low_hysteresis_fraction) {
            eyre::bail!("tank.tolerance_g must be >= 0 and tank.low_hysteresis_fraction in [0.0, 1.0)");
        }

        // Timing
        let t = &self.timing;
        if t.sensor_poll_ms == 0
            || t.scheduler_ms == 0
            || t.display_ms == 0
            || t.telemetry_ms == 0
            || t.health_check_ms == 0
        {
            eyre::bail!("timing intervals must all be >= 1 ms");
        }

        // Defaults
        let d = &self.defaults;
        if !PORTION_RANGE_G.contains(&d.default_portion_g) {
            eyre::bail!(
                "defaults.default_portion_g must be in [{}, {}]",
                PORTION_RANGE_G.start(),
                PORTION_RANGE_G.end()
            );
        }
        if !(s.fastest_interval_ms..=s.slowest_interval_ms).contains(&d.feeding_interval_ms) {
            eyre::bail!(
                "defaults.feeding_interval_ms must be within [schedule.fastest_interval_ms, schedule.slowest_interval_ms]"
            );
        }
        if d.bowl_empty_threshold_g < 0.0 || d.bowl_empty_threshold_g >= d.bowl_full_threshold_g {
            eyre::bail!("defaults.bowl_empty_threshold_g must be >= 0 and below bowl_full_threshold_g");
        }
        if d.bowl_full_threshold_g > self.bowl.max_g {
            eyre::bail!("defaults.bowl_full_threshold_g must not exceed bowl.max_g");
        }
        if !fraction_open(d.tank_low_fraction) {
            eyre::bail!("defaults.tank_low_fraction must be in (0.0, 1.0)");
        }

        // Hardware
        if self.hardware.sensor_read_timeout_ms == 0 {
            eyre::bail!("hardware.sensor_read_timeout_ms must be >= 1");
        }

        // E-stop
        if self.estop.debounce_n == 0 {
            eyre::bail!("estop.debounce_n must be >= 1");
        }

        // Telemetry
        if self.telemetry.enabled && self.telemetry.topic_prefix.trim().is_empty() {
            eyre::bail!("telemetry.topic_prefix must not be empty when telemetry is enabled");
        }

        // Calibration
        for (name, cal) in [
            ("bowl", self.calibration.bowl),
            ("tank", self.calibration.tank),
        ] {
            if let Some(c) = cal
                && (!c.gain_g_per_count.is_finite() || c.gain_g_per_count == 0.0)
            {
                eyre::bail!("calibration.{name}.gain_g_per_count must be finite and non-zero");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_is_the_stock_build() {
        let cfg = load_toml("").expect("parse empty TOML");
        cfg.validate().expect("defaults validate");
        assert_eq!(cfg.schedule.day_length_ms, 120_000);
        assert_eq!(cfg.defaults.default_portion_g, 50);
        assert!(cfg.calibration.bowl.is_none());
    }

    #[test]
    fn unknown_rotation_is_left_to_the_binary() {
        let cfg = load_toml("[logging]\nrotation = \"weekly\"\n").expect("parse");
        assert_eq!(cfg.logging.rotation.as_deref(), Some("weekly"));
    }
}
