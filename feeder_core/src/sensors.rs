//! Sensor abstraction.
//!
//! Raw devices (`LoadCell`, `AnalogInput`, `DigitalInput`) are conditioned
//! here into the values the controller works with: filtered and validated
//! weights, a portion from the dial, a debounced button edge and the mode
//! switch level. `Sensors` is the seam the controller depends on; `SensorHub`
//! is the implementation over real or simulated devices.

use std::fmt;
use std::time::{Duration, Instant};

use feeder_traits::{AnalogInput, Clock, DigitalInput, LoadCell, MonotonicClock};
use thiserror::Error;
use tracing::{debug, warn};

use crate::calibration::Calibration;
use crate::config::{FilterCfg, Timeouts, VesselCfg};
use crate::types::{MAX_PORTION_G, MIN_PORTION_G};
use crate::util::map_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorId {
    Bowl,
    Tank,
    Potentiometer,
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Bowl => "bowl",
            Self::Tank => "tank",
            Self::Potentiometer => "potentiometer",
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorFault {
    #[error("{sensor} reading {value:.1} outside [{min:.1}, {max:.1}]")]
    OutOfRange {
        sensor: SensorId,
        value: f32,
        min: f32,
        max: f32,
    },
    #[error("{sensor} unavailable: {reason}")]
    Unavailable { sensor: SensorId, reason: String },
}

/// What the controller needs from its inputs.
pub trait Sensors {
    /// Filtered bowl weight in grams.
    fn read_bowl_weight(&mut self) -> Result<f32, SensorFault>;
    /// Filtered tank weight in grams, clamped to capacity.
    fn read_tank_weight(&mut self) -> Result<f32, SensorFault>;
    /// Portion selected on the dial, within `[MIN_PORTION_G, MAX_PORTION_G]`.
    fn read_potentiometer(&mut self) -> Result<u16, SensorFault>;
    /// True once per debounced press.
    fn read_feed_button(&mut self) -> bool;
    /// True when the switch selects manual mode.
    fn read_mode_switch(&mut self) -> bool;
    /// Re-zero the bowl scale at its current reading.
    fn tare_bowl(&mut self) -> Result<(), SensorFault>;
    /// Levels expected right after a dispense. Filtered implementations
    /// restart their weight filters here so the next reading is not dragged
    /// toward the pre-dispense value.
    fn note_dispensed(&mut self, _bowl_g: f32, _tank_g: f32) {}
}

/// Calibrated, range-checked and EMA-smoothed weight channel.
#[derive(Debug, Clone)]
pub struct WeightChannel {
    id: SensorId,
    calibration: Calibration,
    alpha: f32,
    max_g: f32,
    tolerance_g: f32,
    smoothed: Option<f32>,
}

impl WeightChannel {
    pub fn new(
        id: SensorId,
        calibration: Calibration,
        alpha: f32,
        max_g: f32,
        tolerance_g: f32,
    ) -> Self {
        Self {
            id,
            calibration,
            alpha: alpha.clamp(0.0, 0.99),
            max_g,
            tolerance_g,
            smoothed: None,
        }
    }

    /// Convert a raw reading. Implausible values are rejected without
    /// disturbing the filter; the first good sample seeds it.
    pub fn accept_raw(&mut self, raw: i32) -> Result<f32, SensorFault> {
        let grams = self.calibration.to_grams(raw);
        let (min, max) = (-self.tolerance_g, self.max_g + self.tolerance_g);
        if !grams.is_finite() || grams < min || grams > max {
            return Err(SensorFault::OutOfRange {
                sensor: self.id,
                value: grams,
                min,
                max,
            });
        }
        let next = match self.smoothed {
            None => grams,
            Some(prev) => self.alpha.mul_add(prev, (1.0 - self.alpha) * grams),
        };
        self.smoothed = Some(next);
        Ok(next.clamp(0.0, self.max_g))
    }

    /// Make `raw` read as zero grams and restart the filter.
    pub fn tare(&mut self, raw: i32) {
        self.calibration.zero_counts = raw;
        self.calibration.offset_g = 0.0;
        self.smoothed = None;
    }

    /// Restart the filter at a known level in grams.
    pub fn reseed(&mut self, grams: f32) {
        self.smoothed = Some(grams.clamp(0.0, self.max_g));
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration
    }
}

/// Low-pass filtered dial with hysteresis on the reported portion.
#[derive(Debug, Clone)]
pub struct PortionDial {
    adc_max: i32,
    alpha: f32,
    hysteresis_g: u16,
    smoothed: Option<f32>,
    reported: Option<u16>,
}

impl PortionDial {
    pub fn new(cfg: &FilterCfg) -> Self {
        Self {
            adc_max: cfg.adc_max.max(1),
            alpha: cfg.pot_alpha.clamp(0.0, 0.99),
            hysteresis_g: cfg.pot_hysteresis_g,
            smoothed: None,
            reported: None,
        }
    }

    pub fn accept_raw(&mut self, raw: i32) -> Result<u16, SensorFault> {
        if !(0..=self.adc_max).contains(&raw) {
            return Err(SensorFault::OutOfRange {
                sensor: SensorId::Potentiometer,
                value: raw as f32,
                min: 0.0,
                max: self.adc_max as f32,
            });
        }
        let mapped = map_range(
            i64::from(raw),
            0,
            i64::from(self.adc_max),
            i64::from(MIN_PORTION_G),
            i64::from(MAX_PORTION_G),
        ) as f32;
        let smoothed = match self.smoothed {
            None => mapped,
            Some(prev) => self.alpha.mul_add(prev, (1.0 - self.alpha) * mapped),
        };
        self.smoothed = Some(smoothed);

        let candidate = (smoothed.round() as u16).clamp(MIN_PORTION_G, MAX_PORTION_G);
        let reported = match self.reported {
            None => candidate,
            Some(prev) => {
                let at_endpoint = candidate == MIN_PORTION_G || candidate == MAX_PORTION_G;
                if candidate.abs_diff(prev) > self.hysteresis_g || (at_endpoint && candidate != prev)
                {
                    candidate
                } else {
                    prev
                }
            }
        };
        if self.reported != Some(reported) {
            debug!(portion_g = reported, "dial portion changed");
        }
        self.reported = Some(reported);
        Ok(reported)
    }

    pub fn last(&self) -> Option<u16> {
        self.reported
    }
}

/// Accepts a level change only after it held for the debounce window.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window_ms: u64,
    stable: Option<bool>,
    candidate: bool,
    candidate_since_ms: u64,
}

impl Debouncer {
    pub fn new(window_ms: u64) -> Self {
        Self {
            window_ms,
            stable: None,
            candidate: true,
            candidate_since_ms: 0,
        }
    }

    /// Feed the current level. Returns the new stable level on an accepted
    /// transition. The first sample is adopted silently.
    pub fn update(&mut self, level: bool, now_ms: u64) -> Option<bool> {
        let Some(stable) = self.stable else {
            self.stable = Some(level);
            self.candidate = level;
            self.candidate_since_ms = now_ms;
            return None;
        };
        if level != self.candidate {
            self.candidate = level;
            self.candidate_since_ms = now_ms;
        }
        if self.candidate != stable
            && now_ms.saturating_sub(self.candidate_since_ms) >= self.window_ms
        {
            self.stable = Some(self.candidate);
            return Some(self.candidate);
        }
        None
    }

    pub fn stable(&self) -> Option<bool> {
        self.stable
    }
}

/// Raw devices wired to the feeder.
pub struct SensorDevices {
    pub bowl: Box<dyn LoadCell>,
    pub tank: Box<dyn LoadCell>,
    pub dial: Box<dyn AnalogInput>,
    /// Pull-up input; pressed pulls it low.
    pub feed_button: Box<dyn DigitalInput>,
    /// Pull-up input; low selects manual mode.
    pub mode_switch: Box<dyn DigitalInput>,
}

/// Everything `SensorHub` needs besides the devices.
#[derive(Debug, Clone, Default)]
pub struct SensorHubCfg {
    pub filter: FilterCfg,
    pub vessels: VesselCfg,
    pub timeouts: Timeouts,
    pub bowl_calibration: Calibration,
    pub tank_calibration: Calibration,
}

pub struct SensorHub {
    devices: SensorDevices,
    bowl: WeightChannel,
    tank: WeightChannel,
    dial: PortionDial,
    button: Debouncer,
    switch: Debouncer,
    read_timeout: Duration,
    clock: Box<dyn Clock + Send + Sync>,
    epoch: Instant,
    last_bowl_raw: Option<i32>,
}

impl fmt::Debug for SensorHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorHub")
            .field("bowl", &self.bowl)
            .field("tank", &self.tank)
            .field("dial", &self.dial)
            .finish_non_exhaustive()
    }
}

impl SensorHub {
    pub fn new(devices: SensorDevices, cfg: &SensorHubCfg) -> Self {
        Self::with_clock(devices, cfg, Box::new(MonotonicClock::new()))
    }

    pub fn with_clock(
        devices: SensorDevices,
        cfg: &SensorHubCfg,
        clock: Box<dyn Clock + Send + Sync>,
    ) -> Self {
        let v = &cfg.vessels;
        let epoch = clock.now();
        Self {
            devices,
            bowl: WeightChannel::new(
                SensorId::Bowl,
                cfg.bowl_calibration,
                cfg.filter.weight_alpha,
                v.bowl_max_g,
                v.bowl_tolerance_g,
            ),
            tank: WeightChannel::new(
                SensorId::Tank,
                cfg.tank_calibration,
                cfg.filter.weight_alpha,
                v.tank_capacity_g,
                v.tank_tolerance_g,
            ),
            dial: PortionDial::new(&cfg.filter),
            button: Debouncer::new(cfg.filter.debounce_ms),
            switch: Debouncer::new(cfg.filter.debounce_ms),
            read_timeout: Duration::from_millis(cfg.timeouts.sensor_ms.max(1)),
            clock,
            epoch,
            last_bowl_raw: None,
        }
    }

    pub fn bowl_calibration(&self) -> Calibration {
        self.bowl.calibration()
    }

    fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    fn read_level(input: &mut dyn DigitalInput, name: &str, previous: Option<bool>) -> bool {
        match input.is_high() {
            Ok(level) => level,
            Err(e) => {
                warn!(input = name, error = %e, "digital input read failed");
                previous.unwrap_or(true)
            }
        }
    }
}

impl Sensors for SensorHub {
    fn read_bowl_weight(&mut self) -> Result<f32, SensorFault> {
        let raw = self
            .devices
            .bowl
            .read(self.read_timeout)
            .map_err(|e| SensorFault::Unavailable {
                sensor: SensorId::Bowl,
                reason: e.to_string(),
            })?;
        self.last_bowl_raw = Some(raw);
        self.bowl.accept_raw(raw)
    }

    fn read_tank_weight(&mut self) -> Result<f32, SensorFault> {
        let raw = self
            .devices
            .tank
            .read(self.read_timeout)
            .map_err(|e| SensorFault::Unavailable {
                sensor: SensorId::Tank,
                reason: e.to_string(),
            })?;
        self.tank.accept_raw(raw)
    }

    fn read_potentiometer(&mut self) -> Result<u16, SensorFault> {
        let raw = self
            .devices
            .dial
            .read()
            .map_err(|e| SensorFault::Unavailable {
                sensor: SensorId::Potentiometer,
                reason: e.to_string(),
            })?;
        self.dial.accept_raw(raw)
    }

    fn read_feed_button(&mut self) -> bool {
        let now = self.now_ms();
        let level = Self::read_level(
            self.devices.feed_button.as_mut(),
            "feed_button",
            self.button.stable(),
        );
        // Active low: a press is the accepted transition to low.
        matches!(self.button.update(level, now), Some(false))
    }

    fn read_mode_switch(&mut self) -> bool {
        let now = self.now_ms();
        let level = Self::read_level(
            self.devices.mode_switch.as_mut(),
            "mode_switch",
            self.switch.stable(),
        );
        self.switch.update(level, now);
        !self.switch.stable().unwrap_or(level)
    }

    fn tare_bowl(&mut self) -> Result<(), SensorFault> {
        let raw = self
            .devices
            .bowl
            .read(self.read_timeout)
            .map_err(|e| SensorFault::Unavailable {
                sensor: SensorId::Bowl,
                reason: e.to_string(),
            })?;
        self.bowl.tare(raw);
        self.last_bowl_raw = Some(raw);
        debug!(zero_counts = raw, "bowl tared");
        Ok(())
    }

    fn note_dispensed(&mut self, bowl_g: f32, tank_g: f32) {
        self.bowl.reseed(bowl_g);
        self.tank.reseed(tank_g);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> WeightChannel {
        WeightChannel::new(SensorId::Bowl, Calibration::default(), 0.5, 500.0, 25.0)
    }

    #[test]
    fn first_sample_seeds_the_filter() {
        let mut ch = channel();
        assert_eq!(ch.accept_raw(4_000).unwrap(), 40.0);
        // 0.5 * 40 + 0.5 * 60
        assert!((ch.accept_raw(6_000).unwrap() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn implausible_sample_is_rejected_without_touching_filter() {
        let mut ch = channel();
        ch.accept_raw(4_000).unwrap();
        let err = ch.accept_raw(60_000).unwrap_err();
        assert!(matches!(err, SensorFault::OutOfRange { sensor: SensorId::Bowl, .. }));
        assert_eq!(ch.accept_raw(4_000).unwrap(), 40.0);
    }

    #[test]
    fn reseeded_filter_starts_from_the_new_level() {
        let mut ch = channel();
        ch.accept_raw(0).unwrap();
        ch.reseed(30.0);
        assert!((ch.accept_raw(3_000).unwrap() - 30.0).abs() < 1e-3);
    }

    #[test]
    fn small_negative_reads_clamp_to_zero() {
        let mut ch = channel();
        assert_eq!(ch.accept_raw(-1_000).unwrap(), 0.0);
    }

    #[test]
    fn debouncer_needs_level_to_hold() {
        let mut d = Debouncer::new(50);
        assert_eq!(d.update(true, 0), None);
        assert_eq!(d.update(false, 10), None);
        assert_eq!(d.update(true, 20), None); // bounce
        assert_eq!(d.update(false, 30), None);
        assert_eq!(d.update(false, 79), None);
        assert_eq!(d.update(false, 80), Some(false));
        assert_eq!(d.update(false, 200), None);
    }

    #[test]
    fn dial_ignores_jitter_but_reaches_endpoints() {
        let cfg = FilterCfg {
            pot_alpha: 0.0,
            ..FilterCfg::default()
        };
        let mut dial = PortionDial::new(&cfg);
        assert_eq!(dial.accept_raw(512).unwrap(), 52);
        // one or two grams of wobble is ignored
        assert_eq!(dial.accept_raw(540).unwrap(), 52);
        assert_eq!(dial.accept_raw(600).unwrap(), 56);
        assert_eq!(dial.accept_raw(1023).unwrap(), 75);
        assert_eq!(dial.accept_raw(1000).unwrap(), 75);
        assert_eq!(dial.accept_raw(0).unwrap(), 30);
        assert!(dial.accept_raw(1024).is_err());
    }
}
