//! Pre-dispense safety gate.
//!
//! Checks run in a fixed order and the first failing one is reported, so a
//! denial always names the most fundamental problem. Evaluation is pure: it
//! reads the state and never changes it.

use thiserror::Error;

use crate::config::SafetyCfg;
use crate::state::{FeederState, Thresholds};
use crate::types::{MAX_PORTION_G, MIN_PORTION_G};

#[derive(Debug, Error, Clone, Copy, PartialEq)]
pub enum DenialReason {
    #[error("emergency stop is active")]
    EmergencyStop,
    #[error("actuator is not ready")]
    ActuatorNotReady,
    #[error("sensor readings are not valid")]
    InvalidSensorReading,
    #[error("too soon after the last feed ({remaining_ms} ms left)")]
    IntervalNotElapsed { remaining_ms: u64 },
    #[error("bowl would overflow ({bowl_g:.1} g + {portion_g} g reaches {threshold_g:.1} g)")]
    BowlFull {
        bowl_g: f32,
        portion_g: u16,
        threshold_g: f32,
    },
    #[error("not enough food in the tank ({tank_g:.1} g for a {portion_g} g portion)")]
    TankInsufficient { tank_g: f32, portion_g: u16 },
    #[error("tank level is low ({tank_g:.1} g)")]
    TankLow { tank_g: f32 },
    #[error("portion {0} g outside [{MIN_PORTION_G}, {MAX_PORTION_G}]")]
    PortionOutOfRange(u16),
}

impl DenialReason {
    /// Stable identifier for logs and telemetry.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmergencyStop => "emergency_stop",
            Self::ActuatorNotReady => "actuator_not_ready",
            Self::InvalidSensorReading => "invalid_sensor_reading",
            Self::IntervalNotElapsed { .. } => "interval_not_elapsed",
            Self::BowlFull { .. } => "bowl_full",
            Self::TankInsufficient { .. } => "tank_insufficient",
            Self::TankLow { .. } => "tank_low",
            Self::PortionOutOfRange(_) => "portion_out_of_range",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision {
    Allowed,
    Denied(DenialReason),
}

/// Everything a decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct GateInput<'a> {
    pub state: &'a FeederState,
    pub thresholds: &'a Thresholds,
    pub portion_g: u16,
    pub now_ms: u64,
    pub emergency: bool,
    pub actuator_ready: bool,
}

#[derive(Debug, Clone)]
pub struct SafetyGate {
    min_feed_gap_ms: u64,
}

impl SafetyGate {
    pub fn new(cfg: &SafetyCfg) -> Self {
        Self {
            min_feed_gap_ms: cfg.min_feed_gap_ms,
        }
    }

    pub fn evaluate(&self, input: &GateInput<'_>) -> Decision {
        match self.first_denial(input) {
            Some(reason) => Decision::Denied(reason),
            None => Decision::Allowed,
        }
    }

    fn first_denial(&self, input: &GateInput<'_>) -> Option<DenialReason> {
        let s = input.state;
        let portion = f32::from(input.portion_g);

        if input.emergency {
            return Some(DenialReason::EmergencyStop);
        }
        if !input.actuator_ready {
            return Some(DenialReason::ActuatorNotReady);
        }
        if !s.sensors_valid {
            return Some(DenialReason::InvalidSensorReading);
        }
        let elapsed = input.now_ms.saturating_sub(s.last_feed_time_ms);
        if elapsed < self.min_feed_gap_ms {
            return Some(DenialReason::IntervalNotElapsed {
                remaining_ms: self.min_feed_gap_ms - elapsed,
            });
        }
        if s.bowl_level_g + portion >= input.thresholds.bowl_full_g {
            return Some(DenialReason::BowlFull {
                bowl_g: s.bowl_level_g,
                portion_g: input.portion_g,
                threshold_g: input.thresholds.bowl_full_g,
            });
        }
        if s.tank_level_g < portion {
            return Some(DenialReason::TankInsufficient {
                tank_g: s.tank_level_g,
                portion_g: input.portion_g,
            });
        }
        if s.tank_low {
            return Some(DenialReason::TankLow {
                tank_g: s.tank_level_g,
            });
        }
        if !(MIN_PORTION_G..=MAX_PORTION_G).contains(&input.portion_g) {
            return Some(DenialReason::PortionOutOfRange(input.portion_g));
        }
        None
    }
}
