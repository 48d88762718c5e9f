//! `From` implementations bridging `feeder_config` types to `feeder_core` types.

use crate::calibration::Calibration;
use crate::config::{
    ActuatorCfg, AdaptiveCfg, FilterCfg, SafetyCfg, ScheduleCfg, Timeouts, TimingCfg, VesselCfg,
};
use crate::sensors::SensorHubCfg;
use crate::settings::SystemSettings;

// ── FilterCfg ────────────────────────────────────────────────────────────────

impl From<&feeder_config::FilterCfg> for FilterCfg {
    fn from(c: &feeder_config::FilterCfg) -> Self {
        Self {
            weight_alpha: c.weight_alpha,
            pot_alpha: c.pot_alpha,
            pot_hysteresis_g: c.pot_hysteresis_g,
            debounce_ms: c.debounce_ms,
            adc_max: c.adc_max,
        }
    }
}

// ── ActuatorCfg ──────────────────────────────────────────────────────────────

impl From<&feeder_config::ActuatorCfg> for ActuatorCfg {
    fn from(c: &feeder_config::ActuatorCfg) -> Self {
        Self {
            closed_deg: c.closed_deg,
            open_min_deg: c.open_min_deg,
            open_max_deg: c.open_max_deg,
            hold_min_ms: c.hold_min_ms,
            hold_max_ms: c.hold_max_ms,
            dispense_timeout_ms: c.dispense_timeout_ms,
        }
    }
}

// ── SafetyCfg ────────────────────────────────────────────────────────────────

impl From<&feeder_config::Safety> for SafetyCfg {
    fn from(c: &feeder_config::Safety) -> Self {
        Self {
            min_feed_gap_ms: c.min_feed_gap_ms,
            max_consecutive_failures: c.max_consecutive_failures,
            sensor_timeout_ms: c.sensor_timeout_ms,
        }
    }
}

// ── ScheduleCfg / AdaptiveCfg / TimingCfg ───────────────────────────────────

impl From<&feeder_config::Schedule> for ScheduleCfg {
    fn from(c: &feeder_config::Schedule) -> Self {
        Self {
            day_length_ms: c.day_length_ms,
            fastest_interval_ms: c.fastest_interval_ms,
            slowest_interval_ms: c.slowest_interval_ms,
            interval_step_ms: c.interval_step_ms,
        }
    }
}

impl From<&feeder_config::Adaptive> for AdaptiveCfg {
    fn from(c: &feeder_config::Adaptive) -> Self {
        Self {
            rapid_consumption_ms: c.rapid_consumption_ms,
            low_intake_g: c.low_intake_g,
            high_intake_g: c.high_intake_g,
            analysis_window_ms: c.analysis_window_ms,
        }
    }
}

impl From<&feeder_config::Timing> for TimingCfg {
    fn from(c: &feeder_config::Timing) -> Self {
        Self {
            sensor_poll_ms: c.sensor_poll_ms,
            scheduler_ms: c.scheduler_ms,
            display_ms: c.display_ms,
            telemetry_ms: c.telemetry_ms,
            health_check_ms: c.health_check_ms,
        }
    }
}

// ── VesselCfg ────────────────────────────────────────────────────────────────

impl From<&feeder_config::Config> for VesselCfg {
    fn from(c: &feeder_config::Config) -> Self {
        Self {
            bowl_max_g: c.bowl.max_g,
            bowl_tolerance_g: c.bowl.tolerance_g,
            bowl_full_hysteresis_g: c.bowl.full_hysteresis_g,
            tank_capacity_g: c.tank.capacity_g,
            tank_tolerance_g: c.tank.tolerance_g,
            tank_low_hysteresis_fraction: c.tank.low_hysteresis_fraction,
        }
    }
}

// ── Timeouts ─────────────────────────────────────────────────────────────────

impl From<&feeder_config::Hardware> for Timeouts {
    fn from(c: &feeder_config::Hardware) -> Self {
        Self {
            sensor_ms: c.sensor_read_timeout_ms,
        }
    }
}

// ── SystemSettings ───────────────────────────────────────────────────────────

impl From<&feeder_config::Defaults> for SystemSettings {
    fn from(c: &feeder_config::Defaults) -> Self {
        Self {
            default_portion_g: c.default_portion_g,
            feeding_interval_ms: c.feeding_interval_ms,
            bowl_full_threshold_g: c.bowl_full_threshold_g,
            bowl_empty_threshold_g: c.bowl_empty_threshold_g,
            tank_low_fraction: c.tank_low_fraction,
            adaptive_enabled: c.adaptive_enabled,
        }
    }
}

// ── Calibration ──────────────────────────────────────────────────────────────

impl From<&feeder_config::PersistedCalibration> for Calibration {
    fn from(c: &feeder_config::PersistedCalibration) -> Self {
        Self {
            gain_g_per_count: c.gain_g_per_count,
            zero_counts: c.zero_counts,
            offset_g: c.offset_g,
        }
    }
}

impl From<&feeder_config::LoadCellCalibration> for Calibration {
    fn from(c: &feeder_config::LoadCellCalibration) -> Self {
        Self {
            gain_g_per_count: c.gain_g_per_count,
            zero_counts: c.zero_counts,
            offset_g: 0.0,
        }
    }
}

// ── SensorHubCfg ─────────────────────────────────────────────────────────────

impl From<&feeder_config::Config> for SensorHubCfg {
    fn from(c: &feeder_config::Config) -> Self {
        Self {
            filter: FilterCfg::from(&c.filter),
            vessels: VesselCfg::from(c),
            timeouts: Timeouts::from(&c.hardware),
            bowl_calibration: c
                .calibration
                .bowl
                .as_ref()
                .map(Calibration::from)
                .unwrap_or_default(),
            tank_calibration: c
                .calibration
                .tank
                .as_ref()
                .map(Calibration::from)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_maps_to_core_defaults() {
        let cfg = feeder_config::Config::default();
        assert_eq!(SystemSettings::from(&cfg.defaults), SystemSettings::default());
        let hub = SensorHubCfg::from(&cfg);
        assert_eq!(hub.bowl_calibration, Calibration::default());
        assert_eq!(hub.vessels.tank_capacity_g, 2000.0);
        assert_eq!(ScheduleCfg::from(&cfg.schedule).interval_step_ms, 2500);
    }
}
