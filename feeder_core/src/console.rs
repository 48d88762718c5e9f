//! Text command execution against a running `Feeder`.

use std::fmt::Write as _;

use tracing::{info, warn};

use crate::command::{Command, HELP, parse};
use crate::controller::{FeedOutcome, Feeder};
use crate::event_log::FeedingEvent;
use crate::faults::EmergencyCause;
use crate::sensors::SensorFault;
use crate::settings::SettingUpdate;
use crate::types::{MAX_PORTION_G, MIN_PORTION_G};

const HISTORY_ROWS: usize = 10;

impl Feeder {
    /// Parse and run one line of input, returning the reply text.
    pub fn handle_line(&mut self, line: &str) -> String {
        match parse(line) {
            Ok(cmd) => self.execute(cmd),
            Err(e) => e.to_string(),
        }
    }

    pub fn execute(&mut self, cmd: Command) -> String {
        info!(?cmd, "command");
        match cmd {
            Command::Status => self.status_report(),
            Command::Feed => match self.request_feed(self.state.mode) {
                FeedOutcome::Dispensed(e) => format!(
                    "Dispensed {} g. Bowl {:.1} g, tank {:.1} g.",
                    e.requested_g, self.state.bowl_level_g, self.state.tank_level_g
                ),
                FeedOutcome::Denied(reason) => format!("Feed denied: {reason}."),
                FeedOutcome::Failed(err) => format!("Feed failed: {err}."),
            },
            Command::Sensors => self.sensor_report(),
            Command::History => self.history_report(),
            Command::Calibrate => self.calibrate(),
            Command::Reset => self.reset(),
            Command::Emergency => {
                self.enter_emergency(EmergencyCause::Operator);
                "Emergency stop active. Use 'clear emergency' to resume.".into()
            }
            Command::ClearEmergency => {
                let was = self.faults.is_latched();
                self.clear_emergency();
                if was {
                    "Emergency stop cleared.".into()
                } else {
                    "No emergency stop was active.".into()
                }
            }
            Command::Help => HELP.into(),
            Command::FillTank => {
                self.state.tank_level_g = self.thresholds.tank_capacity_g;
                self.state.refresh_flags(&self.thresholds);
                info!(tank_g = self.state.tank_level_g, "tank refilled");
                format!("Tank marked full ({:.0} g).", self.state.tank_level_g)
            }
            Command::IncreaseRate => {
                let next = self
                    .state
                    .feed_interval_ms
                    .saturating_sub(self.schedule.interval_step_ms)
                    .max(self.schedule.fastest_interval_ms);
                self.set_interval(next)
            }
            Command::DecreaseRate => {
                let next = (self.state.feed_interval_ms + self.schedule.interval_step_ms)
                    .min(self.schedule.slowest_interval_ms);
                self.set_interval(next)
            }
            Command::DefaultRate => self.set_interval(self.defaults.feeding_interval_ms),
            Command::SetPortion(g) => {
                match self
                    .settings
                    .apply(SettingUpdate::DefaultPortion(g), &self.limits)
                {
                    Ok(()) => {
                        self.state.portion_size_g = g;
                        self.persist_settings();
                        format!("Portion set to {g} g.")
                    }
                    Err(_) => {
                        format!("Portion must be between {MIN_PORTION_G} and {MAX_PORTION_G} g.")
                    }
                }
            }
            Command::SetInterval(ms) => self.set_interval(ms),
            Command::SetAdaptive(on) => {
                match self
                    .settings
                    .apply(SettingUpdate::AdaptiveFeeding(on), &self.limits)
                {
                    Ok(()) => {
                        self.persist_settings();
                        format!("Adaptive feeding {}.", if on { "enabled" } else { "disabled" })
                    }
                    Err(e) => format!("Setting rejected: {e}."),
                }
            }
        }
    }

    fn set_interval(&mut self, ms: u64) -> String {
        match self
            .settings
            .apply(SettingUpdate::FeedingInterval(ms), &self.limits)
        {
            Ok(()) => {
                self.state.feed_interval_ms = ms;
                self.persist_settings();
                format!("Feeding interval is now {:.1} s.", ms as f64 / 1000.0)
            }
            Err(_) => format!(
                "Interval must be between {} and {} ms.",
                self.limits.interval_ms.start(),
                self.limits.interval_ms.end()
            ),
        }
    }

    fn calibrate(&mut self) -> String {
        match self.sensors.tare_bowl() {
            Ok(()) => {
                self.state.bowl_level_g = 0.0;
                self.state.refresh_flags(&self.thresholds);
                "Bowl scale tared.".into()
            }
            Err(e) => {
                warn!(error = %e, "tare failed");
                format!("Calibration failed: {e}.")
            }
        }
    }

    /// Reattach the actuator, close the gate and clear any emergency.
    pub fn reset(&mut self) -> String {
        if let Err(e) = self.actuator.attach() {
            warn!(error = %e, "actuator attach failed during reset");
        }
        if self.actuator.is_ready() {
            self.close_gate_best_effort();
        }
        self.clear_emergency();
        self.last_denial = None;
        self.refresh_thresholds();
        info!(actuator_ready = self.actuator.is_ready(), "feeder reset");
        if self.actuator.is_ready() {
            "Feeder reset.".into()
        } else {
            "Feeder reset, but the actuator is not responding.".into()
        }
    }

    pub fn status_report(&self) -> String {
        let now = self.now_ms();
        let s = &self.state;
        let mut out = String::new();
        let _ = writeln!(out, "Mode: {}  Phase: {:?}", s.mode, self.phase());
        if let Some(cause) = self.faults.latched() {
            let _ = writeln!(out, "EMERGENCY STOP: {cause}");
        }
        let _ = writeln!(
            out,
            "Portion: {} g (dial {} g)  Interval: {:.1} s  Next feed in {:.1} s",
            s.portion_size_g,
            s.dial_portion_g,
            s.feed_interval_ms as f64 / 1000.0,
            s.ms_until_next_feed(now) as f64 / 1000.0
        );
        let _ = writeln!(
            out,
            "Bowl: {:.1} g{}  Tank: {:.1} g{}",
            s.bowl_level_g,
            if s.bowl_is_full { " (full)" } else { "" },
            s.tank_level_g,
            if s.tank_low { " (low)" } else { "" }
        );
        let _ = write!(
            out,
            "Day {}  Feeds today: {}  Adaptive: {}  Sensors: {}",
            s.day_cycle,
            s.feed_events_today,
            if self.settings.adaptive_enabled { "on" } else { "off" },
            if s.sensors_valid { "ok" } else { "invalid" }
        );
        out
    }

    fn sensor_report(&mut self) -> String {
        let fmt_weight = |r: Result<f32, SensorFault>| match r {
            Ok(g) => format!("{g:.1} g"),
            Err(e) => format!("error ({e})"),
        };
        let bowl = fmt_weight(self.sensors.read_bowl_weight());
        let tank = fmt_weight(self.sensors.read_tank_weight());
        let dial = match self.sensors.read_potentiometer() {
            Ok(p) => format!("{p} g"),
            Err(e) => format!("error ({e})"),
        };
        let switch = if self.sensors.read_mode_switch() {
            "manual"
        } else {
            "scheduled"
        };
        format!(
            "Bowl: {bowl}\nTank: {tank}\nDial: {dial}\nMode switch: {switch}\nActuator ready: {}",
            self.actuator.is_ready()
        )
    }

    fn history_report(&self) -> String {
        if self.log.is_empty() {
            return "No feeding events recorded.".into();
        }
        let mut out = String::from("Time(s)   Mode       Portion  Eaten   Duration(s)\n");
        for e in self.log.recent(HISTORY_ROWS) {
            let _ = writeln!(out, "{}", history_row(e));
        }
        let summary = self.tuner.analyze_consumption(&self.log, self.now_ms());
        let _ = write!(
            out,
            "Total events: {}  In window: {}  Eaten: {:.0} g  Avg/feed: {:.1} g",
            self.log.len(),
            summary.feed_count,
            summary.total_consumed_g,
            summary.avg_per_feed_g
        );
        out
    }
}

fn history_row(e: &FeedingEvent) -> String {
    let eaten = e
        .consumed_g
        .map_or_else(|| "-".to_string(), |g| format!("{g:.0} g"));
    let duration = e
        .eating_duration_ms
        .map_or_else(|| "-".to_string(), |ms| format!("{:.1}", ms as f64 / 1000.0));
    format!(
        "{:<9.1} {:<10} {:>4} g   {:<7} {}",
        e.timestamp_ms as f64 / 1000.0,
        e.mode.to_string(),
        e.requested_g,
        eaten,
        duration
    )
}
