//! The feeding controller (`Feeder`).
//!
//! One `tick()` is one pass of the cooperative loop: poll the emergency
//! input, refresh sensors, arbitrate the mode, run the health check, decide
//! whether to feed, handle day boundaries and push status out. Dispensing is
//! the only operation that blocks, and it is bounded by the actuator budget.

use std::sync::Arc;
use std::time::{Duration, Instant};

use feeder_traits::{Actuator, Clock, Telemetry};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::adaptive::{AdaptiveTuner, HealthAlert};
use crate::config::{ActuatorCfg, SafetyCfg, ScheduleCfg, VesselCfg};
use crate::error::FeederError;
use crate::event_log::{EventLog, FeedingEvent};
use crate::faults::{EmergencyCause, FaultMonitor, FaultSource};
use crate::hw_error::map_hw_error;
use crate::notify::{Display, Screen, Topics};
use crate::safety::{Decision, DenialReason, GateInput, SafetyGate};
use crate::scheduler::{DayCycle, LoopTimers, Rollover, scheduled_feed_due};
use crate::sensors::Sensors;
use crate::settings::{SettingsLimits, SystemSettings};
use crate::state::{FeederState, Thresholds};
use crate::store::SettingsStore;
use crate::types::{FeedingMode, Phase};
use crate::util::{portion_to_angle, portion_to_hold_ms};

/// Result of one feed request.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedOutcome {
    Dispensed(FeedingEvent),
    Denied(DenialReason),
    Failed(FeederError),
}

/// What happened during one `tick()`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub feed: Option<FeedOutcome>,
    pub rollovers: u64,
    pub emergency: bool,
}

pub struct Feeder {
    pub(crate) sensors: Box<dyn Sensors>,
    pub(crate) actuator: Box<dyn Actuator>,
    pub(crate) display: Box<dyn Display>,
    pub(crate) telemetry: Box<dyn Telemetry>,
    pub(crate) store: Box<dyn SettingsStore>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) epoch: Instant,

    pub(crate) actuator_cfg: ActuatorCfg,
    pub(crate) safety: SafetyCfg,
    pub(crate) schedule: ScheduleCfg,
    pub(crate) vessels: VesselCfg,
    pub(crate) defaults: SystemSettings,
    pub(crate) limits: SettingsLimits,
    pub(crate) settings: SystemSettings,
    pub(crate) thresholds: Thresholds,
    pub(crate) state: FeederState,
    pub(crate) phase: Phase,
    pub(crate) log: EventLog,
    pub(crate) gate: SafetyGate,
    pub(crate) tuner: AdaptiveTuner,
    pub(crate) day: DayCycle,
    pub(crate) timers: LoopTimers,
    pub(crate) faults: FaultMonitor,
    pub(crate) topics: Topics,

    pub(crate) estop_check: Option<Box<dyn Fn() -> bool>>,
    pub(crate) estop_debounce_n: u8,
    pub(crate) estop_count: u8,
    pub(crate) last_denial: Option<&'static str>,
    pub(crate) last_valid_reading_ms: u64,
    pub(crate) awaiting_consumption: bool,
}

impl core::fmt::Debug for Feeder {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Feeder")
            .field("phase", &self.phase())
            .field("state", &self.state)
            .field("settings", &self.settings)
            .field("events", &self.log.len())
            .finish_non_exhaustive()
    }
}

impl Feeder {
    #[inline]
    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    pub fn state(&self) -> &FeederState {
        &self.state
    }

    pub fn settings(&self) -> &SystemSettings {
        &self.settings
    }

    pub fn thresholds(&self) -> &Thresholds {
        &self.thresholds
    }

    pub fn events(&self) -> &EventLog {
        &self.log
    }

    pub fn phase(&self) -> Phase {
        if self.faults.is_latched() {
            Phase::EmergencyStop
        } else {
            self.phase
        }
    }

    pub fn emergency_cause(&self) -> Option<EmergencyCause> {
        self.faults.latched()
    }

    /// One pass of the control loop.
    pub fn tick(&mut self) -> TickReport {
        let now = self.now_ms();
        let mut report = TickReport::default();

        if self.poll_estop() {
            self.enter_emergency(EmergencyCause::ExternalStop);
        }
        if self.timers.sensors.due(now) {
            self.poll_sensors(now);
        }
        self.arbitrate_mode(now);
        let pressed = self.sensors.read_feed_button();
        if self.timers.health.due(now) {
            self.health_check(now);
        }

        if self.faults.is_latched() {
            if pressed {
                debug!("feed button ignored during emergency stop");
            }
        } else if pressed {
            if self.state.mode == FeedingMode::Manual {
                report.feed = Some(self.request_feed(FeedingMode::Manual));
            } else {
                debug!("feed button ignored in scheduled mode");
            }
        } else if self.timers.scheduler.due(now) && scheduled_feed_due(&self.state, now) {
            report.feed = Some(self.request_feed(FeedingMode::Scheduled));
        }

        let now = self.now_ms();
        while let Some(r) = self.day.next_rollover(now) {
            self.roll_over_day(r, now);
            report.rollovers += 1;
        }

        if self.timers.display.due(now) {
            self.display.render(&Screen::Status, &self.state);
        }
        if self.timers.telemetry.due(now) {
            self.telemetry.poll();
            self.publish_status();
        }
        report.emergency = self.faults.is_latched();
        report
    }

    /// Run the safety gate and, if allowed, dispense one portion.
    ///
    /// Manual feeds use the dial portion, scheduled feeds the tuned portion.
    pub fn request_feed(&mut self, mode: FeedingMode) -> FeedOutcome {
        let now = self.now_ms();
        let portion_g = match mode {
            FeedingMode::Manual => self.state.dial_portion_g,
            FeedingMode::Scheduled => self.state.portion_size_g,
        };
        let decision = self.gate.evaluate(&GateInput {
            state: &self.state,
            thresholds: &self.thresholds,
            portion_g,
            now_ms: now,
            emergency: self.faults.is_latched(),
            actuator_ready: self.actuator.is_ready(),
        });
        if let Decision::Denied(reason) = decision {
            self.note_denial(reason, mode, portion_g);
            return FeedOutcome::Denied(reason);
        }
        self.last_denial = None;

        info!(%mode, portion_g, bowl_g = self.state.bowl_level_g, "dispensing");
        self.phase = Phase::Dispensing;
        self.display
            .render(&Screen::Dispensing { portion_g }, &self.state);
        let bowl_before_g = self.state.bowl_level_g;
        let result = self.dispense(portion_g);
        self.phase = Phase::Idle;

        match result {
            Ok(()) => {
                self.faults.record_ok(FaultSource::Actuator);
                self.state.record_dispense(portion_g, now, &self.thresholds);
                self.sensors
                    .note_dispensed(self.state.bowl_level_g, self.state.tank_level_g);
                let event = FeedingEvent {
                    timestamp_ms: now,
                    mode,
                    requested_g: portion_g,
                    bowl_before_g,
                    bowl_after_g: self.state.bowl_level_g,
                    consumed_g: None,
                    eating_duration_ms: None,
                };
                let dropped = self.log.append(event.clone());
                if dropped > 0 {
                    debug!(dropped, "event log compacted");
                }
                if let Err(e) = self.store.append_event(&event) {
                    warn!(error = %e, "persisting feeding event failed");
                }
                self.awaiting_consumption = true;
                self.publish(
                    &self.topics.feeding.clone(),
                    &json!({
                        "event": "dispensed",
                        "mode": mode,
                        "portion_g": portion_g,
                        "bowl_g": self.state.bowl_level_g,
                        "tank_g": self.state.tank_level_g,
                        "feeds_today": self.state.feed_events_today,
                    }),
                );
                self.display
                    .render(&Screen::Dispensed { portion_g }, &self.state);
                info!(
                    portion_g,
                    feeds_today = self.state.feed_events_today,
                    tank_g = self.state.tank_level_g,
                    "feed complete"
                );
                FeedOutcome::Dispensed(event)
            }
            Err(e) => {
                error!(error = %e, portion_g, "dispense failed");
                self.close_gate_best_effort();
                self.display
                    .render(&Screen::Failure(e.to_string()), &self.state);
                self.publish(
                    &self.topics.alerts.clone(),
                    &json!({ "alert": "dispense_failed", "error": e.to_string() }),
                );
                self.register_failure(FaultSource::Actuator);
                FeedOutcome::Failed(e)
            }
        }
    }

    /// Open, hold and close the gate within the dispense budget.
    ///
    /// If the budget is used up before closing, closing still gets its own
    /// budget; the dispense is then reported as an overrun.
    fn dispense(&mut self, portion_g: u16) -> Result<(), FeederError> {
        let budget_ms = self.actuator_cfg.dispense_timeout_ms;
        let budget = Duration::from_millis(budget_ms);
        let angle = portion_to_angle(portion_g, &self.actuator_cfg);
        let hold = Duration::from_millis(portion_to_hold_ms(portion_g, &self.actuator_cfg));
        let started = self.clock.now();

        self.actuator
            .move_to(angle, budget)
            .map_err(|e| map_hw_error(&*e))?;
        self.clock.sleep(hold);

        let spent = self.clock.now().saturating_duration_since(started);
        let close_budget = match budget.checked_sub(spent) {
            Some(left) if !left.is_zero() => left,
            _ => budget,
        };
        self.actuator
            .move_to(self.actuator_cfg.closed_deg, close_budget)
            .map_err(|e| map_hw_error(&*e))?;

        let total = self.clock.now().saturating_duration_since(started);
        if total > budget {
            return Err(FeederError::DispenseOverrun { budget_ms });
        }
        debug!(
            angle,
            hold_ms = hold.as_millis() as u64,
            elapsed_ms = total.as_millis() as u64,
            "gate cycled"
        );
        Ok(())
    }

    pub(crate) fn close_gate_best_effort(&mut self) {
        let budget = Duration::from_millis(self.actuator_cfg.dispense_timeout_ms);
        if let Err(e) = self.actuator.move_to(self.actuator_cfg.closed_deg, budget) {
            warn!(error = %e, "closing gate failed");
        }
    }

    fn note_denial(&mut self, reason: DenialReason, mode: FeedingMode, portion_g: u16) {
        let code = reason.code();
        if self.last_denial == Some(code) {
            debug!(reason = code, "feed denied again");
        } else {
            info!(reason = code, %mode, portion_g, "feed denied: {reason}");
            self.display.render(&Screen::Denied(reason), &self.state);
        }
        self.last_denial = Some(code);
    }

    fn poll_sensors(&mut self, now: u64) {
        let bowl = self.sensors.read_bowl_weight();
        let tank = self.sensors.read_tank_weight();
        let dial = self.sensors.read_potentiometer();

        match dial {
            Ok(p) => self.state.dial_portion_g = p,
            Err(ref e) => debug!(error = %e, "dial reading rejected"),
        }
        match (bowl, tank) {
            (Ok(bowl_g), Ok(tank_g)) => {
                let changes = self
                    .state
                    .apply_levels(bowl_g, tank_g, &self.thresholds, now);
                self.state.sensors_valid = dial.is_ok();
                self.last_valid_reading_ms = now;
                self.faults.record_ok(FaultSource::Sensor);
                if changes.bowl_emptied {
                    self.on_bowl_emptied(now);
                }
                if changes.tank_went_low {
                    self.on_tank_low();
                }
            }
            (bowl, tank) => {
                self.state.sensors_valid = false;
                for e in [bowl.err(), tank.err()].into_iter().flatten() {
                    warn!(error = %e, "weight reading rejected");
                }
                self.register_failure(FaultSource::Sensor);
            }
        }
    }

    fn on_bowl_emptied(&mut self, now: u64) {
        if !self.awaiting_consumption {
            return;
        }
        self.awaiting_consumption = false;
        let Some(last) = self.log.last() else {
            return;
        };
        let consumed = (last.bowl_after_g - self.state.bowl_level_g).max(0.0);
        let duration = now.saturating_sub(last.timestamp_ms);
        if let Some(done) = self.log.complete_last(consumed, duration).cloned() {
            info!(consumed_g = consumed, eating_ms = duration, "bowl emptied");
            if let Err(e) = self.store.update_last_event(&done) {
                warn!(error = %e, "persisting consumption failed");
            }
        }
    }

    fn on_tank_low(&mut self) {
        let tank_g = self.state.tank_level_g;
        warn!(tank_g, threshold_g = self.thresholds.tank_low_g, "tank level low");
        self.display.render(&Screen::LowFood { tank_g }, &self.state);
        self.publish(
            &self.topics.alerts.clone(),
            &json!({ "alert": "tank_low", "tank_g": tank_g }),
        );
    }

    fn arbitrate_mode(&mut self, now: u64) {
        let mode = if self.sensors.read_mode_switch() {
            FeedingMode::Manual
        } else {
            FeedingMode::Scheduled
        };
        if mode == self.state.mode {
            return;
        }
        if mode == FeedingMode::Scheduled {
            // The schedule counts from the moment it takes over.
            self.state.last_feed_time_ms = now;
        }
        info!(from = %self.state.mode, to = %mode, "feeding mode changed");
        self.state.mode = mode;
    }

    fn health_check(&mut self, now: u64) {
        if !self.actuator.is_ready() {
            warn!("actuator not ready; reattaching");
            match self.actuator.attach() {
                Ok(()) if self.actuator.is_ready() => {
                    info!("actuator reattached");
                    self.faults.record_ok(FaultSource::Actuator);
                }
                Ok(()) => self.register_failure(FaultSource::Actuator),
                Err(e) => {
                    warn!(error = %e, "actuator reattach failed");
                    self.register_failure(FaultSource::Actuator);
                }
            }
        }
        let silent_ms = now.saturating_sub(self.last_valid_reading_ms);
        if silent_ms > self.safety.sensor_timeout_ms {
            warn!(silent_ms, "no valid weight reading within timeout");
            self.register_failure(FaultSource::Sensor);
        }
        debug!(
            sensors_valid = self.state.sensors_valid,
            actuator_ready = self.actuator.is_ready(),
            "health check"
        );
    }

    fn register_failure(&mut self, source: FaultSource) {
        let failures = self.faults.failures(source).saturating_add(1);
        if self.faults.record_failure(source) {
            error!(%source, failures, "failure limit reached");
            self.enter_emergency(EmergencyCause::RepeatedFailures(source));
        }
    }

    /// Latch the emergency stop and close the gate. Idempotent.
    pub fn enter_emergency(&mut self, cause: EmergencyCause) {
        if !self.faults.latch(cause) {
            return;
        }
        error!(%cause, "emergency stop latched");
        self.phase = Phase::EmergencyStop;
        self.close_gate_best_effort();
        self.display
            .render(&Screen::Emergency(cause), &self.state);
        self.publish(
            &self.topics.alerts.clone(),
            &json!({ "alert": "emergency_stop", "cause": cause.to_string() }),
        );
    }

    pub fn clear_emergency(&mut self) {
        if let Some(cause) = self.faults.latched() {
            info!(%cause, "emergency stop cleared");
        }
        self.faults.clear();
        self.estop_count = 0;
        self.phase = Phase::Idle;
    }

    fn poll_estop(&mut self) -> bool {
        let Some(check) = &self.estop_check else {
            return false;
        };
        if check() {
            self.estop_count = self.estop_count.saturating_add(1);
            self.estop_count >= self.estop_debounce_n
        } else {
            self.estop_count = 0;
            false
        }
    }

    fn roll_over_day(&mut self, r: Rollover, now: u64) {
        let fed_today = self.state.feed_events_today;

        let adjustment = if self.settings.adaptive_enabled {
            self.tuner
                .end_of_day_adjustment(&self.state, &self.log, r.started_ms)
        } else {
            None
        };
        if let Some(adj) = adjustment {
            info!(
                cause = ?adj.cause,
                from_portion_g = self.state.portion_size_g,
                to_portion_g = adj.portion_g,
                from_interval_ms = self.state.feed_interval_ms,
                to_interval_ms = adj.interval_ms,
                "adaptive adjustment"
            );
            self.state.portion_size_g = adj.portion_g;
            self.state.feed_interval_ms = adj.interval_ms;
            self.settings.default_portion_g = adj.portion_g;
            self.settings.feeding_interval_ms = adj.interval_ms;
            self.persist_settings();
        }

        self.state.start_new_day();

        let summary = self.tuner.analyze_consumption(&self.log, now);
        let alert = if fed_today == 0 {
            Some(HealthAlert::NoFeedsToday { day: r.ended_day })
        } else {
            self.tuner.detect_unusual_behavior(&summary)
        };
        if let Some(alert) = alert {
            warn!(%alert, "consumption alert");
            self.display.render(&Screen::Alert(alert), &self.state);
            self.publish(
                &self.topics.alerts.clone(),
                &json!({ "alert": "consumption", "detail": alert }),
            );
        }

        self.state.day_cycle += 1;
        self.display.render(
            &Screen::DayComplete {
                day: r.ended_day,
                feeds: fed_today,
            },
            &self.state,
        );
        info!(
            day = r.ended_day,
            feeds = fed_today,
            consumed_g = summary.total_consumed_g,
            "day complete"
        );
    }

    pub(crate) fn persist_settings(&mut self) {
        if let Err(e) = self.store.save_settings(&self.settings) {
            warn!(error = %e, "persisting settings failed");
        }
    }

    pub(crate) fn refresh_thresholds(&mut self) {
        self.thresholds = Thresholds::new(&self.settings, &self.vessels);
        self.state.refresh_flags(&self.thresholds);
    }

    pub fn publish_status(&mut self) {
        let now = self.now_ms();
        let status = json!({
            "mode": self.state.mode,
            "phase": format!("{:?}", self.phase()),
            "portion_g": self.state.portion_size_g,
            "dial_portion_g": self.state.dial_portion_g,
            "interval_ms": self.state.feed_interval_ms,
            "next_feed_ms": self.state.ms_until_next_feed(now),
            "feeds_today": self.state.feed_events_today,
            "day": self.state.day_cycle,
            "adaptive": self.settings.adaptive_enabled,
            "sensors_valid": self.state.sensors_valid,
        });
        let weights = json!({
            "bowl_g": self.state.bowl_level_g,
            "tank_g": self.state.tank_level_g,
            "bowl_full": self.state.bowl_is_full,
            "tank_low": self.state.tank_low,
        });
        self.publish(&self.topics.status.clone(), &status);
        self.publish(&self.topics.weights.clone(), &weights);
    }

    fn publish(&mut self, topic: &str, payload: &serde_json::Value) {
        if !self.telemetry.is_connected() {
            return;
        }
        if let Err(e) = self.telemetry.publish(topic, &payload.to_string()) {
            warn!(topic, error = %e, "telemetry publish failed");
        }
    }
}
