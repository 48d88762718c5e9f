//! Type-state builder for `Feeder`.
//!
//! Sensors and the actuator are required; everything else has a default.
//! Settings and history are restored from the store at build time, falling
//! back to defaults when the stored record is missing or invalid.

use std::marker::PhantomData;
use std::sync::Arc;

use feeder_traits::{Actuator, Clock, MonotonicClock, Telemetry};
use tracing::{info, warn};

use crate::adaptive::AdaptiveTuner;
use crate::config::{ActuatorCfg, AdaptiveCfg, SafetyCfg, ScheduleCfg, TimingCfg, VesselCfg};
use crate::controller::Feeder;
use crate::error::{BuildError, Result};
use crate::event_log::EventLog;
use crate::faults::FaultMonitor;
use crate::notify::{Display, NullDisplay, NullTelemetry, Topics};
use crate::safety::SafetyGate;
use crate::scheduler::{DayCycle, LoopTimers};
use crate::sensors::Sensors;
use crate::settings::{SettingsLimits, SystemSettings};
use crate::state::{FeederState, Thresholds};
use crate::store::{MemoryStore, SettingsStore, load_or_default};
use crate::types::{FeedingMode, Phase};

pub struct Missing;
pub struct Set;

impl Feeder {
    /// Start building a Feeder.
    pub fn builder() -> FeederBuilder<Missing, Missing> {
        FeederBuilder::default()
    }
}

/// Builder for `Feeder`. All fields are validated on `build()`.
pub struct FeederBuilder<S, A> {
    sensors: Option<Box<dyn Sensors>>,
    actuator: Option<Box<dyn Actuator>>,
    display: Option<Box<dyn Display>>,
    telemetry: Option<Box<dyn Telemetry>>,
    store: Option<Box<dyn SettingsStore>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    actuator_cfg: Option<ActuatorCfg>,
    safety: Option<SafetyCfg>,
    schedule: Option<ScheduleCfg>,
    adaptive: Option<AdaptiveCfg>,
    vessels: Option<VesselCfg>,
    timing: Option<TimingCfg>,
    defaults: Option<SystemSettings>,
    topic_prefix: Option<String>,
    estop_check: Option<Box<dyn Fn() -> bool>>,
    estop_debounce_n: Option<u8>,
    _s: PhantomData<S>,
    _a: PhantomData<A>,
}

impl Default for FeederBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            sensors: None,
            actuator: None,
            display: None,
            telemetry: None,
            store: None,
            clock: None,
            actuator_cfg: None,
            safety: None,
            schedule: None,
            adaptive: None,
            vessels: None,
            timing: None,
            defaults: None,
            topic_prefix: None,
            estop_check: None,
            estop_debounce_n: None,
            _s: PhantomData,
            _a: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Parts handed to `validate_and_build`.
struct Parts {
    sensors: Box<dyn Sensors>,
    actuator: Box<dyn Actuator>,
    display: Box<dyn Display>,
    telemetry: Box<dyn Telemetry>,
    store: Box<dyn SettingsStore>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    actuator_cfg: ActuatorCfg,
    safety: SafetyCfg,
    schedule: ScheduleCfg,
    adaptive: AdaptiveCfg,
    vessels: VesselCfg,
    timing: TimingCfg,
    defaults: SystemSettings,
    topic_prefix: String,
    estop_check: Option<Box<dyn Fn() -> bool>>,
    estop_debounce_n: u8,
}

/// Validate configuration and construct the `Feeder`.
///
/// This is the single place configuration is checked.
fn validate_and_build(p: Parts) -> Result<Feeder> {
    // ── Validation ───────────────────────────────────────────────────────────
    let a = &p.actuator_cfg;
    if a.closed_deg > 90 || a.open_min_deg > 90 || a.open_max_deg > 90 {
        return Err(invalid("actuator angles must be within [0, 90] degrees"));
    }
    if a.open_min_deg > a.open_max_deg || a.open_min_deg <= a.closed_deg {
        return Err(invalid(
            "actuator open angles must be ordered and above the closed angle",
        ));
    }
    if a.hold_min_ms > a.hold_max_ms {
        return Err(invalid("hold_min_ms must be <= hold_max_ms"));
    }
    if a.dispense_timeout_ms <= a.hold_max_ms {
        return Err(invalid("dispense_timeout_ms must exceed hold_max_ms"));
    }
    if p.safety.max_consecutive_failures == 0 {
        return Err(invalid("max_consecutive_failures must be >= 1"));
    }
    let s = &p.schedule;
    if s.fastest_interval_ms == 0 || s.fastest_interval_ms >= s.slowest_interval_ms {
        return Err(invalid(
            "fastest_interval_ms must be > 0 and < slowest_interval_ms",
        ));
    }
    if s.day_length_ms == 0 {
        return Err(invalid("day_length_ms must be > 0"));
    }
    let v = &p.vessels;
    if !(v.bowl_max_g > 0.0 && v.tank_capacity_g > 0.0) {
        return Err(invalid("vessel sizes must be > 0"));
    }
    if !(p.adaptive.low_intake_g < p.adaptive.high_intake_g) {
        return Err(invalid("low_intake_g must be < high_intake_g"));
    }
    let limits = SettingsLimits::from(&p.schedule);
    if p.defaults.validate(&limits).is_err() {
        return Err(invalid("default settings out of range"));
    }

    // ── Restore ──────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> = match p.clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let epoch = clock.now();
    let now = clock.ms_since(epoch);

    let mut store = p.store;
    let settings = load_or_default(store.as_mut(), &limits, &p.defaults);
    let log = match store.load_events() {
        Ok(events) => EventLog::restore(events),
        Err(e) => {
            warn!(error = %e, "stored events unreadable; starting with empty history");
            EventLog::new()
        }
    };
    let thresholds = Thresholds::new(&settings, &p.vessels);
    let state = FeederState::new(&settings, FeedingMode::Scheduled, now);

    let mut actuator = p.actuator;
    if let Err(e) = actuator.attach() {
        warn!(error = %e, "actuator attach failed; health check will retry");
    }

    info!(
        portion_g = settings.default_portion_g,
        interval_ms = settings.feeding_interval_ms,
        adaptive = settings.adaptive_enabled,
        events = log.len(),
        "feeder ready"
    );

    let mut feeder = Feeder {
        sensors: p.sensors,
        actuator,
        display: p.display,
        telemetry: p.telemetry,
        store,
        clock,
        epoch,
        gate: SafetyGate::new(&p.safety),
        tuner: AdaptiveTuner::new(p.adaptive, p.schedule.clone()),
        day: DayCycle::new(p.schedule.day_length_ms, now),
        timers: LoopTimers::from(&p.timing),
        faults: FaultMonitor::new(p.safety.max_consecutive_failures),
        topics: Topics::new(&p.topic_prefix),
        actuator_cfg: p.actuator_cfg,
        safety: p.safety,
        schedule: p.schedule,
        vessels: p.vessels,
        defaults: p.defaults,
        limits,
        settings,
        thresholds,
        state,
        phase: Phase::Idle,
        log,
        estop_check: p.estop_check,
        estop_debounce_n: p.estop_debounce_n,
        estop_count: 0,
        last_denial: None,
        last_valid_reading_ms: now,
        awaiting_consumption: false,
    };
    if feeder.actuator.is_ready() {
        feeder.close_gate_best_effort();
    }
    Ok(feeder)
}

impl<S, A> FeederBuilder<S, A> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Feeder> {
        let sensors = self
            .sensors
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensors))?;
        let actuator = self
            .actuator
            .ok_or_else(|| eyre::Report::new(BuildError::MissingActuator))?;

        validate_and_build(Parts {
            sensors,
            actuator,
            display: self.display.unwrap_or_else(|| Box::new(NullDisplay)),
            telemetry: self.telemetry.unwrap_or_else(|| Box::new(NullTelemetry)),
            store: self.store.unwrap_or_else(|| Box::new(MemoryStore::new())),
            clock: self.clock,
            actuator_cfg: self.actuator_cfg.unwrap_or_default(),
            safety: self.safety.unwrap_or_default(),
            schedule: self.schedule.unwrap_or_default(),
            adaptive: self.adaptive.unwrap_or_default(),
            vessels: self.vessels.unwrap_or_default(),
            timing: self.timing.unwrap_or_default(),
            defaults: self.defaults.unwrap_or_default(),
            topic_prefix: self.topic_prefix.unwrap_or_else(|| "catfeeder".into()),
            estop_check: self.estop_check,
            estop_debounce_n: self.estop_debounce_n.unwrap_or(2),
        })
    }
}

/// Chainable setters that do not affect type-state.
impl<S, A> FeederBuilder<S, A> {
    pub fn with_display(mut self, display: impl Display + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }
    pub fn with_telemetry(mut self, telemetry: impl Telemetry + 'static) -> Self {
        self.telemetry = Some(Box::new(telemetry));
        self
    }
    pub fn with_store(mut self, store: impl SettingsStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }
    pub fn with_actuator_cfg(mut self, cfg: ActuatorCfg) -> Self {
        self.actuator_cfg = Some(cfg);
        self
    }
    pub fn with_safety(mut self, safety: SafetyCfg) -> Self {
        self.safety = Some(safety);
        self
    }
    pub fn with_schedule(mut self, schedule: ScheduleCfg) -> Self {
        self.schedule = Some(schedule);
        self
    }
    pub fn with_adaptive(mut self, adaptive: AdaptiveCfg) -> Self {
        self.adaptive = Some(adaptive);
        self
    }
    pub fn with_vessels(mut self, vessels: VesselCfg) -> Self {
        self.vessels = Some(vessels);
        self
    }
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    /// Settings used when nothing valid is stored, and by the `default` command.
    pub fn with_defaults(mut self, defaults: SystemSettings) -> Self {
        self.defaults = Some(defaults);
        self
    }
    pub fn with_topic_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.topic_prefix = Some(prefix.into());
        self
    }
    pub fn with_estop_check<F>(mut self, f: F) -> Self
    where
        F: Fn() -> bool + 'static,
    {
        self.estop_check = Some(Box::new(f));
        self
    }
    pub fn with_estop_debounce(mut self, n: u8) -> Self {
        self.estop_debounce_n = Some(n.max(1));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<A> FeederBuilder<Missing, A> {
    pub fn with_sensors(self, sensors: impl Sensors + 'static) -> FeederBuilder<Set, A> {
        FeederBuilder {
            sensors: Some(Box::new(sensors)),
            actuator: self.actuator,
            display: self.display,
            telemetry: self.telemetry,
            store: self.store,
            clock: self.clock,
            actuator_cfg: self.actuator_cfg,
            safety: self.safety,
            schedule: self.schedule,
            adaptive: self.adaptive,
            vessels: self.vessels,
            timing: self.timing,
            defaults: self.defaults,
            topic_prefix: self.topic_prefix,
            estop_check: self.estop_check,
            estop_debounce_n: self.estop_debounce_n,
            _s: PhantomData,
            _a: PhantomData,
        }
    }
}

impl<S> FeederBuilder<S, Missing> {
    pub fn with_actuator(self, actuator: impl Actuator + 'static) -> FeederBuilder<S, Set> {
        FeederBuilder {
            sensors: self.sensors,
            actuator: Some(Box::new(actuator)),
            display: self.display,
            telemetry: self.telemetry,
            store: self.store,
            clock: self.clock,
            actuator_cfg: self.actuator_cfg,
            safety: self.safety,
            schedule: self.schedule,
            adaptive: self.adaptive,
            vessels: self.vessels,
            timing: self.timing,
            defaults: self.defaults,
            topic_prefix: self.topic_prefix,
            estop_check: self.estop_check,
            estop_debounce_n: self.estop_debounce_n,
            _s: PhantomData,
            _a: PhantomData,
        }
    }
}

impl FeederBuilder<Set, Set> {
    /// Validate and build the Feeder. Only available when sensors and actuator are set.
    pub fn build(self) -> Result<Feeder> {
        self.try_build()
    }
}
