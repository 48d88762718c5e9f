//! Wiring: config + devices + store into a ready `Feeder`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use eyre::{Result, WrapErr};
use feeder_config::{Config, load_calibration_csv};
use feeder_core::{
    ActuatorCfg, AdaptiveCfg, Calibration, Display, Feeder, NullDisplay, NullTelemetry,
    SafetyCfg, ScheduleCfg, SensorDevices, SensorHub, SensorHubCfg, SystemSettings, TimingCfg,
    VesselCfg,
};
use feeder_hardware::{SimCat, SimPantry};
#[cfg(not(feature = "hardware"))]
use feeder_hardware::{SimGate, SimLoadCell, SimPin, SimPot, SimServo, Vessel};
use feeder_traits::{Actuator, Clock, MonotonicClock, Telemetry, TestClock};
use feeder_ui::TextDisplay;
use tracing::info;

use crate::store::FileStore;
use crate::telemetry::JsonlTelemetry;

/// Read, parse and validate the config; built-in defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        info!(path = %path.display(), "config file not found; using defaults");
        return Ok(Config::default());
    }
    let text = fs::read_to_string(path)
        .wrap_err_with(|| format!("read config {}", path.display()))?;
    let cfg = feeder_config::load_toml(&text)?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

/// Calibrations from CSV files take precedence over `[calibration.*]`.
pub fn apply_calibration_files(
    hub: &mut SensorHubCfg,
    bowl: Option<&Path>,
    tank: Option<&Path>,
) -> Result<()> {
    if let Some(p) = bowl {
        let cal = load_calibration_csv(p)
            .wrap_err_with(|| format!("bowl calibration {}", p.display()))?;
        hub.bowl_calibration = Calibration::from(&cal);
        info!(gain = cal.gain_g_per_count, zero = cal.zero_counts, "bowl calibration loaded");
    }
    if let Some(p) = tank {
        let cal = load_calibration_csv(p)
            .wrap_err_with(|| format!("tank calibration {}", p.display()))?;
        hub.tank_calibration = Calibration::from(&cal);
        info!(gain = cal.gain_g_per_count, zero = cal.zero_counts, "tank calibration loaded");
    }
    Ok(())
}

/// Simulated world the controller acts on when no hardware is attached.
pub struct SimWorld {
    pub pantry: SimPantry,
    pub cat: SimCat,
}

impl SimWorld {
    /// Let the cat eat; call once per loop iteration.
    pub fn step(&mut self, now_ms: u64) {
        self.cat.tick(now_ms);
    }
}

/// How the loop measures time.
#[derive(Clone)]
pub enum TimeSource {
    Wall(MonotonicClock),
    Virtual(TestClock),
}

impl TimeSource {
    pub fn boxed(&self) -> Box<dyn Clock + Send + Sync> {
        match self {
            Self::Wall(c) => Box::new(*c),
            Self::Virtual(c) => Box::new(c.clone()),
        }
    }
}

pub struct Options<'a> {
    pub state_dir: PathBuf,
    pub bowl_calibration: Option<&'a Path>,
    pub tank_calibration: Option<&'a Path>,
    pub time: TimeSource,
    /// Render screens as text on stderr.
    pub show_display: bool,
}

pub struct Rig {
    pub feeder: Feeder,
    pub world: Option<SimWorld>,
    pub time: TimeSource,
    pub store_dir: PathBuf,
}

#[cfg(not(feature = "hardware"))]
fn sim_devices(
    cfg: &Config,
    hub: &SensorHubCfg,
) -> (SensorDevices, Box<dyn Actuator>, SimWorld) {
    let pantry = SimPantry::new(cfg.tank.capacity_g, cfg.tank.capacity_g);
    let cell = |vessel: Vessel, cal: &Calibration| {
        SimLoadCell::new(pantry.clone(), vessel)
            .with_calibration(cal.zero_counts, cal.gain_g_per_count)
    };
    // Dial starts at the configured default portion.
    let span = i32::from(feeder_core::MAX_PORTION_G - feeder_core::MIN_PORTION_G);
    let offset = i32::from(
        cfg.defaults
            .default_portion_g
            .saturating_sub(feeder_core::MIN_PORTION_G),
    );
    let span = span.max(1);
    let dial_raw = (offset * cfg.filter.adc_max + span - 1) / span;

    let devices = SensorDevices {
        bowl: Box::new(cell(Vessel::Bowl, &hub.bowl_calibration)),
        tank: Box::new(cell(Vessel::Tank, &hub.tank_calibration)),
        dial: Box::new(SimPot::new(dial_raw)),
        feed_button: Box::new(SimPin::new(true)),
        mode_switch: Box::new(SimPin::new(true)),
    };
    let gate = SimGate {
        closed_deg: cfg.actuator.closed_deg,
        open_min_deg: cfg.actuator.open_min_deg,
        open_max_deg: cfg.actuator.open_max_deg,
        min_portion_g: f32::from(feeder_core::MIN_PORTION_G),
        max_portion_g: f32::from(feeder_core::MAX_PORTION_G),
    };
    let servo = SimServo::new(pantry.clone(), gate);
    let world = SimWorld {
        cat: SimCat::new(pantry.clone()),
        pantry,
    };
    (devices, Box::new(servo), world)
}

#[cfg(feature = "hardware")]
fn hardware_devices(cfg: &Config) -> Result<(SensorDevices, Box<dyn Actuator>)> {
    use feeder_hardware::{GpioInput, HardwareLoadCell, Mcp3008Channel, PwmServo};
    let p = &cfg.pins;
    let devices = SensorDevices {
        bowl: Box::new(HardwareLoadCell::new(p.bowl_dt, p.bowl_sck).wrap_err("open bowl hx711")?),
        tank: Box::new(HardwareLoadCell::new(p.tank_dt, p.tank_sck).wrap_err("open tank hx711")?),
        dial: Box::new(Mcp3008Channel::new(p.pot_channel).wrap_err("open mcp3008")?),
        feed_button: Box::new(GpioInput::new(p.feed_button).wrap_err("open feed button pin")?),
        mode_switch: Box::new(GpioInput::new(p.mode_switch).wrap_err("open mode switch pin")?),
    };
    let servo = PwmServo::new(p.servo, cfg.hardware.servo_step_ms);
    Ok((devices, Box::new(servo)))
}

fn telemetry_for(cfg: &Config) -> Result<Box<dyn Telemetry>> {
    if !cfg.telemetry.enabled {
        return Ok(Box::new(NullTelemetry));
    }
    match &cfg.telemetry.file {
        Some(path) => {
            let f = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .wrap_err_with(|| format!("open telemetry sink {path}"))?;
            Ok(Box::new(JsonlTelemetry::new(f)))
        }
        None => Ok(Box::new(JsonlTelemetry::new(io::stderr()))),
    }
}

pub fn build(cfg: &Config, opts: Options<'_>) -> Result<Rig> {
    let mut hub_cfg = SensorHubCfg::from(cfg);
    apply_calibration_files(&mut hub_cfg, opts.bowl_calibration, opts.tank_calibration)?;

    #[cfg(feature = "hardware")]
    let (devices, actuator, world) = {
        let (d, a) = hardware_devices(cfg)?;
        (d, a, None)
    };
    #[cfg(not(feature = "hardware"))]
    let (devices, actuator, world) = {
        let (d, a, w) = sim_devices(cfg, &hub_cfg);
        (d, a, Some(w))
    };

    let hub = SensorHub::with_clock(devices, &hub_cfg, opts.time.boxed());
    let store = FileStore::open(&opts.state_dir)
        .wrap_err_with(|| format!("open state dir {}", opts.state_dir.display()))?;

    let display: Box<dyn Display> = if opts.show_display {
        Box::new(
            TextDisplay::with_clock(io::stderr(), opts.time.boxed())
                .with_tank_capacity(cfg.tank.capacity_g),
        )
    } else {
        Box::new(NullDisplay)
    };

    let mut builder = Feeder::builder()
        .with_sensors(hub)
        .with_actuator(actuator)
        .with_display(display)
        .with_telemetry(telemetry_for(cfg)?)
        .with_store(store)
        .with_actuator_cfg(ActuatorCfg::from(&cfg.actuator))
        .with_safety(SafetyCfg::from(&cfg.safety))
        .with_schedule(ScheduleCfg::from(&cfg.schedule))
        .with_adaptive(AdaptiveCfg::from(&cfg.adaptive))
        .with_vessels(VesselCfg::from(cfg))
        .with_timing(TimingCfg::from(&cfg.timing))
        .with_defaults(SystemSettings::from(&cfg.defaults))
        .with_topic_prefix(cfg.telemetry.topic_prefix.clone())
        .with_estop_debounce(cfg.estop.debounce_n)
        .with_clock(opts.time.boxed());

    #[cfg(feature = "hardware")]
    if let Some(pin) = cfg.pins.estop_in {
        let check = feeder_hardware::make_estop_checker(pin, cfg.estop.active_low)
            .wrap_err("open e-stop pin")?;
        builder = builder.with_estop_check(check);
    }
    #[cfg(not(feature = "hardware"))]
    {
        builder = builder.with_estop_check(|| false);
    }

    let feeder = builder.build()?;
    Ok(Rig {
        feeder,
        world,
        time: opts.time,
        store_dir: opts.state_dir,
    })
}
