#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core feeding logic (hardware-agnostic).
//!
//! All hardware interactions go through the `feeder_traits` device traits,
//! conditioned by `sensors::SensorHub` into the `Sensors` seam.
//!
//! ## Architecture
//!
//! - **Sensors**: calibration, filtering and debouncing (`sensors`)
//! - **Safety**: ordered pre-dispense checks (`safety`) and the failure latch (`faults`)
//! - **Control**: the `Feeder` loop and dispense cycle (`controller`)
//! - **Schedule**: loop timers and the simulated day (`scheduler`)
//! - **Adaptation**: consumption analysis and daily tuning (`adaptive`)
//! - **Persistence**: checksummed settings record (`settings`), event history
//!   (`event_log`) and the `SettingsStore` seam (`store`)
//! - **Commands**: text command parsing (`command`) and execution (`console`)

pub mod adaptive;
pub mod builder;
pub mod calibration;
pub mod command;
pub mod config;
mod console;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod event_log;
pub mod faults;
pub mod hw_error;
pub mod notify;
pub mod safety;
pub mod scheduler;
pub mod sensors;
pub mod settings;
pub mod state;
pub mod store;
pub mod types;
pub mod util;

pub use adaptive::{AdaptiveTuner, Adjustment, AdjustmentCause, ConsumptionSummary, HealthAlert};
pub use builder::FeederBuilder;
pub use calibration::Calibration;
pub use command::{Command, CommandError};
pub use config::{
    ActuatorCfg, AdaptiveCfg, FilterCfg, SafetyCfg, ScheduleCfg, Timeouts, TimingCfg, VesselCfg,
};
pub use controller::{FeedOutcome, Feeder, TickReport};
pub use error::{BuildError, FeederError, Result};
pub use event_log::{EventLog, FeedingEvent};
pub use faults::{EmergencyCause, FaultSource};
pub use notify::{Display, NullDisplay, NullTelemetry, Screen, Topics};
pub use safety::{Decision, DenialReason, GateInput, SafetyGate};
pub use sensors::{SensorDevices, SensorFault, SensorHub, SensorHubCfg, Sensors};
pub use settings::{SettingUpdate, SettingsError, SettingsLimits, SystemSettings};
pub use state::{FeederState, Thresholds};
pub use store::{MemoryStore, SettingsStore, StoreError};
pub use types::{FeedingMode, MAX_PORTION_G, MIN_PORTION_G, Phase};
