//! Device backends for the feeder: a deterministic simulator and, behind the
//! `hardware` feature, Raspberry Pi drivers (HX711 load cells, PWM servo,
//! MCP3008 potentiometer, pulled-up GPIO inputs).

pub mod error;
pub mod sim;
pub mod util;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod hx711;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;

pub use sim::{SimCat, SimGate, SimLoadCell, SimPantry, SimPin, SimPot, SimServo, Vessel};

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub use rpi::{GpioInput, HardwareLoadCell, Mcp3008Channel, PwmServo, make_estop_checker};
