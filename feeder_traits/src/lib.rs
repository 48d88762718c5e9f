//! Hardware seams for the feeder: raw devices only, no filtering or policy.
//!
//! Every fallible call returns a boxed error so that simulated and real
//! backends can bring their own error types. `feeder_core` maps them to
//! typed errors at the boundary.

pub mod clock;

pub use clock::{Clock, MonotonicClock, TestClock};

use std::time::Duration;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Load cell amplifier (bowl or tank), reporting raw ADC counts.
pub trait LoadCell {
    fn read(&mut self, timeout: Duration) -> Result<i32, BoxError>;
}

/// Single analog channel, e.g. the portion potentiometer.
pub trait AnalogInput {
    fn read(&mut self) -> Result<i32, BoxError>;
}

/// Digital input line. Buttons and switches on the feeder are active low.
pub trait DigitalInput {
    fn is_high(&mut self) -> Result<bool, BoxError>;
}

/// Positional gate actuator (hobby servo).
pub trait Actuator {
    /// (Re)attach the output; idempotent.
    fn attach(&mut self) -> Result<(), BoxError>;
    fn is_ready(&self) -> bool;
    /// Move to `angle_deg`, giving up once `timeout` elapses.
    fn move_to(&mut self, angle_deg: u8, timeout: Duration) -> Result<(), BoxError>;
}

/// Publish/subscribe telemetry transport (MQTT or similar).
pub trait Telemetry {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BoxError>;
    /// Service the connection; reconnect if it dropped.
    fn poll(&mut self) {}
    fn is_connected(&self) -> bool {
        true
    }
}

impl<T: Actuator + ?Sized> Actuator for Box<T> {
    fn attach(&mut self) -> Result<(), BoxError> {
        (**self).attach()
    }
    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
    fn move_to(&mut self, angle_deg: u8, timeout: Duration) -> Result<(), BoxError> {
        (**self).move_to(angle_deg, timeout)
    }
}

impl<T: Telemetry + ?Sized> Telemetry for Box<T> {
    fn publish(&mut self, topic: &str, payload: &str) -> Result<(), BoxError> {
        (**self).publish(topic, payload)
    }
    fn poll(&mut self) {
        (**self).poll();
    }
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
