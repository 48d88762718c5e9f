//! Outputs of the controller: the local display and telemetry topics.

use feeder_traits::{BoxError, Telemetry};

use crate::adaptive::HealthAlert;
use crate::faults::EmergencyCause;
use crate::safety::DenialReason;
use crate::state::FeederState;

/// What the display should show.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// Periodic overview built from the state.
    Status,
    Dispensing { portion_g: u16 },
    Dispensed { portion_g: u16 },
    Denied(DenialReason),
    Failure(String),
    LowFood { tank_g: f32 },
    Alert(HealthAlert),
    Emergency(EmergencyCause),
    DayComplete { day: u64, feeds: u32 },
}

pub trait Display {
    fn render(&mut self, screen: &Screen, state: &FeederState);
}

impl<T: Display + ?Sized> Display for Box<T> {
    fn render(&mut self, screen: &Screen, state: &FeederState) {
        (**self).render(screen, state);
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullDisplay;

impl Display for NullDisplay {
    fn render(&mut self, _screen: &Screen, _state: &FeederState) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn publish(&mut self, _topic: &str, _payload: &str) -> Result<(), BoxError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }
}

/// Topic names under a common prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub status: String,
    pub weights: String,
    pub feeding: String,
    pub alerts: String,
}

impl Topics {
    pub fn new(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            status: format!("{prefix}/status"),
            weights: format!("{prefix}/weights"),
            feeding: format!("{prefix}/feeding"),
            alerts: format!("{prefix}/alerts"),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::new("catfeeder")
    }
}
