//! Consecutive-failure tracking and the emergency latch.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultSource {
    Sensor,
    Actuator,
}

impl fmt::Display for FaultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sensor => "sensor",
            Self::Actuator => "actuator",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyCause {
    Operator,
    ExternalStop,
    RepeatedFailures(FaultSource),
}

impl fmt::Display for EmergencyCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operator => f.write_str("operator request"),
            Self::ExternalStop => f.write_str("external stop input"),
            Self::RepeatedFailures(src) => write!(f, "repeated {src} failures"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FaultMonitor {
    limit: u8,
    sensor: u8,
    actuator: u8,
    latched: Option<EmergencyCause>,
}

impl FaultMonitor {
    pub fn new(limit: u8) -> Self {
        Self {
            limit: limit.max(1),
            sensor: 0,
            actuator: 0,
            latched: None,
        }
    }

    fn counter(&mut self, source: FaultSource) -> &mut u8 {
        match source {
            FaultSource::Sensor => &mut self.sensor,
            FaultSource::Actuator => &mut self.actuator,
        }
    }

    /// Count a failure; true when the source has just reached the limit.
    pub fn record_failure(&mut self, source: FaultSource) -> bool {
        let limit = self.limit;
        let c = self.counter(source);
        *c = c.saturating_add(1);
        *c == limit
    }

    pub fn record_ok(&mut self, source: FaultSource) {
        *self.counter(source) = 0;
    }

    pub fn failures(&self, source: FaultSource) -> u8 {
        match source {
            FaultSource::Sensor => self.sensor,
            FaultSource::Actuator => self.actuator,
        }
    }

    /// Latch the emergency; false if it was already latched.
    pub fn latch(&mut self, cause: EmergencyCause) -> bool {
        if self.latched.is_some() {
            return false;
        }
        self.latched = Some(cause);
        true
    }

    pub fn clear(&mut self) {
        self.latched = None;
        self.sensor = 0;
        self.actuator = 0;
    }

    pub fn latched(&self) -> Option<EmergencyCause> {
        self.latched
    }

    pub fn is_latched(&self) -> bool {
        self.latched.is_some()
    }
}
