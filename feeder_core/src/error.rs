use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FeederError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("timeout waiting for hardware")]
    Timeout,
    #[error("dispense overran its {budget_ms} ms budget")]
    DispenseOverrun { budget_ms: u64 },
    #[error("invalid state: {0}")]
    State(String),
    #[error("persistence error: {0}")]
    Persistence(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing sensors")]
    MissingSensors,
    #[error("missing actuator")]
    MissingActuator,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
