use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("spi error: {0}")]
    Spi(String),
    #[error("scale timeout")]
    Timeout,
    #[error("hx711 data-ready timeout")]
    DataReadyTimeout,
    #[error("servo not attached")]
    NotAttached,
    #[error("servo angle {0} outside [0, 90]")]
    AngleOutOfRange(u8),
    #[error("servo move timeout at {reached} deg (target {target} deg)")]
    MoveTimeout { target: u8, reached: u8 },
    #[error("adc channel {0} out of range")]
    BadChannel(u8),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
