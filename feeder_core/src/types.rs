use std::fmt;

use serde::{Deserialize, Serialize};

/// Smallest portion the gate can meter.
pub const MIN_PORTION_G: u16 = 30;
/// Largest portion the gate can meter.
pub const MAX_PORTION_G: u16 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedingMode {
    Scheduled,
    Manual,
}

impl fmt::Display for FeedingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Scheduled => "scheduled",
            Self::Manual => "manual",
        })
    }
}

/// Controller phase. `EmergencyStop` is sticky until cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Dispensing,
    EmergencyStop,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn portion_limits_match_config_crate() {
        assert_eq!(
            feeder_config::PORTION_RANGE_G,
            MIN_PORTION_G..=MAX_PORTION_G
        );
    }

    #[test]
    fn mode_serializes_lowercase() {
        let s = serde_json::to_string(&FeedingMode::Manual).unwrap();
        assert_eq!(s, "\"manual\"");
    }
}
