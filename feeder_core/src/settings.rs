//! Persisted user settings and their binary record.
//!
//! Record layout, all multi-byte fields little-endian:
//!
//! | offset | size | field                    |
//! |--------|------|--------------------------|
//! | 0      | 2    | magic `0xFEED`           |
//! | 2      | 1    | version                  |
//! | 3      | 2    | default portion (g)      |
//! | 5      | 4    | feeding interval (ms)    |
//! | 9      | 4    | bowl full threshold (g)  |
//! | 13     | 4    | bowl empty threshold (g) |
//! | 17     | 4    | tank low fraction        |
//! | 21     | 1    | adaptive feeding (0/1)   |
//! | 22     | 1    | XOR of bytes 0..22       |

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ScheduleCfg;
use crate::types::{MAX_PORTION_G, MIN_PORTION_G};

pub const SETTINGS_MAGIC: u16 = 0xFEED;
pub const SETTINGS_VERSION: u8 = 1;
pub const RECORD_LEN: usize = 23;

const BOWL_FULL_RANGE_G: RangeInclusive<f32> = 10.0..=500.0;
const BOWL_EMPTY_RANGE_G: RangeInclusive<f32> = 0.0..=50.0;
const TANK_LOW_RANGE: RangeInclusive<f32> = 0.05..=0.9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    #[error("settings record is {0} bytes, expected {RECORD_LEN}")]
    Length(usize),
    #[error("bad settings magic 0x{0:04X}")]
    BadMagic(u16),
    #[error("unsupported settings version {0}")]
    Version(u8),
    #[error("settings checksum mismatch (stored 0x{stored:02X}, computed 0x{computed:02X})")]
    Checksum { stored: u8, computed: u8 },
    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: String },
}

fn out_of_range(field: &'static str, value: impl ToString) -> SettingsError {
    SettingsError::OutOfRange {
        field,
        value: value.to_string(),
    }
}

/// Bounds that depend on configuration rather than on the record format.
#[derive(Debug, Clone)]
pub struct SettingsLimits {
    pub interval_ms: RangeInclusive<u64>,
}

impl From<&ScheduleCfg> for SettingsLimits {
    fn from(s: &ScheduleCfg) -> Self {
        Self {
            interval_ms: s.fastest_interval_ms..=s.slowest_interval_ms,
        }
    }
}

impl Default for SettingsLimits {
    fn default() -> Self {
        Self::from(&ScheduleCfg::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSettings {
    pub default_portion_g: u16,
    pub feeding_interval_ms: u64,
    pub bowl_full_threshold_g: f32,
    pub bowl_empty_threshold_g: f32,
    pub tank_low_fraction: f32,
    pub adaptive_enabled: bool,
}

impl Default for SystemSettings {
    fn default() -> Self {
        Self {
            default_portion_g: 50,
            feeding_interval_ms: 20_000,
            bowl_full_threshold_g: 80.0,
            bowl_empty_threshold_g: 5.0,
            tank_low_fraction: 0.25,
            adaptive_enabled: true,
        }
    }
}

/// A single user-initiated change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingUpdate {
    DefaultPortion(u16),
    FeedingInterval(u64),
    BowlFullThreshold(f32),
    BowlEmptyThreshold(f32),
    TankLowFraction(f32),
    AdaptiveFeeding(bool),
}

impl SystemSettings {
    pub fn validate(&self, limits: &SettingsLimits) -> Result<(), SettingsError> {
        if !(MIN_PORTION_G..=MAX_PORTION_G).contains(&self.default_portion_g) {
            return Err(out_of_range("default_portion_g", self.default_portion_g));
        }
        if !limits.interval_ms.contains(&self.feeding_interval_ms) {
            return Err(out_of_range("feeding_interval_ms", self.feeding_interval_ms));
        }
        if !BOWL_FULL_RANGE_G.contains(&self.bowl_full_threshold_g) {
            return Err(out_of_range("bowl_full_threshold_g", self.bowl_full_threshold_g));
        }
        if !BOWL_EMPTY_RANGE_G.contains(&self.bowl_empty_threshold_g)
            || self.bowl_empty_threshold_g >= self.bowl_full_threshold_g
        {
            return Err(out_of_range(
                "bowl_empty_threshold_g",
                self.bowl_empty_threshold_g,
            ));
        }
        if !TANK_LOW_RANGE.contains(&self.tank_low_fraction) {
            return Err(out_of_range("tank_low_fraction", self.tank_low_fraction));
        }
        Ok(())
    }

    /// Apply one change; the settings are untouched if the result would be invalid.
    pub fn apply(
        &mut self,
        update: SettingUpdate,
        limits: &SettingsLimits,
    ) -> Result<(), SettingsError> {
        let mut next = self.clone();
        match update {
            SettingUpdate::DefaultPortion(g) => next.default_portion_g = g,
            SettingUpdate::FeedingInterval(ms) => next.feeding_interval_ms = ms,
            SettingUpdate::BowlFullThreshold(g) => next.bowl_full_threshold_g = g,
            SettingUpdate::BowlEmptyThreshold(g) => next.bowl_empty_threshold_g = g,
            SettingUpdate::TankLowFraction(f) => next.tank_low_fraction = f,
            SettingUpdate::AdaptiveFeeding(on) => next.adaptive_enabled = on,
        }
        next.validate(limits)?;
        *self = next;
        Ok(())
    }

    pub fn encode(&self) -> Result<[u8; RECORD_LEN], SettingsError> {
        let interval = u32::try_from(self.feeding_interval_ms)
            .map_err(|_| out_of_range("feeding_interval_ms", self.feeding_interval_ms))?;
        let mut buf = [0u8; RECORD_LEN];
        buf[0..2].copy_from_slice(&SETTINGS_MAGIC.to_le_bytes());
        buf[2] = SETTINGS_VERSION;
        buf[3..5].copy_from_slice(&self.default_portion_g.to_le_bytes());
        buf[5..9].copy_from_slice(&interval.to_le_bytes());
        buf[9..13].copy_from_slice(&self.bowl_full_threshold_g.to_le_bytes());
        buf[13..17].copy_from_slice(&self.bowl_empty_threshold_g.to_le_bytes());
        buf[17..21].copy_from_slice(&self.tank_low_fraction.to_le_bytes());
        buf[21] = u8::from(self.adaptive_enabled);
        buf[RECORD_LEN - 1] = checksum(&buf[..RECORD_LEN - 1]);
        Ok(buf)
    }

    /// Decode and validate a record. Any mismatch is an error; callers fall
    /// back to defaults.
    pub fn decode(bytes: &[u8], limits: &SettingsLimits) -> Result<Self, SettingsError> {
        if bytes.len() != RECORD_LEN {
            return Err(SettingsError::Length(bytes.len()));
        }
        let magic = u16::from_le_bytes([bytes[0], bytes[1]]);
        if magic != SETTINGS_MAGIC {
            return Err(SettingsError::BadMagic(magic));
        }
        if bytes[2] != SETTINGS_VERSION {
            return Err(SettingsError::Version(bytes[2]));
        }
        let stored = bytes[RECORD_LEN - 1];
        let computed = checksum(&bytes[..RECORD_LEN - 1]);
        if stored != computed {
            return Err(SettingsError::Checksum { stored, computed });
        }
        let f32_at = |at: usize| {
            f32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
        };
        let adaptive_enabled = match bytes[21] {
            0 => false,
            1 => true,
            other => return Err(out_of_range("adaptive_enabled", other)),
        };
        let settings = Self {
            default_portion_g: u16::from_le_bytes([bytes[3], bytes[4]]),
            feeding_interval_ms: u64::from(u32::from_le_bytes([
                bytes[5], bytes[6], bytes[7], bytes[8],
            ])),
            bowl_full_threshold_g: f32_at(9),
            bowl_empty_threshold_g: f32_at(13),
            tank_low_fraction: f32_at(17),
            adaptive_enabled,
        };
        settings.validate(limits)?;
        Ok(settings)
    }
}

/// XOR of all bytes.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_starts_with_magic_and_version() {
        let buf = SystemSettings::default().encode().unwrap();
        assert_eq!(&buf[..3], &[0xED, 0xFE, SETTINGS_VERSION]);
        assert_eq!(checksum(&buf), 0, "XOR over a record including its checksum is zero");
    }

    #[test]
    fn rejected_update_leaves_settings_untouched() {
        let mut s = SystemSettings::default();
        let limits = SettingsLimits::default();
        let err = s
            .apply(SettingUpdate::DefaultPortion(80), &limits)
            .unwrap_err();
        assert!(matches!(err, SettingsError::OutOfRange { field: "default_portion_g", .. }));
        assert_eq!(s, SystemSettings::default());
    }

    #[test]
    fn empty_threshold_must_stay_below_full() {
        let mut s = SystemSettings::default();
        let limits = SettingsLimits::default();
        s.apply(SettingUpdate::BowlFullThreshold(40.0), &limits)
            .unwrap();
        assert!(
            s.apply(SettingUpdate::BowlEmptyThreshold(45.0), &limits)
                .is_err()
        );
    }
}
