/// Linear calibration: grams = gain * (raw - zero) + offset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub gain_g_per_count: f32,
    pub zero_counts: i32,
    pub offset_g: f32,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            gain_g_per_count: 0.01,
            zero_counts: 0,
            offset_g: 0.0,
        }
    }
}

impl Calibration {
    #[inline]
    pub fn to_grams(&self, raw: i32) -> f32 {
        let delta = i64::from(raw) - i64::from(self.zero_counts);
        self.gain_g_per_count * delta as f32 + self.offset_g
    }
}

#[cfg(test)]
mod tests {
    use super::Calibration;

    #[test]
    fn applies_zero_gain_and_offset() {
        let c = Calibration {
            gain_g_per_count: 0.01,
            zero_counts: 8_000,
            offset_g: 1.5,
        };
        assert!((c.to_grams(8_000) - 1.5).abs() < 1e-6);
        assert!((c.to_grams(13_000) - 51.5).abs() < 1e-4);
    }

    #[test]
    fn extreme_counts_do_not_overflow() {
        let c = Calibration {
            zero_counts: i32::MAX,
            ..Calibration::default()
        };
        assert!(c.to_grams(i32::MIN).is_finite());
    }
}
