use crate::config::ActuatorCfg;
use crate::types::{MAX_PORTION_G, MIN_PORTION_G};

/// Integer linear re-mapping with truncation toward zero.
///
/// A zero-width input range maps everything to `out_min`.
#[inline]
pub fn map_range(x: i64, in_min: i64, in_max: i64, out_min: i64, out_max: i64) -> i64 {
    let span = in_max - in_min;
    if span == 0 {
        return out_min;
    }
    (x - in_min) * (out_max - out_min) / span + out_min
}

#[inline]
fn clamp_portion(portion_g: u16) -> i64 {
    i64::from(portion_g.clamp(MIN_PORTION_G, MAX_PORTION_G))
}

/// Gate opening angle for a portion: linear between the configured open angles.
pub fn portion_to_angle(portion_g: u16, cfg: &ActuatorCfg) -> u8 {
    let a = map_range(
        clamp_portion(portion_g),
        i64::from(MIN_PORTION_G),
        i64::from(MAX_PORTION_G),
        i64::from(cfg.open_min_deg),
        i64::from(cfg.open_max_deg),
    );
    u8::try_from(a.clamp(0, 90)).unwrap_or(cfg.open_max_deg)
}

/// How long the gate stays open for a portion.
pub fn portion_to_hold_ms(portion_g: u16, cfg: &ActuatorCfg) -> u64 {
    let ms = map_range(
        clamp_portion(portion_g),
        i64::from(MIN_PORTION_G),
        i64::from(MAX_PORTION_G),
        i64::try_from(cfg.hold_min_ms).unwrap_or(i64::MAX),
        i64::try_from(cfg.hold_max_ms).unwrap_or(i64::MAX),
    );
    u64::try_from(ms).unwrap_or(cfg.hold_min_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_range_endpoints_and_midpoint() {
        assert_eq!(map_range(0, 0, 1023, 30, 75), 30);
        assert_eq!(map_range(1023, 0, 1023, 30, 75), 75);
        assert_eq!(map_range(512, 0, 1023, 30, 75), 52);
        assert_eq!(map_range(5, 3, 3, 10, 20), 10);
    }

    #[test]
    fn portion_maps_to_angle_and_hold() {
        let cfg = ActuatorCfg::default();
        assert_eq!(portion_to_angle(30, &cfg), 30);
        assert_eq!(portion_to_angle(75, &cfg), 90);
        assert_eq!(portion_to_angle(50, &cfg), 56);
        assert_eq!(portion_to_hold_ms(30, &cfg), 200);
        assert_eq!(portion_to_hold_ms(75, &cfg), 500);
    }

    #[test]
    fn out_of_range_portions_are_clamped() {
        let cfg = ActuatorCfg::default();
        assert_eq!(portion_to_angle(10, &cfg), 30);
        assert_eq!(portion_to_angle(200, &cfg), 90);
    }
}
