//! Simulated feeder hardware.
//!
//! A shared [`SimPantry`] holds the food in the tank and in the bowl. The
//! load cells read it back as raw counts, the servo moves food from the tank
//! to the bowl when the gate closes, and [`SimCat`] eats from the bowl.
//! Handles are `Rc`-shared so a test or the CLI can poke at the world while
//! the controller owns the devices.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use feeder_traits::{Actuator, AnalogInput, BoxError, DigitalInput, LoadCell};

use crate::error::HwError;
use crate::util::sweep;

#[derive(Debug)]
struct PantryState {
    bowl_g: f32,
    tank_g: f32,
    tank_capacity_g: f32,
}

/// Food stock shared between the simulated devices.
#[derive(Debug, Clone)]
pub struct SimPantry {
    inner: Rc<RefCell<PantryState>>,
}

impl SimPantry {
    pub fn new(tank_g: f32, tank_capacity_g: f32) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PantryState {
                bowl_g: 0.0,
                tank_g: tank_g.clamp(0.0, tank_capacity_g),
                tank_capacity_g,
            })),
        }
    }

    pub fn bowl_g(&self) -> f32 {
        self.inner.borrow().bowl_g
    }

    pub fn tank_g(&self) -> f32 {
        self.inner.borrow().tank_g
    }

    pub fn set_bowl_g(&self, grams: f32) {
        self.inner.borrow_mut().bowl_g = grams.max(0.0);
    }

    pub fn set_tank_g(&self, grams: f32) {
        let mut s = self.inner.borrow_mut();
        s.tank_g = grams.clamp(0.0, s.tank_capacity_g);
    }

    pub fn fill_tank(&self) {
        let mut s = self.inner.borrow_mut();
        s.tank_g = s.tank_capacity_g;
    }

    /// Move up to `grams` from the tank into the bowl; returns what actually fell.
    pub fn transfer(&self, grams: f32) -> f32 {
        let mut s = self.inner.borrow_mut();
        let moved = grams.max(0.0).min(s.tank_g);
        s.tank_g -= moved;
        s.bowl_g += moved;
        moved
    }

    /// Remove up to `grams` from the bowl; returns what was eaten.
    pub fn eat(&self, grams: f32) -> f32 {
        let mut s = self.inner.borrow_mut();
        let eaten = grams.max(0.0).min(s.bowl_g);
        s.bowl_g -= eaten;
        eaten
    }

    fn grams(&self, vessel: Vessel) -> f32 {
        match vessel {
            Vessel::Bowl => self.bowl_g(),
            Vessel::Tank => self.tank_g(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vessel {
    Bowl,
    Tank,
}

/// Load cell under the bowl or the tank.
///
/// Reports `zero_counts + grams / gain_g_per_count` plus optional deterministic
/// noise. `fail_next(n)` makes the next `n` reads time out.
pub struct SimLoadCell {
    pantry: SimPantry,
    vessel: Vessel,
    zero_counts: i32,
    gain_g_per_count: f32,
    noise_counts: i32,
    rng: u32,
    failures: Rc<Cell<u32>>,
}

impl SimLoadCell {
    pub fn new(pantry: SimPantry, vessel: Vessel) -> Self {
        Self {
            pantry,
            vessel,
            zero_counts: 0,
            gain_g_per_count: 0.01,
            noise_counts: 0,
            rng: 0x9E37_79B9,
            failures: Rc::new(Cell::new(0)),
        }
    }

    pub fn with_calibration(mut self, zero_counts: i32, gain_g_per_count: f32) -> Self {
        self.zero_counts = zero_counts;
        self.gain_g_per_count = gain_g_per_count;
        self
    }

    /// Add uniform noise in `[-counts, counts]` to every read.
    pub fn with_noise(mut self, counts: i32, seed: u32) -> Self {
        self.noise_counts = counts.abs();
        self.rng = seed.max(1);
        self
    }

    /// Shared counter of reads that should fail with a timeout.
    pub fn failure_handle(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.failures)
    }

    fn next_noise(&mut self) -> i32 {
        if self.noise_counts == 0 {
            return 0;
        }
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let span = u32::try_from(2 * self.noise_counts + 1).unwrap_or(1);
        i32::try_from(x % span).unwrap_or(0) - self.noise_counts
    }
}

impl LoadCell for SimLoadCell {
    fn read(&mut self, _timeout: Duration) -> Result<i32, BoxError> {
        let pending = self.failures.get();
        if pending > 0 {
            self.failures.set(pending - 1);
            return Err(Box::new(HwError::Timeout));
        }
        let grams = self.pantry.grams(self.vessel);
        let counts = (grams / self.gain_g_per_count).round() as i32;
        Ok(self
            .zero_counts
            .saturating_add(counts)
            .saturating_add(self.next_noise()))
    }
}

/// Potentiometer; the raw ADC value is settable through the shared handle.
#[derive(Debug, Clone)]
pub struct SimPot {
    raw: Rc<Cell<i32>>,
}

impl SimPot {
    pub fn new(raw: i32) -> Self {
        Self {
            raw: Rc::new(Cell::new(raw)),
        }
    }

    pub fn set(&self, raw: i32) {
        self.raw.set(raw);
    }
}

impl AnalogInput for SimPot {
    fn read(&mut self) -> Result<i32, BoxError> {
        Ok(self.raw.get())
    }
}

/// Digital line with a pull-up: idle high, pulled low when "pressed".
#[derive(Debug, Clone)]
pub struct SimPin {
    high: Rc<Cell<bool>>,
}

impl SimPin {
    pub fn new(high: bool) -> Self {
        Self {
            high: Rc::new(Cell::new(high)),
        }
    }

    pub fn set_high(&self, high: bool) {
        self.high.set(high);
    }
}

impl DigitalInput for SimPin {
    fn is_high(&mut self) -> Result<bool, BoxError> {
        Ok(self.high.get())
    }
}

/// Gate geometry used to decide how much food falls per opening.
#[derive(Debug, Clone, Copy)]
pub struct SimGate {
    pub closed_deg: u8,
    pub open_min_deg: u8,
    pub open_max_deg: u8,
    pub min_portion_g: f32,
    pub max_portion_g: f32,
}

impl SimGate {
    fn portion_for(&self, angle: u8) -> f32 {
        if angle <= self.closed_deg {
            return 0.0;
        }
        let span = f32::from(self.open_max_deg.saturating_sub(self.open_min_deg)).max(1.0);
        let t = (f32::from(angle.clamp(self.open_min_deg, self.open_max_deg))
            - f32::from(self.open_min_deg))
            / span;
        self.min_portion_g + t * (self.max_portion_g - self.min_portion_g)
    }
}

/// Servo-driven gate. Food falls when the gate returns to closed.
pub struct SimServo {
    pantry: SimPantry,
    gate: SimGate,
    angle: u8,
    attached: bool,
    jammed: Rc<Cell<bool>>,
    detached: Rc<Cell<bool>>,
}

impl SimServo {
    pub fn new(pantry: SimPantry, gate: SimGate) -> Self {
        Self {
            pantry,
            angle: gate.closed_deg,
            gate,
            attached: false,
            jammed: Rc::new(Cell::new(false)),
            detached: Rc::new(Cell::new(false)),
        }
    }

    /// While set, every move fails as if the gate were stuck.
    pub fn jam_handle(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.jammed)
    }

    /// While set, the servo refuses to attach (unplugged connector).
    pub fn unplug_handle(&self) -> Rc<Cell<bool>> {
        Rc::clone(&self.detached)
    }

    pub fn angle(&self) -> u8 {
        self.angle
    }
}

impl Actuator for SimServo {
    fn attach(&mut self) -> Result<(), BoxError> {
        if self.detached.get() {
            self.attached = false;
            return Err(Box::new(HwError::NotAttached));
        }
        self.attached = true;
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.attached && !self.detached.get()
    }

    fn move_to(&mut self, angle_deg: u8, timeout: Duration) -> Result<(), BoxError> {
        if !self.is_ready() {
            return Err(Box::new(HwError::NotAttached));
        }
        if angle_deg > 90 {
            return Err(Box::new(HwError::AngleOutOfRange(angle_deg)));
        }
        if self.jammed.get() {
            return Err(Box::new(HwError::MoveTimeout {
                target: angle_deg,
                reached: self.angle,
            }));
        }
        let opened_to = self.angle;
        let mut reached = self.angle;
        sweep(self.angle, angle_deg, Duration::ZERO, timeout, |a| {
            reached = a;
            Ok(())
        })?;
        self.angle = reached;
        if angle_deg <= self.gate.closed_deg && opened_to > self.gate.closed_deg {
            let fell = self.pantry.transfer(self.gate.portion_for(opened_to));
            tracing::debug!(grams = fell, angle = opened_to, "sim gate released food");
        }
        Ok(())
    }
}

/// A cat that takes a fixed bite from the bowl at a fixed cadence.
#[derive(Debug)]
pub struct SimCat {
    pantry: SimPantry,
    bite_g: f32,
    interval_ms: u64,
    last_bite_ms: Option<u64>,
}

impl SimCat {
    pub fn new(pantry: SimPantry) -> Self {
        Self {
            pantry,
            bite_g: 10.0,
            interval_ms: 15_000,
            last_bite_ms: None,
        }
    }

    pub fn with_appetite(mut self, bite_g: f32, interval_ms: u64) -> Self {
        self.bite_g = bite_g;
        self.interval_ms = interval_ms.max(1);
        self
    }

    /// Advance the simulation; returns grams eaten on this call.
    pub fn tick(&mut self, now_ms: u64) -> f32 {
        let last = *self.last_bite_ms.get_or_insert(now_ms);
        if now_ms.saturating_sub(last) < self.interval_ms || self.pantry.bowl_g() <= 0.0 {
            return 0.0;
        }
        self.last_bite_ms = Some(now_ms);
        let eaten = self.pantry.eat(self.bite_g);
        tracing::trace!(grams = eaten, left = self.pantry.bowl_g(), "sim cat ate");
        eaten
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate() -> SimGate {
        SimGate {
            closed_deg: 0,
            open_min_deg: 30,
            open_max_deg: 90,
            min_portion_g: 30.0,
            max_portion_g: 75.0,
        }
    }

    #[test]
    fn gate_portion_is_linear_in_angle() {
        let g = gate();
        assert_eq!(g.portion_for(0), 0.0);
        assert!((g.portion_for(30) - 30.0).abs() < 1e-4);
        assert!((g.portion_for(60) - 52.5).abs() < 1e-4);
        assert!((g.portion_for(90) - 75.0).abs() < 1e-4);
    }

    #[test]
    fn transfer_is_limited_by_tank() {
        let pantry = SimPantry::new(20.0, 2_000.0);
        assert_eq!(pantry.transfer(50.0), 20.0);
        assert_eq!(pantry.tank_g(), 0.0);
        assert_eq!(pantry.bowl_g(), 20.0);
    }
}
