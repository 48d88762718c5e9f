use std::time::Duration;
use tracing::trace;

use crate::error::Result;
use crate::util::wait_until_low_with_timeout;

pub struct Hx711 {
    dt: rppal::gpio::InputPin,
    sck: rppal::gpio::OutputPin,
    gain_pulses: u8, // 25, 26, 27 based on gain/channel
}

impl Hx711 {
    pub fn new(dt: rppal::gpio::InputPin, mut sck: rppal::gpio::OutputPin, gain_pulses: u8) -> Self {
        sck.set_low(); // clock idle low; held high > 60us powers the chip down
        Self {
            dt,
            sck,
            gain_pulses: gain_pulses.clamp(25, 27),
        }
    }

    fn pulse(&mut self) {
        self.sck.set_high();
        std::hint::spin_loop();
        self.sck.set_low();
        std::hint::spin_loop();
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))?;

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            std::hint::spin_loop();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            std::hint::spin_loop();
        }

        // Extra pulses select gain/channel for the next conversion.
        for _ in 24..self.gain_pulses {
            self.pulse();
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}
