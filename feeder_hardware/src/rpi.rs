//! Raspberry Pi backends built on `rppal`.

use std::time::Duration;

use feeder_traits::{Actuator, AnalogInput, BoxError, DigitalInput, LoadCell};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::error::{HwError, Result};
use crate::hx711::Hx711;
use crate::util::sweep;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// HX711-backed load cell with a small retry budget on timeouts.
pub struct HardwareLoadCell {
    hx711: Hx711,
}

impl HardwareLoadCell {
    pub fn new(dt_pin: u8, sck_pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let dt = gpio.get(dt_pin).map_err(gpio_err)?.into_input();
        let sck = gpio.get(sck_pin).map_err(gpio_err)?.into_output();
        Ok(Self {
            hx711: Hx711::new(dt, sck, 25),
        })
    }
}

impl LoadCell for HardwareLoadCell {
    fn read(&mut self, timeout: Duration) -> std::result::Result<i32, BoxError> {
        let mut attempts = 0;
        loop {
            match self.hx711.read_with_timeout(timeout) {
                Ok(raw) => return Ok(raw),
                Err(HwError::DataReadyTimeout) if attempts < 3 => {
                    attempts += 1;
                    tracing::warn!(retries = attempts, "load cell timeout, retrying");
                }
                Err(e) => return Err(Box::new(e)),
            }
        }
    }
}

/// Hobby servo driven by software PWM at 50 Hz.
pub struct PwmServo {
    pin_no: u8,
    pin: Option<OutputPin>,
    angle: u8,
    step_delay: Duration,
}

const SERVO_PERIOD: Duration = Duration::from_millis(20);

fn pulse_for(angle: u8) -> Duration {
    // 500 us at 0 deg to 2500 us at 180 deg
    Duration::from_micros(500 + u64::from(angle) * 2000 / 180)
}

impl PwmServo {
    pub fn new(pin_no: u8, step_ms: u64) -> Self {
        Self {
            pin_no,
            pin: None,
            angle: 0,
            step_delay: Duration::from_millis(step_ms),
        }
    }
}

impl Actuator for PwmServo {
    fn attach(&mut self) -> std::result::Result<(), BoxError> {
        if self.pin.is_some() {
            return Ok(());
        }
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut pin = gpio.get(self.pin_no).map_err(gpio_err)?.into_output();
        pin.set_pwm(SERVO_PERIOD, pulse_for(self.angle))
            .map_err(gpio_err)?;
        self.pin = Some(pin);
        Ok(())
    }

    fn is_ready(&self) -> bool {
        self.pin.is_some()
    }

    fn move_to(&mut self, angle_deg: u8, timeout: Duration) -> std::result::Result<(), BoxError> {
        if angle_deg > 90 {
            return Err(Box::new(HwError::AngleOutOfRange(angle_deg)));
        }
        let pin = self.pin.as_mut().ok_or(HwError::NotAttached)?;
        let mut reached = self.angle;
        let res = sweep(self.angle, angle_deg, self.step_delay, timeout, |a| {
            pin.set_pwm(SERVO_PERIOD, pulse_for(a)).map_err(gpio_err)?;
            reached = a;
            Ok(())
        });
        self.angle = reached;
        res.map_err(|e| Box::new(e) as BoxError)
    }
}

/// MCP3008 10-bit ADC channel on SPI0/CE0.
pub struct Mcp3008Channel {
    spi: Spi,
    channel: u8,
}

impl Mcp3008Channel {
    pub fn new(channel: u8) -> Result<Self> {
        if channel > 7 {
            return Err(HwError::BadChannel(channel));
        }
        let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 1_000_000, Mode::Mode0)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok(Self { spi, channel })
    }
}

impl AnalogInput for Mcp3008Channel {
    fn read(&mut self) -> std::result::Result<i32, BoxError> {
        let tx = [0x01, (0x08 | self.channel) << 4, 0x00];
        let mut rx = [0u8; 3];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HwError::Spi(e.to_string()))?;
        Ok((i32::from(rx[1] & 0x03) << 8) | i32::from(rx[2]))
    }
}

/// GPIO input with the internal pull-up enabled.
pub struct GpioInput {
    pin: InputPin,
}

impl GpioInput {
    pub fn new(pin_no: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        Ok(Self {
            pin: gpio.get(pin_no).map_err(gpio_err)?.into_input_pullup(),
        })
    }
}

impl DigitalInput for GpioInput {
    fn is_high(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self.pin.is_high())
    }
}

/// Build a polling closure reporting whether the e-stop input is asserted.
pub fn make_estop_checker(pin_no: u8, active_low: bool) -> Result<Box<dyn Fn() -> bool>> {
    let gpio = Gpio::new().map_err(gpio_err)?;
    let pin = gpio.get(pin_no).map_err(gpio_err)?.into_input_pullup();
    Ok(Box::new(move || pin.is_high() != active_low))
}
