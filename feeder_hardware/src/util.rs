use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until the provided `is_high` predicate becomes false (i.e., line goes low),
/// or a timeout expires. Sleeps in small intervals to avoid CPU spinning.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    while is_high() {
        if Instant::now() >= deadline {
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval);
    }
    Ok(())
}

/// Step a positional output from `from` to `to` one degree at a time.
///
/// `set` is called for every intermediate angle including `to`. Returns
/// `MoveTimeout` with the last angle reached when `timeout` runs out first.
pub fn sweep(
    from: u8,
    to: u8,
    step_delay: Duration,
    timeout: Duration,
    mut set: impl FnMut(u8) -> Result<()>,
) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let mut angle = from;
    while angle != to {
        if Instant::now() >= deadline {
            return Err(HwError::MoveTimeout {
                target: to,
                reached: angle,
            });
        }
        angle = if to > angle { angle + 1 } else { angle - 1 };
        set(angle)?;
        if !step_delay.is_zero() {
            std::thread::sleep(step_delay);
        }
    }
    Ok(())
}
