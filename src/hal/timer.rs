use avr_device::atmega328p::TC2;
use embedded_hal::blocking::delay::DelayUs;

use crate::config::{PROGRAMMER_CPU_FREQ_HZ, TARGET_CPU_FREQ_HZ};

const PRESCALER: u32 = 8;
const CS21: u8 = 1 << 1;

/// Busy-wait delay counting Timer2 ticks at CPU/8.
///
/// The counter free-runs and wraps every 256 ticks; the loop only has to
/// look at it more often than that.
pub struct TickDelay<const CPU_HZ: u32> {
    _tc2: TC2,
}

pub type TargetDelay = TickDelay<TARGET_CPU_FREQ_HZ>;
pub type ProgrammerDelay = TickDelay<PROGRAMMER_CPU_FREQ_HZ>;

impl<const CPU_HZ: u32> TickDelay<CPU_HZ> {
    const TICKS_PER_MS: u32 = CPU_HZ / PRESCALER / 1000;

    pub fn new(tc2: TC2) -> Self {
        unsafe {
            // Normal mode, clk/8
            tc2.tccr2a.write(|w| w.bits(0));
            tc2.tccr2b.write(|w| w.bits(CS21));
        }
        Self { _tc2: tc2 }
    }

    fn counter() -> u8 {
        unsafe { (*TC2::ptr()).tcnt2.read().bits() }
    }
}

impl<const CPU_HZ: u32> DelayUs<u32> for TickDelay<CPU_HZ> {
    fn delay_us(&mut self, us: u32) {
        let mut remaining = us * Self::TICKS_PER_MS / 1000;
        let mut last = Self::counter();
        while remaining > 0 {
            let now = Self::counter();
            remaining = remaining.saturating_sub(now.wrapping_sub(last) as u32);
            last = now;
        }
    }
}
