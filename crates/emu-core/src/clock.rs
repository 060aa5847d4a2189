//! Oscillator configuration.

use crate::Ticks;

/// A clock source feeding the CPU through a fixed divider.
///
/// Small microcontrollers switch between several oscillators at run time
/// (a slow quartz for sleep, a fast RC or ceramic for work), so the
/// seconds-per-cycle figure is recomputed whenever the guest reprograms
/// its oscillator control register.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    /// Oscillator frequency in Hz (e.g., `32_768` for a watch crystal).
    pub frequency_hz: u32,
    /// Oscillator periods per CPU cycle.
    pub divider: u32,
}

impl Oscillator {
    #[must_use]
    pub const fn new(frequency_hz: u32, divider: u32) -> Self {
        Self {
            frequency_hz,
            divider,
        }
    }

    /// Effective CPU cycle rate in Hz.
    #[must_use]
    pub fn cycles_per_second(&self) -> f64 {
        f64::from(self.frequency_hz) / f64::from(self.divider)
    }

    /// Wall-clock length of one CPU cycle.
    #[must_use]
    pub fn seconds_per_cycle(&self) -> f64 {
        f64::from(self.divider) / f64::from(self.frequency_hz)
    }

    /// Wall-clock length of `ticks` CPU cycles.
    #[must_use]
    pub fn seconds(&self, ticks: Ticks) -> f64 {
        ticks.get() as f64 * self.seconds_per_cycle()
    }
}
